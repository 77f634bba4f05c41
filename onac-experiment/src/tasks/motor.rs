//! Naturalistic motor task: spoken and written movement cues, self-paced.

use crate::config::seconds;
use crate::session::Session;
use crate::tables::{read_table, MotorRow};
use crate::trial::{ResponseWindow, TrialPlan};
use onac_audio::AudioSink;
use onac_core::stimulus::WHITE;
use onac_core::{Display, KeySet, Result, Scene};
use onac_timing::Timer;
use onac_trigger::TriggerPort;
use serde::Serialize;
use tracing::info;

use super::Task;

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct MotorRecord<'a> {
    stimulus: &'a str,
    /// Seconds until the participant signalled completion.
    duration: Option<f64>,
    trial: usize,
}

pub fn run<D, T, P, A>(session: &mut Session<D, T, P, A>) -> Result<()>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    info!("Running naturalistic motor task...");
    let cfg = session.config.motor.clone();
    let rows: Vec<MotorRow> = read_table(&session.config.require(&cfg.stimuli)?)?;
    let mut cues = Vec::with_capacity(rows.len());
    for row in &rows {
        cues.push(session.load_sound(&row.instruction, |s| s)?);
    }

    session.ready()?;
    session.wait(1.0)?;
    session.begin()?;

    info!("Starting naturalistic motor task testing...");
    let mut results = session.results(Task::Motor.data_name(), &["Stimulus", "Duration", "Trial"])?;
    for repetition in 0..cfg.repetitions {
        for (row, cue) in rows.iter().zip(&cues) {
            session.baseline(cfg.baseline_secs)?;

            let rest = row.trigger == cfg.rest_trigger;
            let limit = if rest {
                seconds(cfg.rest_secs, "motor.rest_secs")?
            } else {
                seconds(cfg.max_response_secs, "motor.max_response_secs")?
            };
            let mut plan = TrialPlan::passive(limit)
                .with_trigger(session.live_trigger(row.trigger))
                .with_sound(Some(cue.clone()));
            if !rest {
                plan = plan
                    .with_window(ResponseWindow::whole(limit, KeySet::Any))
                    .ending_on_response();
            }

            let text = session.text(&row.stimulus, WHITE);
            let scene = Scene::blank(session.black()).with(text);
            let outcome = session.run_trial(&plan, |_| scene.clone())?;
            if let Some(code) = session.live_trigger(row.end_trigger) {
                session.send_trigger_now(code)?;
            }

            let duration = outcome.first_response().map(|r| r.rt_secs());
            results.append(&MotorRecord {
                stimulus: &row.stimulus,
                duration,
                trial: repetition,
            })?;
            session.log.add_data("NMT_stimulus", &row.stimulus);
            session
                .log
                .add_data("NMT_duration", duration.map(|d| format!("{d:.3}")).unwrap_or_default());
            session.log.add_data("Task", "NMT");
            session.log.next_entry();

            session.wait(1.0)?;
        }

        if repetition + 1 < cfg.repetitions {
            session.break_screen()?;
        }
    }
    Ok(())
}
