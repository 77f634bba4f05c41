//! Flickering checkerboard with a dot-detection catch task.

use crate::config::{rgb, seconds};
use crate::session::Session;
use crate::tables::{read_table, VisualRow};
use crate::trial::{ResponseWindow, TrialOutcome, TrialPlan};
use onac_audio::AudioSink;
use onac_core::{
    Checkerboard, Display, Key, KeySet, Position, Result, Scene, Stimulus, TriggerCode,
};
use onac_timing::Timer;
use onac_trigger::TriggerPort;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use super::Task;

/// One stimulation period.
struct Stimulation {
    frequency: f64,
    trigger: Option<TriggerCode>,
    wedge: (f32, f32),
    /// Board centre in normalized window units.
    centre: (f32, f32),
}

#[derive(Debug, Serialize)]
struct VisualRecord<'a> {
    frequency: f64,
    side: &'a str,
    detected: u8,
    reaction_time: Option<f64>,
}

#[derive(Debug, Serialize)]
struct BnirsRecord {
    detected: u8,
    reaction_time: Option<f64>,
}

pub fn run<D, T, P, A>(session: &mut Session<D, T, P, A>) -> Result<()>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    info!("Running visual stimulation paradigm");
    let cfg = session.config.visual.clone();
    let rows: Vec<VisualRow> = read_table(&session.config.require(&cfg.stimuli)?)?;

    if let Some(instructions) = &cfg.instructions {
        info!("Presenting instructions");
        session.present_instructions(instructions)?;
    }
    session.begin()?;
    session.wait(2.0)?;

    let mut results = session.results(
        Task::Visual.data_name(),
        &["frequency", "side", "detected", "reaction_time"],
    )?;
    for (i, row) in rows.iter().enumerate() {
        info!("Trial number: {} out of {}", i + 1, rows.len());
        let stimulation = Stimulation {
            frequency: row.frequency,
            trigger: session.live_trigger(row.trigger),
            wedge: (row.orientation1, row.orientation2),
            centre: (row.pos1, row.pos2),
        };
        let outcome = stimulation_trial(session, &stimulation)?;
        let response = outcome.first_response();

        results.append(&VisualRecord {
            frequency: row.frequency,
            side: &row.side,
            detected: u8::from(response.is_some()),
            reaction_time: response.map(|r| r.rt_secs()),
        })?;
        session.log.add_data("frequency", row.frequency);
        session.log.add_data("side", &row.side);
        session.log.add_data("Task", "visual_stim");
        session.log.next_entry();
    }
    Ok(())
}

/// Centred full-field variant: fixed trial count and rate, no triggers.
pub fn run_bnirs<D, T, P, A>(session: &mut Session<D, T, P, A>) -> Result<()>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    info!("Running visual stimulation paradigm");
    let cfg = session.config.visual_bnirs.clone();
    let mut results = session.results(
        Task::VisualBnirs.data_name(),
        &["detected", "reaction_time"],
    )?;
    for i in 0..cfg.trials {
        info!("Trial number: {} out of {}", i + 1, cfg.trials);
        let stimulation = Stimulation {
            frequency: cfg.frequency,
            trigger: None,
            wedge: (0.0, 360.0),
            centre: (0.0, 0.0),
        };
        let outcome = stimulation_trial(session, &stimulation)?;
        let response = outcome.first_response();
        results.append(&BnirsRecord {
            detected: u8::from(response.is_some()),
            reaction_time: response.map(|r| r.rt_secs()),
        })?;
        session.log.add_data("Task", "visual_stim_bNIRS");
        session.log.next_entry();
    }
    Ok(())
}

/// Baseline, stimulation with the catch dot, then a short rest.
fn stimulation_trial<D, T, P, A>(
    session: &mut Session<D, T, P, A>,
    stimulation: &Stimulation,
) -> Result<TrialOutcome>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    let cfg = session.config.visual.clone();
    session.baseline(cfg.baseline_secs)?;

    let size = session.size();
    let (lo, hi) = cfg.dot_onset_range;
    let onset = session.rng.random_range(lo..=hi.max(lo));
    let dot_start = Duration::from_secs(onset.into());
    let dot_end = dot_start + seconds(cfg.dot_secs, "visual.dot_secs")?;
    let duration = seconds(cfg.stimulation_secs, "visual.stimulation_secs")?;

    let board = Checkerboard {
        radius: cfg.board_size * size.1 as f32 / 4.0,
        radial_cycles: cfg.radial_cycles,
        angular_cycles: cfg.angular_cycles,
        wedge: stimulation.wedge,
        position: Position::from_norm(stimulation.centre.0, stimulation.centre.1, size),
        inverted: false,
    };
    let fixation = Stimulus::Fixation {
        size: session.norm_height(cfg.fixation_height),
        color: rgb(cfg.fixation_color),
    };
    let dot = Stimulus::Dot {
        position: Position::CENTRE,
        diameter: cfg.dot_diameter,
        color: rgb(cfg.dot_color),
    };
    let background = session.black();
    let period = 1.0 / stimulation.frequency.max(f64::EPSILON);

    let plan = TrialPlan::passive(duration)
        .with_trigger(stimulation.trigger)
        .with_window(ResponseWindow::new(dot_start, dot_end, KeySet::only([Key::Space])));
    let outcome = session.run_trial(&plan, |t| {
        let phase = t.as_secs_f64() % period;
        let mut scene = Scene::blank(background).with(Stimulus::Checkerboard(Checkerboard {
            inverted: phase >= period / 2.0,
            ..board.clone()
        }));
        scene.push(fixation.clone());
        if t >= dot_start && t < dot_end {
            scene.push(dot.clone());
        }
        scene
    })?;

    session.baseline(cfg.rest_secs)?;
    Ok(outcome)
}
