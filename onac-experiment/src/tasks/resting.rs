//! Eyes-open resting state.

use crate::config::seconds;
use crate::session::Session;
use crate::trial::TrialPlan;
use onac_audio::{AudioSink, Sound};
use onac_core::{Display, Result, Scene, TriggerCode};
use onac_timing::Timer;
use onac_trigger::TriggerPort;
use tracing::info;

pub fn run<D, T, P, A>(session: &mut Session<D, T, P, A>) -> Result<()>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    info!("Running resting state...");
    let cfg = session.config.resting.clone();
    let tone = Sound::tone(cfg.tone_hz, cfg.tone_secs, session.audio.sample_rate())
        .with_volume(cfg.tone_volume);

    session.present_instructions(&cfg.instructions)?;
    session.begin()?;
    session.wait(2.0)?;

    let secs = cfg.minutes * 60.0 + 2.0 + session.jitter();
    let plan = TrialPlan::passive(seconds(secs, "resting.minutes")?)
        .with_trigger(session.live_trigger(TriggerCode::RESTING_START));
    let blank = Scene::blank(session.black());
    session.run_trial(&plan, |_| blank.clone())?;
    if session.is_live() {
        session.send_trigger_now(TriggerCode::RESTING_END)?;
    }
    session.audio.play(&tone)?;
    session.log.add_data("Task", "RS");
    session.log.add_data("RS_duration", format!("{secs:.3}"));
    session.log.next_entry();

    session.break_screen()
}
