//! Auditory oddball (mismatch negativity).

use crate::session::Session;
use crate::tables::{read_table, MmnRow};
use crate::trial::TrialPlan;
use onac_audio::{AudioSink, HAMMING_RAMP_SECS};
use onac_core::{Display, Error, Result, Scene, Stimulus};
use onac_timing::Timer;
use onac_trigger::TriggerPort;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use super::Task;

#[derive(Debug, Serialize)]
struct MmnRecord<'a> {
    condition: &'a str,
    sound: &'a str,
}

pub fn run<D, T, P, A>(session: &mut Session<D, T, P, A>) -> Result<()>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    info!("Running mismatched negativity task...");
    let cfg = session.config.mmn.clone();
    let table = session.config.require(&cfg.stimuli)?;
    let rows: Vec<MmnRow> = read_table(&table)?;
    let rows = &rows[cfg.skip_rows.min(rows.len())..];

    // Fail before the participant sees anything if a timing or sound is bad.
    let timings = rows
        .iter()
        .map(|row| {
            Duration::try_from_secs_f64(row.timing)
                .map_err(|e| Error::asset(&table, format!("Timing {}: {e}", row.timing)))
        })
        .collect::<Result<Vec<_>>>()?;
    let mut sounds = Vec::with_capacity(rows.len());
    for row in rows {
        let path = cfg.sound_dir.join(format!("{}.wav", row.sound));
        let sound = session.load_sound(&path, |s| {
            s.with_duration(cfg.sound_secs)
                .with_hamming_ramp(HAMMING_RAMP_SECS)
                .with_volume(cfg.volume)
        })?;
        sounds.push(sound);
    }

    let mut scene = Scene::blank(session.black());
    if let Some(image) = &cfg.background_image {
        let full = session.config.require(image)?;
        scene.push(Stimulus::image(full, Some(session.size())));
    }

    if let Some(instructions) = cfg.instructions.as_ref().filter(|_| session.is_live()) {
        session.present_instructions(instructions)?;
    }
    session.begin()?;
    session.wait(2.0)?;

    let mut results = session.results(Task::Mmn.data_name(), &["condition", "sound"])?;
    for (i, ((row, sound), timing)) in rows.iter().zip(sounds).zip(timings).enumerate() {
        let plan = TrialPlan::passive(timing)
            .with_trigger(session.live_trigger(row.trigger))
            .with_sound(Some(sound));
        session.run_trial(&plan, |_| scene.clone())?;

        results.append(&MmnRecord {
            condition: &row.condition,
            sound: &row.sound,
        })?;
        session.log.add_data("Condition", &row.condition);
        session.log.add_data("Sound", &row.sound);
        session.log.next_entry();
        info!("Trial {} out of {}", i + 1, rows.len());
    }

    session.break_screen()
}
