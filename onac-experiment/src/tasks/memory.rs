//! Implicit memory: indoor/outdoor encoding followed by old/new recall.
//!
//! Every testing trial shows the image for `image_secs`, then the prompt
//! until `trial_secs`. Left/right is polled separately in both halves, each
//! half timed from its own first frame.

use crate::config::{rgb, seconds, MemoryConfig};
use crate::session::{Background, Session};
use crate::tables::{read_table, MemoryRow};
use crate::trial::{FrameIntent, ResponseWindow, TrialPlan};
use onac_audio::AudioSink;
use onac_core::stimulus::WHITE;
use onac_core::{
    Display, Key, KeySet, Result, Scene, Stimulus, TrialResult, TrialSpec, TriggerCode,
};
use onac_timing::Timer;
use onac_trigger::TriggerPort;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::{flag, Task};

const ENCODING_PROMPT: &str = "Indoor or outdoor?";
const RECALL_PROMPT: &str = "Old or new?";
const PRACTICE_BASELINE_SECS: f64 = 5.0;
const BLOCK_BASELINE_SECS: f64 = 10.0;

const HEADERS: [&str; 12] = [
    "phase",
    "stimulus",
    "condition_setting",
    "condition_memory",
    "trial_number",
    "reaction_time_img",
    "response_img",
    "reaction_time_text",
    "response_text",
    "correct_answer",
    "key_pressed_img",
    "key_pressed_text",
];

#[derive(Debug, Serialize)]
struct MemoryRecord<'a> {
    phase: &'a str,
    /// Prompt shown after the image.
    stimulus: &'a str,
    condition_setting: &'a str,
    condition_memory: &'a str,
    /// Row of the trial in its unshuffled table.
    trial_number: usize,
    reaction_time_img: Option<f64>,
    response_img: Option<u8>,
    reaction_time_text: Option<f64>,
    response_text: Option<u8>,
    correct_answer: &'a str,
    key_pressed_img: Option<String>,
    key_pressed_text: Option<String>,
}

struct Phase {
    name: &'static str,
    trigger: TriggerCode,
    prompt: &'static str,
    rows: Vec<(usize, MemoryRow)>,
}

fn arrows() -> KeySet {
    KeySet::only([Key::Left, Key::Right])
}

pub fn run<D, T, P, A>(session: &mut Session<D, T, P, A>) -> Result<()>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    info!("Running implicit memory task");
    let cfg = session.config.memory.clone();
    let practice: Vec<MemoryRow> = read_table(&session.config.require(&cfg.practice)?)?;
    let mut encoded: Vec<(usize, MemoryRow)> =
        read_table(&session.config.require(&cfg.encoded)?)?.into_iter().enumerate().collect();
    let mut recall: Vec<(usize, MemoryRow)> =
        read_table(&session.config.require(&cfg.recall)?)?.into_iter().enumerate().collect();
    encoded.shuffle(&mut session.rng);
    recall.shuffle(&mut session.rng);

    session.present_instructions(&cfg.instructions)?;

    info!("Running practice trials");
    session.baseline(PRACTICE_BASELINE_SECS)?;
    for row in practice.iter().take(cfg.practice_trials) {
        practice_trial(session, &cfg, row)?;
    }

    session.ready()?;
    session.begin()?;
    session.wait(2.0)?;

    info!("Running testing trials");
    let phases = [
        Phase {
            name: "encoding",
            trigger: TriggerCode::ENCODING_BLOCK,
            prompt: ENCODING_PROMPT,
            rows: encoded,
        },
        Phase {
            name: "recall",
            trigger: TriggerCode::RECALL_BLOCK,
            prompt: RECALL_PROMPT,
            rows: recall,
        },
    ];
    let mut results = session.results(Task::Memory.data_name(), &HEADERS)?;
    for (p, phase) in phases.iter().enumerate() {
        for block in phase.rows.chunks(cfg.block_size.max(1)) {
            session.baseline(BLOCK_BASELINE_SECS)?;
            for (j, (index, row)) in block.iter().enumerate() {
                let trigger = if j == 0 {
                    session.live_trigger(phase.trigger)
                } else {
                    None
                };
                let (img, txt) = testing_trial(session, &cfg, phase, *index, row, trigger)?;
                results.append(&MemoryRecord {
                    phase: phase.name,
                    stimulus: phase.prompt,
                    condition_setting: &row.condition_setting,
                    condition_memory: &row.condition_memory,
                    trial_number: *index,
                    reaction_time_img: img.reaction_time_secs(),
                    response_img: flag(img.correct),
                    reaction_time_text: txt.reaction_time_secs(),
                    response_text: flag(txt.correct),
                    correct_answer: &row.corr_ans,
                    key_pressed_img: img.response_key(),
                    key_pressed_text: txt.response_key(),
                })?;

                let log = &mut session.log;
                log.add_data("IMT_stimulus", phase.prompt);
                log.add_data(
                    "IMT_rt",
                    txt.reaction_time_secs().map(|t| format!("{t:.3}")).unwrap_or_default(),
                );
                log.add_data("IMT_response", flag(txt.correct).map(|c| c.to_string()).unwrap_or_default());
                log.add_data("IMT_corr_ans", &row.corr_ans);
                log.add_data("IMT_key_pressed", txt.response_key().unwrap_or_default());
                log.add_data("IMT_phase", phase.name);
                log.add_data("IMT_condition_setting", &row.condition_setting);
                log.add_data("IMT_condition_memory", &row.condition_memory);
                log.add_data("Task", "IMT");
                log.next_entry();
            }
        }

        if p == 0 {
            session.present_instructions(&cfg.recall_instructions)?;
            session.wait(2.0)?;
            session.blank_screen(1.0, Background::Black)?;
        }
    }

    session.break_screen()
}

fn image_scene<D, T, P, A>(session: &Session<D, T, P, A>, cfg: &MemoryConfig, path: &Path) -> Scene
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    Scene::blank(session.black()).with(Stimulus::image(path, Some(cfg.image_size)))
}

fn practice_trial<D, T, P, A>(
    session: &mut Session<D, T, P, A>,
    cfg: &MemoryConfig,
    row: &MemoryRow,
) -> Result<()>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    let image_secs = seconds(cfg.image_secs, "memory.image_secs")?;
    let trial_secs = seconds(cfg.trial_secs, "memory.trial_secs")?;
    let path = session.config.require(&cfg.practice_dir.join(&row.filename))?;
    let image = image_scene(session, cfg, &path);
    let prompt = Scene::blank(session.black()).with(session.text(ENCODING_PROMPT, WHITE));

    let plan = TrialPlan::passive(trial_secs)
        .with_window(ResponseWindow::new(image_secs, trial_secs, arrows()));
    let outcome = session.run_trial(&plan, |t| {
        if t < image_secs {
            image.clone()
        } else {
            prompt.clone()
        }
    })?;

    let (message, color) = match outcome.first_response() {
        Some(r) if r.key == Key::from_name(&row.corr_ans) => ("Correct!", [0.0, 1.0, -1.0]),
        Some(_) => ("Incorrect", [1.0, 0.0, 0.0]),
        None => ("No key pressed!", [-1.0, -1.0, 1.0]),
    };
    let feedback = Scene::blank(session.black()).with(session.text(message, rgb(color)));
    session.publish_frame(&feedback, FrameIntent::none())?;
    session.wait(2.0)?;
    session.blank_screen(1.0, Background::Black)
}

/// Runs one testing trial and scores the image and prompt windows.
fn testing_trial<D, T, P, A>(
    session: &mut Session<D, T, P, A>,
    cfg: &MemoryConfig,
    phase: &Phase,
    index: usize,
    row: &MemoryRow,
    trigger: Option<TriggerCode>,
) -> Result<(TrialResult, TrialResult)>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    let image_secs = seconds(cfg.image_secs, "memory.image_secs")?;
    let trial_secs = seconds(cfg.trial_secs, "memory.trial_secs")?;
    let path = session.config.require(&cfg.stimuli_dir.join(&row.filename))?;
    let image = image_scene(session, cfg, &path);
    let prompt = Scene::blank(session.black()).with(session.text(phase.prompt, WHITE));

    let spec = TrialSpec {
        index,
        stimulus: row.filename.display().to_string(),
        condition: row.condition_setting.clone(),
        trigger,
        duration: trial_secs,
    };
    let plan = TrialPlan::for_spec(&spec)
        .with_window(ResponseWindow::new(Duration::ZERO, image_secs, arrows()))
        .with_window(ResponseWindow::new(image_secs, spec.duration, arrows()));
    let outcome = session.run_trial(&plan, |t| {
        if t < image_secs {
            image.clone()
        } else {
            prompt.clone()
        }
    })?;

    let expected = Key::from_name(&row.corr_ans);
    let img = TrialResult::from_spec(&spec, outcome.response(0).cloned()).scored(&expected);
    let txt = TrialResult::from_spec(&spec, outcome.response(1).cloned()).scored(&expected);
    Ok((img, txt))
}
