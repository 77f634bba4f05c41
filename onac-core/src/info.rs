use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Participant and session identity, fixed at bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentInfo {
    pub participant: String,
    /// `2023_Feb_14_1530` style stamp embedded in every output name.
    pub date: String,
    pub experiment_name: String,
    /// Name of the task script, e.g. `MMN_task`.
    pub script: String,
    pub frame_rate: Option<f64>,
    pub version: String,
}

/// Participant used by non-interactive runs.
pub const TEST_PARTICIPANT: &str = "test";

impl ExperimentInfo {
    pub fn new(participant: &str, experiment_name: &str, script: &str) -> Self {
        Self::at(participant, experiment_name, script, Local::now())
    }

    pub fn at(
        participant: &str,
        experiment_name: &str,
        script: &str,
        when: DateTime<Local>,
    ) -> Self {
        Self {
            participant: participant.trim().to_string(),
            date: date_stamp(&when),
            experiment_name: experiment_name.to_string(),
            script: script.to_string(),
            frame_rate: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// `<data_dir>/{participant}_{experiment}_{date}_{script}`, without extension.
    pub fn output_stem(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!(
            "{}_{}_{}_{}",
            self.participant, self.experiment_name, self.date, self.script
        ))
    }

    /// Per-task results file: `P{participant}_{task}_data_{date}.csv`.
    pub fn task_data_file(&self, dir: &Path, task: &str) -> PathBuf {
        dir.join(format!("P{}_{}_data_{}.csv", self.participant, task, self.date))
    }

    /// Frame duration from the measured rate, 60 Hz when unknown.
    pub fn frame_duration_secs(&self) -> f64 {
        match self.frame_rate {
            Some(rate) if rate > 0.0 => 1.0 / rate.round(),
            _ => 1.0 / 60.0,
        }
    }
}

pub fn date_stamp(when: &DateTime<Local>) -> String {
    when.format("%Y_%b_%d_%H%M").to_string()
}
