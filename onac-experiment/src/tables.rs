//! Stimulus and instruction tables.
//!
//! Every table is a headed CSV. Cells are whitespace-trimmed and extra
//! columns are ignored.

use csv::{ReaderBuilder, Trim};
use onac_core::{Error, Result, TriggerCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| Error::asset(path, e))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| Error::asset(path, e))
}

/// One image per instruction screen.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InstructionRow {
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MmnRow {
    #[serde(rename = "Trigger")]
    pub trigger: TriggerCode,
    #[serde(rename = "Condition")]
    pub condition: String,
    /// WAV file stem inside the sound directory.
    #[serde(rename = "Sound")]
    pub sound: String,
    /// Trial length in seconds.
    #[serde(rename = "Timing")]
    pub timing: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MotorRow {
    pub stimulus: String,
    pub trigger: TriggerCode,
    pub end_trigger: TriggerCode,
    /// Spoken instruction played with the text.
    pub instruction: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MemoryRow {
    pub filename: PathBuf,
    pub corr_ans: String,
    pub condition_setting: String,
    pub condition_memory: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VisualRow {
    /// Contrast reversal rate in Hz.
    pub frequency: f64,
    pub trigger: TriggerCode,
    pub orientation1: f32,
    pub orientation2: f32,
    pub pos1: f32,
    pub pos2: f32,
    pub side: String,
}
