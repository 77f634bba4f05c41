//! Error types shared by every onac crate.
//!
//! Nothing in a live session is retried. Hardware and asset failures bubble up
//! through `?` to the session runner, which performs shutdown and exits.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used across the workspace.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The participant pressed escape. Not a fault: the session shuts down cleanly.
    #[error("session aborted by escape key")]
    Escape,

    /// The participant cancelled the pre-run prompt.
    #[error("session cancelled before start")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// A stimulus, instruction or table file could not be loaded.
    #[error("asset {path}: {reason}")]
    Asset { path: PathBuf, reason: String },

    #[error("display error: {0}")]
    Display(String),

    #[error("audio error: {0}")]
    Audio(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A trigger cell that is not a single ASCII character.
    #[error("invalid trigger code {0:?}: expected a single ASCII character")]
    InvalidTrigger(String),
}

impl Error {
    pub fn asset(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Asset {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for the user-initiated abort path.
    pub fn is_escape(&self) -> bool {
        matches!(self, Error::Escape)
    }
}
