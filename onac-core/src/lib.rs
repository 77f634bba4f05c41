pub mod display;
pub mod error;
pub mod info;
pub mod input;
pub mod stimulus;
pub mod trial;
pub mod trigger;

pub use display::Display;
pub use error::{Error, Result};
pub use info::{ExperimentInfo, TEST_PARTICIPANT};
pub use input::{Key, KeyEvent, KeyQueue, KeySet};
pub use stimulus::{Checkerboard, Position, Rgba, Scene, Stimulus};
pub use trial::{Response, TrialResult, TrialSpec};
pub use trigger::TriggerCode;
