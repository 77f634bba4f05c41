//! Sessions, the trial loop and the experiment tasks.

pub mod config;
pub mod headless;
pub mod log;
pub mod session;
pub mod tables;
pub mod tasks;
pub mod trial;

pub use config::{OnacConfig, DEFAULT_CONFIG_FILE};
pub use headless::HeadlessDisplay;
pub use log::{ExperimentLog, ResultsWriter};
pub use session::{Background, Session};
pub use tasks::Task;
pub use trial::{ExitPolicy, FrameIntent, ResponseWindow, TrialOutcome, TrialPlan};
