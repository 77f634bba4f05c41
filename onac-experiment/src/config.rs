//! `onac.toml`: paths, ports and task parameters for a site.
//!
//! Every field has a default, so a partial file is fine. Relative paths
//! resolve against `paths.asset_root`.

use onac_core::stimulus::signed_rgb;
use onac_core::{Error, Result, Rgba, TriggerCode};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const DEFAULT_CONFIG_FILE: &str = "onac.toml";

const HEADER: &str = "\
# ONAC experiment runner configuration.
#
# Relative paths resolve against [paths] asset_root. Colours use the signed
# -1..1 RGB space of the stimulus tables. Delete this file to regenerate it.

";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OnacConfig {
    pub session: SessionConfig,
    pub paths: PathsConfig,
    pub display: DisplayConfig,
    pub serial: SerialConfig,
    pub audio: AudioConfig,
    pub mmn: MmnConfig,
    pub motor: MotorConfig,
    pub resting: RestingConfig,
    pub memory: MemoryConfig,
    pub visual: VisualConfig,
    pub visual_bnirs: VisualBnirsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub experiment_name: String,
    /// Real session: prompt for the participant and send serial triggers.
    pub live: bool,
    pub prompt_participant: bool,
    /// Seeds trial shuffling and jitter. Random when unset.
    pub seed: Option<u64>,
    /// Blank frames flipped at startup to measure the refresh rate.
    pub calibration_frames: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            experiment_name: "Optical Neuroimaging and Cognition (ONAC)".into(),
            live: true,
            prompt_participant: true,
            seed: None,
            calibration_frames: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub asset_root: PathBuf,
    pub data_dir: PathBuf,
    pub break_image: PathBuf,
    pub finished_image: PathBuf,
    pub ready_image: PathBuf,
    /// TrueType font for text stimuli.
    pub font: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            asset_root: "assets".into(),
            data_dir: "data".into(),
            break_image: "Instructions/task_finished.png".into(),
            finished_image: "Instructions/task_finished_mid.png".into(),
            ready_image: "ready.png".into(),
            font: Some("fonts/DejaVuSans.ttf".into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub resolution: (u32, u32),
    pub fullscreen: bool,
    /// Monitor index; falls back to the primary monitor when out of range.
    pub screen: usize,
    pub background: [f32; 3],
    pub grey: [f32; 3],
    pub fixation_color: [f32; 3],
    /// Fixation cross height in normalized units of the window height.
    pub fixation_height: f32,
    /// Text height in pixels.
    pub text_height: f32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            resolution: (1920, 1080),
            fullscreen: true,
            screen: 1,
            background: [-1.0, -1.0, -1.0],
            grey: [0.0, 0.0, 0.0],
            fixation_color: [-1.0, -1.0, 1.0],
            fixation_height: 0.1,
            text_height: 54.0,
        }
    }
}

impl DisplayConfig {
    pub fn background_rgba(&self) -> Rgba {
        rgb(self.background)
    }

    pub fn grey_rgba(&self) -> Rgba {
        rgb(self.grey)
    }

    pub fn fixation_rgba(&self) -> Rgba {
        rgb(self.fixation_color)
    }
}

pub fn rgb(c: [f32; 3]) -> Rgba {
    signed_rgb(c[0], c[1], c[2])
}

/// `secs` as a `Duration`. Negative, NaN and overflowing values are a
/// config error naming `name`.
pub fn seconds(secs: f64, name: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|e| Error::Config(format!("{name} = {secs}: {e}")))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// e.g. `/dev/tty.usbserial-FTBXN67I` or `COM4`. No triggers when unset.
    pub port: Option<String>,
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub volume: f32,
    pub sample_rate: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            sample_rate: 48_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MmnConfig {
    pub stimuli: PathBuf,
    pub instructions: Option<PathBuf>,
    pub sound_dir: PathBuf,
    /// Leading table rows to drop.
    pub skip_rows: usize,
    pub sound_secs: f32,
    pub volume: f32,
    /// Still shown behind the oddball sequence.
    pub background_image: Option<PathBuf>,
}

impl Default for MmnConfig {
    fn default() -> Self {
        Self {
            stimuli: "mismatched_negativity_task/fixed_stims.csv".into(),
            instructions: Some(
                "mismatched_negativity_task/mismatched_negativity_instructions.csv".into(),
            ),
            sound_dir: "mismatched_negativity_task/auditory_stimuli".into(),
            skip_rows: 1,
            sound_secs: 1.0,
            volume: 1.0,
            background_image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub stimuli: PathBuf,
    pub repetitions: usize,
    pub baseline_secs: f64,
    pub rest_trigger: TriggerCode,
    pub rest_secs: f64,
    pub max_response_secs: f64,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            stimuli: "naturalistic_motor_task/naturalistic_motor_task_stimuli.csv".into(),
            repetitions: 3,
            baseline_secs: 7.0,
            rest_trigger: TriggerCode::REST,
            rest_secs: 20.0,
            max_response_secs: 600.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestingConfig {
    pub instructions: PathBuf,
    pub minutes: f64,
    pub tone_hz: f32,
    pub tone_secs: f32,
    pub tone_volume: f32,
}

impl Default for RestingConfig {
    fn default() -> Self {
        Self {
            instructions: "resting_state/resting_state_instructions.csv".into(),
            minutes: 5.0,
            tone_hz: onac_audio::MIDDLE_C_HZ,
            tone_secs: 0.1,
            tone_volume: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub instructions: PathBuf,
    pub recall_instructions: PathBuf,
    pub practice: PathBuf,
    pub encoded: PathBuf,
    pub recall: PathBuf,
    /// Image directories the `filename` columns are relative to.
    pub practice_dir: PathBuf,
    pub stimuli_dir: PathBuf,
    pub practice_trials: usize,
    pub block_size: usize,
    pub image_size: (u32, u32),
    pub image_secs: f64,
    pub trial_secs: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            instructions: "memory_task/memory_task_instructions.csv".into(),
            recall_instructions: "memory_task/memory_task_instructions_recall.csv".into(),
            practice: "memory_task/official_stimuli/practice_stimuli/practice.csv".into(),
            encoded: "memory_task/official_stimuli/stimuli/encoded.csv".into(),
            recall: "memory_task/official_stimuli/stimuli/recall.csv".into(),
            practice_dir: "memory_task/official_stimuli/practice_stimuli".into(),
            stimuli_dir: "memory_task/official_stimuli".into(),
            practice_trials: 6,
            block_size: 2,
            image_size: (960, 600),
            image_secs: 3.0,
            trial_secs: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    pub instructions: Option<PathBuf>,
    pub stimuli: PathBuf,
    pub baseline_secs: f64,
    pub stimulation_secs: f64,
    pub rest_secs: f64,
    /// Checkerboard diameter in normalized units of the window height.
    pub board_size: f32,
    pub radial_cycles: u32,
    pub angular_cycles: u32,
    pub fixation_height: f32,
    pub fixation_color: [f32; 3],
    pub dot_diameter: f32,
    pub dot_color: [f32; 3],
    /// First possible dot onset, in whole seconds.
    pub dot_onset_range: (u32, u32),
    pub dot_secs: f64,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            instructions: Some("visual_stimulation/instructions.csv".into()),
            stimuli: "visual_stimulation/visual_stimulation_stimuli.csv".into(),
            baseline_secs: 10.0,
            stimulation_secs: 10.0,
            rest_secs: 5.0,
            board_size: 1.5,
            radial_cycles: 6,
            angular_cycles: 12,
            fixation_height: 0.2,
            fixation_color: [0.0, 0.0, 0.0],
            dot_diameter: 25.0,
            dot_color: [1.0, -1.0, 1.0],
            dot_onset_range: (1, 7),
            dot_secs: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualBnirsConfig {
    pub trials: usize,
    pub frequency: f64,
}

impl Default for VisualBnirsConfig {
    fn default() -> Self {
        Self {
            trials: 12,
            frequency: 7.5,
        }
    }
}

impl OnacConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every timing field converts to a `Duration`.
    pub fn validate(&self) -> Result<()> {
        let durations = [
            (self.motor.baseline_secs, "motor.baseline_secs"),
            (self.motor.rest_secs, "motor.rest_secs"),
            (self.motor.max_response_secs, "motor.max_response_secs"),
            (self.resting.minutes * 60.0, "resting.minutes"),
            (self.memory.image_secs, "memory.image_secs"),
            (self.memory.trial_secs, "memory.trial_secs"),
            (self.visual.baseline_secs, "visual.baseline_secs"),
            (self.visual.stimulation_secs, "visual.stimulation_secs"),
            (self.visual.rest_secs, "visual.rest_secs"),
            (self.visual.dot_secs, "visual.dot_secs"),
        ];
        for (secs, name) in durations {
            seconds(secs, name)?;
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        let body = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        Ok(format!("{HEADER}{body}"))
    }

    /// Reads `path`, or writes the defaults there first when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, config.to_toml()?)?;
            info!(path = %path.display(), "wrote default configuration");
            return Ok(config);
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Joins relative paths onto the asset root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.asset_root.join(path)
        }
    }

    /// Like [`resolve`](Self::resolve) but fails when the file is missing.
    pub fn require(&self, path: &Path) -> Result<PathBuf> {
        let full = self.resolve(path);
        if full.exists() {
            Ok(full)
        } else {
            Err(Error::asset(full, "configured file not found"))
        }
    }
}
