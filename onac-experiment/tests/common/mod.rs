#![allow(dead_code)]

use onac_audio::RecordingAudio;
use onac_core::{ExperimentInfo, Key, TEST_PARTICIPANT};
use onac_experiment::{HeadlessDisplay, OnacConfig, Session};
use onac_timing::{ManualTimer, Timer};
use onac_trigger::RecordingTrigger;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub type TestSession = Session<HeadlessDisplay, ManualTimer, RecordingTrigger, RecordingAudio>;

pub const REFRESH_HZ: f64 = 60.0;

pub fn frame() -> Duration {
    Duration::from_secs_f64(1.0 / REFRESH_HZ)
}

/// An asset tree under the system temp dir, removed on drop.
pub struct Fixture {
    pub root: PathBuf,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        static NEXT: AtomicUsize = AtomicUsize::new(0);
        let root = std::env::temp_dir().join(format!(
            "onac-it-{}-{}-{name}",
            std::process::id(),
            NEXT.fetch_add(1, Ordering::Relaxed)
        ));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        let fixture = Self { root };
        for image in [
            "ready.png",
            "Instructions/task_finished.png",
            "Instructions/task_finished_mid.png",
            "Instructions/page1.png",
        ] {
            fixture.file(image, "");
        }
        fixture
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn file(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// A one-page instruction table pointing at `Instructions/page1.png`.
    pub fn instructions(&self, rel: &str) -> PathBuf {
        self.file(rel, "path\nInstructions/page1.png\n")
    }

    /// 0.2 s of a quiet 16-bit mono tone.
    pub fn wav(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for i in 0..1_600 {
            writer.write_sample(((i % 16) as i16 - 8) * 256).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    pub fn config(&self) -> OnacConfig {
        let mut config = OnacConfig::default();
        config.paths.asset_root = self.root.clone();
        config.paths.data_dir = self.root.join("data");
        config.paths.font = None;
        config.session.seed = Some(7);
        config.session.calibration_frames = 10;
        config.display.resolution = (800, 600);
        config
    }

    /// Every CSV written to the data directory whose name contains `needle`.
    pub fn data_file(&self, needle: &str) -> PathBuf {
        std::fs::read_dir(self.root.join("data"))
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| p.to_string_lossy().contains(needle))
            .unwrap_or_else(|| panic!("no data file matching {needle}"))
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

pub struct Harness {
    pub session: TestSession,
    pub timer: ManualTimer,
    pub trigger: RecordingTrigger,
    pub audio: RecordingAudio,
}

/// Builds a session on a 60 Hz headless display. Key presses are given in
/// seconds on the session clock.
pub fn harness(config: OnacConfig, script: &[(f64, Key)]) -> Harness {
    let timer = ManualTimer::new();
    let mut display = HeadlessDisplay::new(config.display.resolution, timer.clone(), REFRESH_HZ);
    for (at, key) in script {
        display = display.press_at(Duration::from_secs_f64(*at), key.clone());
    }
    let clock = timer.clone();
    let trigger = RecordingTrigger::with_clock(move || clock.now());
    let audio = RecordingAudio::new();
    let info = ExperimentInfo::new(TEST_PARTICIPANT, &config.session.experiment_name, "it");
    let session = Session::new(
        display,
        timer.clone(),
        trigger.clone(),
        audio.clone(),
        config,
        info,
    );
    Harness {
        session,
        timer,
        trigger,
        audio,
    }
}

pub fn read_csv(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect()
}

pub fn secs(d: Duration) -> f64 {
    d.as_secs_f64()
}

/// Defaults with a fixed seed, for tests that never touch the asset tree.
pub fn bare_config() -> OnacConfig {
    let mut config = OnacConfig::default();
    config.session.seed = Some(11);
    config.paths.font = None;
    config
}

impl Harness {
    pub fn timer_secs(&self) -> f64 {
        self.timer.now() as f64 / 1e9
    }
}
