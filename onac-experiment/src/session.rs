//! The session context and the presentation primitives every task shares.

use crate::config::{seconds, OnacConfig};
use crate::log::{ExperimentLog, ResultsWriter};
use crate::tables::{read_table, InstructionRow};
use crate::trial::{FrameIntent, TrialPlan};
use onac_audio::{AudioSink, Sound, SoundLibrary};
use onac_core::{
    Display, Error, ExperimentInfo, KeyEvent, KeyQueue, KeySet, Result, Rgba, Scene, Stimulus,
    TriggerCode,
};
use onac_timing::Timer;
use onac_trigger::TriggerPort;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Granularity of blocking waits. Input is polled and escape checked this often.
const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// How long the closing image stays up during shutdown.
const CLOSING_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Background {
    Black,
    Grey,
}

/// Everything a running task touches. Passed by `&mut` to each phase; there
/// is no global state.
pub struct Session<D, T, P, A> {
    pub display: D,
    pub timer: T,
    pub port: P,
    pub audio: A,
    pub keys: KeyQueue,
    pub rng: StdRng,
    pub info: ExperimentInfo,
    pub log: ExperimentLog,
    pub config: OnacConfig,
    sounds: SoundLibrary,
    stem: PathBuf,
    last_flip_ns: Option<u64>,
    shut_down: bool,
}

impl<D, T, P, A> Session<D, T, P, A>
where
    D: Display,
    T: Timer<Timestamp = u64>,
    P: TriggerPort,
    A: AudioSink,
{
    pub fn new(display: D, timer: T, port: P, audio: A, config: OnacConfig, info: ExperimentInfo) -> Self {
        let rng = match config.session.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let stem = info.output_stem(&config.paths.data_dir);
        let sounds = SoundLibrary::new(audio.sample_rate());
        Self {
            display,
            timer,
            port,
            audio,
            keys: KeyQueue::new(),
            rng,
            info,
            log: ExperimentLog::new(),
            config,
            sounds,
            stem,
            last_flip_ns: None,
            shut_down: false,
        }
    }

    /// Hides the cursor and measures the refresh rate over a run of blank frames.
    pub fn bootstrap(&mut self) -> Result<()> {
        info!(participant = %self.info.participant, script = %self.info.script, "Setting up experiment...");
        self.display.set_cursor_visible(false);
        let blank = Scene::blank(self.black());
        for _ in 0..self.config.session.calibration_frames {
            self.publish_frame(&blank, FrameIntent::none())?;
        }
        let stats = self.timer.calibration_stats();
        self.info.frame_rate = stats.frame_rate().or_else(|| self.display.refresh_rate());
        info!(
            "Calibration: {:.3} ms/frame, {:.1} Hz, jitter {:.3} ms",
            stats.average_frame_time_ns / 1_000_000.0,
            stats.effective_fps,
            stats.jitter_ns / 1_000_000.0,
        );
        self.last_flip_ns = None;
        Ok(())
    }

    /// Live sessions send serial triggers and show the participant-facing extras.
    pub fn is_live(&self) -> bool {
        self.config.session.live && self.port.is_live()
    }

    /// `Some(code)` in live sessions, `None` otherwise.
    pub fn live_trigger(&self, code: TriggerCode) -> Option<TriggerCode> {
        self.is_live().then_some(code)
    }

    /// Output path prefix shared by the log, the wide CSV and the JSON snapshot.
    pub fn stem(&self) -> &Path {
        &self.stem
    }

    pub fn stem_with(&self, extension: &str) -> PathBuf {
        let mut path = self.stem.clone().into_os_string();
        path.push(".");
        path.push(extension);
        path.into()
    }

    pub fn size(&self) -> (u32, u32) {
        self.display.size()
    }

    /// Converts a height in normalized units (2 = full window height) to pixels.
    pub fn norm_height(&self, h: f32) -> f32 {
        h * self.size().1 as f32 * 0.5
    }

    pub fn black(&self) -> Rgba {
        self.config.display.background_rgba()
    }

    pub fn grey(&self) -> Rgba {
        self.config.display.grey_rgba()
    }

    pub fn fixation_scene(&self) -> Scene {
        Scene::blank(self.grey()).with(Stimulus::Fixation {
            size: self.norm_height(self.config.display.fixation_height),
            color: self.config.display.fixation_rgba(),
        })
    }

    pub fn text(&self, content: &str, color: Rgba) -> Stimulus {
        Stimulus::text(content, self.config.display.text_height, color)
    }

    pub fn jitter(&mut self) -> f64 {
        self.rng.random::<f64>() / 10.0
    }

    /// Draws `scene`, flips, and applies `intent` right after the flip returns.
    /// Returns the flip timestamp.
    pub fn publish_frame(&mut self, scene: &Scene, intent: FrameIntent) -> Result<u64> {
        self.display.draw(scene)?;
        let flip_ns = self.display.flip()?;
        if let Some(code) = intent.trigger {
            self.port.write_code(code)?;
            self.log_trigger(code, flip_ns);
        }
        if let Some(sound) = intent.sound.as_deref() {
            self.audio.play(sound)?;
        }
        if let Some(prev) = self.last_flip_ns.replace(flip_ns) {
            self.timer
                .record_frame(Duration::from_nanos(flip_ns.saturating_sub(prev)));
        }
        self.poll_input();
        self.check_for_escape()?;
        Ok(flip_ns)
    }

    /// Writes `code` immediately, not tied to a flip.
    pub fn send_trigger_now(&mut self, code: TriggerCode) -> Result<()> {
        self.port.write_code(code)?;
        let now = self.timer.now();
        self.log_trigger(code, now);
        Ok(())
    }

    fn log_trigger(&mut self, code: TriggerCode, at_ns: u64) {
        debug!(%code, at_ns, "trigger sent");
        self.log.add_data("trigger", code);
        self.log
            .add_data("trigger_time", format!("{:.6}", at_ns as f64 / 1e9));
    }

    pub fn poll_input(&mut self) {
        let events = self.display.poll_keys();
        self.keys.extend(events);
    }

    pub fn check_for_escape(&mut self) -> Result<()> {
        if self.keys.take_escape() {
            warn!("escape pressed, aborting");
            return Err(Error::Escape);
        }
        Ok(())
    }

    /// Waits `secs` plus up to 100 ms of random jitter.
    pub fn wait(&mut self, secs: f64) -> Result<()> {
        let jitter = self.jitter();
        self.wait_exact(seconds(secs + jitter, "wait")?)
    }

    pub fn wait_exact(&mut self, duration: Duration) -> Result<()> {
        self.last_flip_ns = None;
        let deadline = self.timer.now() + duration.as_nanos() as u64;
        loop {
            let now = self.timer.now();
            if now >= deadline {
                return Ok(());
            }
            self.timer
                .sleep(Duration::from_nanos(deadline - now).min(POLL_INTERVAL));
            self.poll_input();
            self.check_for_escape()?;
        }
    }

    /// Blocks until a key in `keys` is pressed. Earlier presses are dropped.
    /// Returns `None` right away when the display cannot take input.
    pub fn wait_keys(&mut self, keys: &KeySet) -> Result<Option<KeyEvent>> {
        self.last_flip_ns = None;
        self.poll_input();
        self.check_for_escape()?;
        self.keys.clear();
        loop {
            if let Some(event) = self.keys.take_matching(keys).into_iter().next() {
                self.keys.clear();
                return Ok(Some(event));
            }
            if self.display.auto_advance() {
                return Ok(None);
            }
            self.timer.sleep(POLL_INTERVAL);
            self.poll_input();
            self.check_for_escape()?;
        }
    }

    /// Flips a black frame.
    pub fn clear(&mut self) -> Result<()> {
        let black = Scene::blank(self.black());
        self.publish_frame(&black, FrameIntent::none())?;
        Ok(())
    }

    pub fn blank_screen(&mut self, secs: f64, background: Background) -> Result<()> {
        let fill = match background {
            Background::Black => self.black(),
            Background::Grey => self.grey(),
        };
        self.publish_frame(&Scene::blank(fill), FrameIntent::none())?;
        self.wait_exact(seconds(secs, "blank screen")?)?;
        let black = Scene::blank(self.black());
        self.publish_frame(&black, FrameIntent::none())?;
        Ok(())
    }

    /// Fixation cross on grey for `secs` plus jitter.
    pub fn baseline(&mut self, secs: f64) -> Result<()> {
        let duration = seconds(secs + self.jitter(), "baseline")?;
        let scene = self.fixation_scene();
        self.run_trial(&TrialPlan::passive(duration), |_| scene.clone())?;
        Ok(())
    }

    /// Shows each image listed in an instruction table until a key is pressed.
    pub fn present_instructions(&mut self, table: &Path) -> Result<()> {
        let rows: Vec<InstructionRow> = read_table(&self.config.require(table)?)?;
        info!(screens = rows.len(), "Presenting instructions...");
        for row in rows {
            self.show_image(&row.path, None)?;
        }
        Ok(())
    }

    /// Full-screen image on grey, for `secs` or until a key press.
    pub fn show_image(&mut self, path: &Path, secs: Option<f64>) -> Result<()> {
        let full = self.config.require(path)?;
        let scene = Scene::blank(self.grey()).with(Stimulus::image(full, Some(self.size())));
        self.publish_frame(&scene, FrameIntent::none())?;
        match secs {
            Some(secs) => {
                self.wait_exact(seconds(secs, "image display")?)?;
                let black = Scene::blank(self.black());
                self.publish_frame(&black, FrameIntent::none())?;
            }
            None => {
                self.wait_keys(&KeySet::Any)?;
            }
        }
        Ok(())
    }

    pub fn break_screen(&mut self) -> Result<()> {
        info!("Break time!");
        let path = self.config.paths.break_image.clone();
        self.show_image(&path, None)
    }

    pub fn ready(&mut self) -> Result<()> {
        let path = self.config.paths.ready_image.clone();
        self.show_image(&path, None)
    }

    /// Sends `Z` on the next flip and logs the wall-clock time.
    pub fn start_trigger(&mut self) -> Result<()> {
        info!("Sending start trigger");
        let blank = Scene::blank(self.black());
        self.publish_frame(&blank, FrameIntent::trigger(TriggerCode::SESSION_START))?;
        self.log
            .add_data("Time", chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.6f"));
        self.log.next_entry();
        Ok(())
    }

    /// Start trigger in live sessions, a plain black flip otherwise.
    pub fn begin(&mut self) -> Result<()> {
        if self.is_live() {
            self.start_trigger()
        } else {
            self.clear()
        }
    }

    /// Opens the task's results CSV in the data directory.
    pub fn results(&self, task: &str, headers: &[&str]) -> Result<ResultsWriter> {
        let path = self.info.task_data_file(&self.config.paths.data_dir, task);
        ResultsWriter::create(&path, headers)
    }

    /// Decodes a WAV once per session and applies `shape` to it.
    pub fn load_sound(
        &mut self,
        path: &Path,
        shape: impl FnOnce(Sound) -> Sound,
    ) -> Result<Arc<Sound>> {
        let full = self.config.require(path)?;
        self.sounds.load_with(&full, shape)
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Closing image, cursor back, logs saved, port and window closed.
    /// Runs once; later calls do nothing. Every step runs even if an earlier
    /// one fails, and the first failure is returned.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;
        info!("Ending experiment...");

        let steps = [
            ("closing screen", self.show_closing_image()),
            ("cursor", self.restore_cursor()),
            ("wide log", self.save_wide_log()),
            ("json snapshot", self.save_snapshot()),
            ("trigger port", self.port.close()),
            ("audio", self.audio.close()),
            ("display", self.display.close()),
        ];
        let mut first = None;
        for (step, result) in steps {
            if let Err(e) = result {
                warn!(step, error = %e, "shutdown step failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    fn show_closing_image(&mut self) -> Result<()> {
        let path = self.config.resolve(&self.config.paths.finished_image);
        let mut scene = Scene::blank(self.grey());
        if path.exists() {
            scene.push(Stimulus::image(path, Some(self.size())));
        } else {
            warn!(path = %path.display(), "closing image missing");
        }
        self.display.draw(&scene)?;
        self.display.flip()?;
        self.timer.sleep(Duration::from_secs_f64(CLOSING_SECS));
        Ok(())
    }

    fn restore_cursor(&mut self) -> Result<()> {
        self.display.set_cursor_visible(true);
        let black = Scene::blank(self.black());
        self.display.draw(&black)?;
        self.display.flip()?;
        Ok(())
    }

    fn save_wide_log(&mut self) -> Result<()> {
        let path = self.stem_with("csv");
        self.log.save_wide_csv(&path, &self.info)
    }

    fn save_snapshot(&mut self) -> Result<()> {
        let path = self.stem_with("json");
        self.log.save_json(&path, &self.info)
    }
}
