use crate::sound::Sound;
use onac_cache::AssetCache;
use onac_core::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Where sounds go. Playback never blocks the control loop.
pub trait AudioSink {
    /// Rate sounds should be decoded at for this sink.
    fn sample_rate(&self) -> u32;

    /// Starts `sound` now, mixed over anything already playing.
    fn play(&mut self, sound: &Sound) -> Result<()>;

    fn stop_all(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.stop_all()
    }
}

impl<A: AudioSink + ?Sized> AudioSink for Box<A> {
    fn sample_rate(&self) -> u32 {
        (**self).sample_rate()
    }

    fn play(&mut self, sound: &Sound) -> Result<()> {
        (**self).play(sound)
    }

    fn stop_all(&mut self) -> Result<()> {
        (**self).stop_all()
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}

/// Silently discards sounds, for headless runs and builds without audio output.
#[derive(Debug, Clone, Copy)]
pub struct NullAudio {
    pub sample_rate: u32,
}

impl AudioSink for NullAudio {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&mut self, sound: &Sound) -> Result<()> {
        debug!(label = %sound.label, secs = sound.duration_secs(), "sound skipped (no output)");
        Ok(())
    }
}

/// Records the label of every sound played. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingAudio {
    played: Arc<Mutex<Vec<String>>>,
}

impl RecordingAudio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl AudioSink for RecordingAudio {
    fn sample_rate(&self) -> u32 {
        crate::sound::DEFAULT_SAMPLE_RATE
    }

    fn play(&mut self, sound: &Sound) -> Result<()> {
        self.played
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(sound.label.clone());
        Ok(())
    }
}

/// Decoded WAV files keyed by path, shaped once with the task's envelope.
pub struct SoundLibrary {
    cache: AssetCache<Sound>,
    sample_rate: u32,
}

impl SoundLibrary {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            cache: AssetCache::new(),
            sample_rate,
        }
    }

    /// Loads `path` on first use and runs `shape` over the decoded clip.
    pub fn load_with(
        &mut self,
        path: &Path,
        shape: impl FnOnce(Sound) -> Sound,
    ) -> Result<Arc<Sound>> {
        let rate = self.sample_rate;
        self.cache
            .get_or_try_insert_with(&path.to_string_lossy(), || {
                Sound::from_wav(path, rate).map(shape)
            })
    }

    pub fn load(&mut self, path: &Path) -> Result<Arc<Sound>> {
        self.load_with(path, |s| s)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::MIDDLE_C_HZ;

    #[test]
    fn recording_audio_keeps_labels_in_order() {
        let rec = RecordingAudio::new();
        let mut sink = rec.clone();
        sink.play(&Sound::new("standard", vec![0.0; 10], 1_000)).unwrap();
        sink.play(&Sound::tone(MIDDLE_C_HZ, 0.1, 1_000)).unwrap();
        assert_eq!(rec.played(), vec!["standard".to_string(), "tone 261.63 Hz".to_string()]);
    }

    #[test]
    fn library_reports_missing_files() {
        let mut lib = SoundLibrary::new(48_000);
        assert!(lib.load(Path::new("/nonexistent/a.wav")).is_err());
        assert!(lib.is_empty());
    }
}
