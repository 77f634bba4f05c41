use hound::{SampleFormat, WavReader};
use onac_core::{Error, Result};
use std::f32::consts::PI;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
/// Length of each Hamming onset/offset ramp.
pub const HAMMING_RAMP_SECS: f32 = 0.01;
pub const MIDDLE_C_HZ: f32 = 261.63;

/// A mono clip at a fixed sample rate, ready for the output device.
#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub label: String,
    pub samples: Arc<[f32]>,
    pub sample_rate: u32,
}

impl Sound {
    pub fn new(label: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            label: label.into(),
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Decodes a WAV file, downmixes it to mono and resamples to `sample_rate`.
    pub fn from_wav(path: &Path, sample_rate: u32) -> Result<Self> {
        let mut reader = WavReader::open(path).map_err(|e| Error::asset(path, e))?;
        let spec = reader.spec();
        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.samples::<f32>().collect::<std::result::Result<_, _>>(),
            SampleFormat::Int => {
                let scale = 1.0 / (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect()
            }
        }
        .map_err(|e| Error::asset(path, e))?;

        let channels = spec.channels.max(1) as usize;
        let mono: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        let label = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(
            label,
            resample(&mono, spec.sample_rate, sample_rate),
            sample_rate,
        ))
    }

    /// Sine tone, e.g. the 0.1 s middle C that closes the resting block.
    pub fn tone(freq_hz: f32, secs: f32, sample_rate: u32) -> Self {
        let n = (secs * sample_rate as f32).round() as usize;
        let step = 2.0 * PI * freq_hz / sample_rate as f32;
        let samples = (0..n).map(|i| (i as f32 * step).sin()).collect();
        Self::new(format!("tone {freq_hz} Hz"), samples, sample_rate)
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// Truncates or pads with silence to exactly `secs`.
    pub fn with_duration(self, secs: f32) -> Self {
        let n = (secs * self.sample_rate as f32).round() as usize;
        let mut samples = self.samples.to_vec();
        samples.resize(n, 0.0);
        Self {
            samples: samples.into(),
            ..self
        }
    }

    /// Applies rising and falling half-Hamming windows of `ramp_secs` each.
    pub fn with_hamming_ramp(self, ramp_secs: f32) -> Self {
        let mut samples = self.samples.to_vec();
        let len = samples.len();
        let n = ((ramp_secs * self.sample_rate as f32) as usize).min(len / 2);
        if n > 0 {
            for i in 0..n {
                let w = 0.54 - 0.46 * (PI * i as f32 / n as f32).cos();
                samples[i] *= w;
                samples[len - 1 - i] *= w;
            }
        }
        Self {
            samples: samples.into(),
            ..self
        }
    }

    /// Scales amplitude. The result is clipped to -1..=1.
    pub fn with_volume(self, volume: f32) -> Self {
        let samples: Vec<f32> = self
            .samples
            .iter()
            .map(|s| (s * volume).clamp(-1.0, 1.0))
            .collect();
        Self {
            samples: samples.into(),
            ..self
        }
    }
}

/// Linear-interpolation resampler.
pub fn resample(samples: &[f32], from: u32, to: u32) -> Vec<f32> {
    if from == to || from == 0 || to == 0 || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from as f64 / to as f64;
    let n = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;
    (0..n)
        .map(|i| {
            let pos = i as f64 * ratio;
            let j = (pos.floor() as usize).min(last);
            let frac = (pos - j as f64) as f32;
            let a = samples[j];
            let b = samples[(j + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, rate: u32, frames: usize) {
        let spec = WavSpec {
            channels,
            sample_rate: rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            for ch in 0..channels {
                let v = if ch == 0 { i16::MAX / 2 } else { 0 };
                writer.write_sample(v).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn wav_is_downmixed_and_resampled() {
        let path = std::env::temp_dir().join(format!("onac-sound-{}.wav", std::process::id()));
        write_wav(&path, 2, 22_050, 22_050);
        let sound = Sound::from_wav(&path, 44_100).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(sound.label, format!("onac-sound-{}", std::process::id()));
        assert_eq!(sound.samples.len(), 44_100);
        assert!((sound.duration_secs() - 1.0).abs() < 1e-3);
        // Left at half scale, right silent
        assert!((sound.samples[100] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn missing_wav_is_an_asset_error() {
        let err = Sound::from_wav(Path::new("/nonexistent/deviant.wav"), 48_000).unwrap_err();
        assert!(matches!(err, Error::Asset { .. }));
    }

    #[test]
    fn hamming_ramp_fades_both_ends() {
        let s = Sound::new("ones", vec![1.0; 4_800], 48_000).with_hamming_ramp(HAMMING_RAMP_SECS);
        assert!((s.samples[0] - 0.08).abs() < 1e-4);
        assert!((s.samples[4_799] - 0.08).abs() < 1e-4);
        assert_eq!(s.samples[2_400], 1.0);
        assert!(s.samples[240] < s.samples[479]);
    }

    #[test]
    fn duration_pads_and_truncates() {
        let s = Sound::new("x", vec![0.5; 100], 1_000);
        assert_eq!(s.clone().with_duration(0.05).samples.len(), 50);
        let padded = s.with_duration(0.2);
        assert_eq!(padded.samples.len(), 200);
        assert_eq!(padded.samples[150], 0.0);
    }

    #[test]
    fn volume_clips() {
        let tone = Sound::tone(MIDDLE_C_HZ, 0.1, DEFAULT_SAMPLE_RATE).with_volume(2.0);
        assert_eq!(tone.samples.len(), 4_800);
        assert!(tone.samples.iter().all(|s| s.abs() <= 1.0));
        assert!(tone.samples.iter().any(|s| *s == 1.0));
    }
}
