use crate::sink::AudioSink;
use crate::sound::Sound;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{unbounded, Receiver, Sender};
use onac_core::{Error, Result};
use std::sync::Arc;
use tracing::{error, info};

enum Command {
    Play(Arc<[f32]>),
    StopAll,
}

/// Default output device. Sounds are handed to the callback thread over a
/// channel and mixed there.
pub struct CpalOutput {
    stream: Option<cpal::Stream>,
    tx: Sender<Command>,
    sample_rate: u32,
    volume: f32,
}

impl CpalOutput {
    pub fn open(volume: f32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".into()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| Error::Audio(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;

        let config = cpal::StreamConfig {
            channels: supported.channels(),
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (tx, rx) = unbounded();
        let mut mixer = Mixer::new(rx);
        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| mixer.fill(data, channels),
                |err| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;
        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        info!(sample_rate, channels, "audio output open");

        Ok(Self {
            stream: Some(stream),
            tx,
            sample_rate,
            volume,
        })
    }
}

impl AudioSink for CpalOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&mut self, sound: &Sound) -> Result<()> {
        let samples = if sound.sample_rate == self.sample_rate {
            Arc::clone(&sound.samples)
        } else {
            crate::sound::resample(&sound.samples, sound.sample_rate, self.sample_rate).into()
        };
        let samples: Arc<[f32]> = if (self.volume - 1.0).abs() > f32::EPSILON {
            samples
                .iter()
                .map(|s| (s * self.volume).clamp(-1.0, 1.0))
                .collect::<Vec<_>>()
                .into()
        } else {
            samples
        };
        self.tx
            .send(Command::Play(samples))
            .map_err(|_| Error::Audio("audio stream stopped".into()))
    }

    fn stop_all(&mut self) -> Result<()> {
        // A closed channel means the stream is already gone.
        let _ = self.tx.send(Command::StopAll);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.stop_all()?;
        self.stream.take();
        Ok(())
    }
}

struct Mixer {
    rx: Receiver<Command>,
    voices: Vec<(Arc<[f32]>, usize)>,
}

impl Mixer {
    fn new(rx: Receiver<Command>) -> Self {
        Self {
            rx,
            voices: Vec::new(),
        }
    }

    fn fill(&mut self, data: &mut [f32], channels: usize) {
        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                Command::Play(samples) => self.voices.push((samples, 0)),
                Command::StopAll => self.voices.clear(),
            }
        }
        for frame in data.chunks_mut(channels.max(1)) {
            let mut s = 0.0f32;
            for (samples, pos) in &mut self.voices {
                if let Some(v) = samples.get(*pos) {
                    s += v;
                    *pos += 1;
                }
            }
            frame.fill(s.clamp(-1.0, 1.0));
        }
        self.voices.retain(|(samples, pos)| *pos < samples.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mixer_sums_voices_and_drops_finished_ones() {
        let (tx, rx) = unbounded();
        let mut mixer = Mixer::new(rx);
        tx.send(Command::Play(vec![0.25; 4].into())).unwrap();
        tx.send(Command::Play(vec![0.5; 2].into())).unwrap();

        let mut out = vec![0.0; 8];
        mixer.fill(&mut out, 2);
        assert_eq!(out, vec![0.75, 0.75, 0.75, 0.75, 0.25, 0.25, 0.25, 0.25]);
        assert!(mixer.voices.is_empty());

        tx.send(Command::Play(vec![0.1; 10].into())).unwrap();
        tx.send(Command::StopAll).unwrap();
        mixer.fill(&mut out, 2);
        assert!(out.iter().all(|s| *s == 0.0));
    }
}
