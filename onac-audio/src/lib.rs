pub mod sink;
pub mod sound;

#[cfg(feature = "cpal-output")]
pub mod output;

pub use sink::{AudioSink, NullAudio, RecordingAudio, SoundLibrary};
pub use sound::{Sound, DEFAULT_SAMPLE_RATE, HAMMING_RAMP_SECS, MIDDLE_C_HZ};

#[cfg(feature = "cpal-output")]
pub use output::CpalOutput;
