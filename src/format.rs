//! Audio format descriptions shared by sources, the resampler and sinks.

use crate::{
    constants::{AUDIO_SAMPLE_RATE, BIT_DEPTH, CHANNELS},
    error::{PacerError, Result},
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Native format of decoded source audio (interleaved `f32`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz, {} ch, f32", self.sample_rate, self.channels)
    }
}

/// Fixed PCM format delivered to the sink: interleaved signed integers,
/// little-endian, block aligned.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct OutputFormat {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    #[serde(default = "default_bits_per_sample")]
    pub bits_per_sample: u16,
}

fn default_sample_rate() -> u32 {
    AUDIO_SAMPLE_RATE
}

fn default_channels() -> u16 {
    CHANNELS
}

fn default_bits_per_sample() -> u16 {
    BIT_DEPTH
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat {
            sample_rate: AUDIO_SAMPLE_RATE,
            channels: CHANNELS,
            bits_per_sample: BIT_DEPTH,
        }
    }
}

impl OutputFormat {
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_per_sample as usize / 8
    }

    /// Bytes of one frame (one sample for every channel).
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    pub fn avg_bytes_per_second(&self) -> usize {
        self.block_align() * self.sample_rate as usize
    }

    /// Number of frames in a PCM buffer of `len` bytes.
    ///
    /// Buffers that do not hold a whole number of frames are rejected.
    pub fn sample_count(&self, len: usize) -> Result<u32> {
        let frame_bytes = self.block_align();
        if frame_bytes == 0 || len % frame_bytes != 0 {
            return Err(PacerError::MisalignedAudio { len, frame_bytes });
        }
        Ok((len / self.bytes_per_sample() / self.channels as usize) as u32)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {} bit, block align {}, {} B/s",
            self.sample_rate,
            self.channels,
            self.bits_per_sample,
            self.block_align(),
            self.avg_bytes_per_second()
        )
    }
}
