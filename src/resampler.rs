//! Conversion of native source audio to the fixed output PCM format.
//!
//! Resamplers buffer a variable amount of input before they can emit
//! anything, so they are driven with a push-then-drain protocol: push input
//! while [`Resampler::accepts_input`] holds, then pull one output chunk.

use crate::{
    buffer::SampleFifo,
    constants::RESAMPLER_CHUNK_FRAMES,
    error::{PacerError, Result},
    format::{AudioFormat, OutputFormat},
    sources::RawAudioSample,
    time::Timestamp,
};
use byteorder::{ByteOrder, LittleEndian};
use bytes::Bytes;
use itertools::iproduct;
use rubato::{FftFixedIn, Resampler as _};

/// Converted PCM at the resampler's output format.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioChunk {
    /// Assigned by the resampler, not copied from the source
    pub timestamp: Timestamp,
    /// Interleaved little-endian samples
    pub pcm: Bytes,
}

impl AudioChunk {
    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }
}

pub trait Resampler: Send {
    /// Whether the input buffer has room for another unit.
    fn accepts_input(&self) -> bool;

    fn push_input(&mut self, sample: RawAudioSample) -> Result<()>;

    /// Mark the end of input. Buffered audio is flushed by later pulls.
    fn finish(&mut self);

    /// Convert one chunk, `None` if not enough input is buffered.
    fn pull_output(&mut self) -> Result<Option<AudioChunk>>;

    fn output_format(&self) -> OutputFormat;
}

/// FFT resampler from rubato, fed through a planar FIFO holding at most
/// two input chunks.
pub struct RubatoResampler {
    inner: FftFixedIn<f64>,
    fifo: SampleFifo,
    input: AudioFormat,
    output: OutputFormat,
    capacity: usize,
    delay_remaining: usize,
    base: Option<Timestamp>,
    frames_in: u64,
    frames_out: u64,
    finished: bool,
}

impl RubatoResampler {
    /// Create a resampler, rejecting formats it cannot convert between.
    pub fn new(input: AudioFormat, output: OutputFormat) -> Result<Self> {
        if output.bits_per_sample != 16 {
            return Err(PacerError::UnsupportedFormat(format!(
                "only 16-bit PCM output is supported, got {} bit",
                output.bits_per_sample
            )));
        }
        if output.sample_rate == 0 || output.channels == 0 {
            return Err(PacerError::UnsupportedFormat(format!(
                "invalid output format: {output}"
            )));
        }
        if input.sample_rate == 0 || input.channels == 0 {
            return Err(PacerError::UnsupportedFormat(format!(
                "invalid input format: {input}"
            )));
        }

        let inner = FftFixedIn::<f64>::new(
            input.sample_rate as usize,
            output.sample_rate as usize,
            RESAMPLER_CHUNK_FRAMES,
            2, // sub-chunks
            input.channels as usize,
        )
        .map_err(|e| PacerError::UnsupportedFormat(format!("{input} -> {output}: {e}")))?;

        let delay = inner.output_delay();
        debug!("Resampler {input} -> {output}, output delay {delay} frames");

        Ok(RubatoResampler {
            inner,
            fifo: SampleFifo::new(input.channels as usize),
            input,
            output,
            capacity: RESAMPLER_CHUNK_FRAMES * 2,
            delay_remaining: delay,
            base: None,
            frames_in: 0,
            frames_out: 0,
            finished: false,
        })
    }

    /// Output frames the input seen so far converts to.
    fn expected_total(&self) -> u64 {
        let in_rate = self.input.sample_rate as u128;
        ((self.frames_in as u128 * self.output.sample_rate as u128 + in_rate / 2) / in_rate) as u64
    }

    fn encode(&mut self, planar: &[Vec<f64>], skip: usize, frames: usize) -> AudioChunk {
        let out_channels = self.output.channels as usize;
        let last_channel = planar.len().saturating_sub(1);

        // Mono is duplicated to every output channel; extra input channels are dropped.
        let samples: Vec<i16> = iproduct!(skip..skip + frames, 0..out_channels)
            .map(|(frame, ch)| {
                let sample = planar[ch.min(last_channel)][frame];
                (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
            })
            .collect();

        let mut pcm = vec![0; samples.len() * 2];
        LittleEndian::write_i16_into(&samples, &mut pcm);

        let timestamp = self.base.unwrap_or_default()
            + Timestamp::from_frames(self.frames_out, self.output.sample_rate);
        self.frames_out += frames as u64;

        AudioChunk {
            timestamp,
            pcm: Bytes::from(pcm),
        }
    }
}

impl Resampler for RubatoResampler {
    fn accepts_input(&self) -> bool {
        !self.finished && self.fifo.frames() < self.capacity
    }

    fn push_input(&mut self, sample: RawAudioSample) -> Result<()> {
        if self.finished {
            return Err(PacerError::Resample(
                "input pushed after end of stream".to_string(),
            ));
        }
        if sample.format != self.input {
            return Err(PacerError::UnsupportedFormat(format!(
                "resampler configured for {}, got {}",
                self.input, sample.format
            )));
        }

        self.base.get_or_insert(sample.timestamp);
        self.frames_in += sample.frames() as u64;
        self.fifo.push_interleaved(&sample.samples);
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
        debug!(
            "Resampler input ended after {} frames, {} left to flush",
            self.frames_in,
            self.frames_in
                .saturating_sub(self.fifo.total_frames_consumed())
        );
    }

    fn pull_output(&mut self) -> Result<Option<AudioChunk>> {
        loop {
            let needed = self.inner.input_frames_next();
            let planar = if self.fifo.frames() >= needed {
                let chunk = self.fifo.take(needed);
                self.inner.process(&chunk, None)
            } else if self.finished && self.frames_out < self.expected_total() {
                if self.fifo.is_empty() {
                    self.inner.process_partial::<Vec<f64>>(None, None)
                } else {
                    let chunk = self.fifo.take(self.fifo.frames());
                    self.inner.process_partial(Some(chunk.as_slice()), None)
                }
            } else {
                return Ok(None);
            }
            .map_err(|e| PacerError::Resample(e.to_string()))?;

            let produced = planar.first().map_or(0, Vec::len);
            if produced == 0 {
                return Ok(None);
            }

            // Drop the filter delay from the start of the stream, and the
            // zero padding past the end of it.
            let skip = self.delay_remaining.min(produced);
            self.delay_remaining -= skip;
            let mut usable = produced - skip;
            if self.finished {
                usable = usable.min(self.expected_total().saturating_sub(self.frames_out) as usize);
            }

            if usable > 0 {
                return Ok(Some(self.encode(&planar, skip, usable)));
            }
        }
    }

    fn output_format(&self) -> OutputFormat {
        self.output
    }
}
