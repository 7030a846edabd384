//! Delivery sinks: where the pacing loop hands off video frames and PCM.

use crate::{format::OutputFormat, surface::TargetImage, time::Timestamp};
use anyhow::{anyhow, Context, Result};
use byteorder::{ByteOrder, LittleEndian};
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

/// One chunk of converted audio.
#[derive(Clone, Copy, Debug)]
pub struct AudioSubmission<'a> {
    pub timestamp: Timestamp,
    /// Interleaved little-endian PCM, block aligned
    pub pcm: &'a [u8],
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel
    pub sample_count: u32,
}

/// Receiver of paced media.
///
/// Failures are reported back to the pacing loop, which logs them and
/// carries on with the next unit.
pub trait DeliverySink: Send {
    /// Called each time a new frame has been copied into `image`. The sink
    /// must not hold on to the lock past the call.
    fn submit_video(&mut self, image: &TargetImage) -> Result<()>;

    fn submit_audio(&mut self, audio: AudioSubmission<'_>) -> Result<()>;

    /// Flush and release resources. Called once when the loop stops.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Sink that discards everything, keeping count.
#[derive(Debug, Default)]
pub struct NullSink {
    pub video_frames: u64,
    pub audio_samples: u64,
}

impl DeliverySink for NullSink {
    fn submit_video(&mut self, _image: &TargetImage) -> Result<()> {
        self.video_frames += 1;
        Ok(())
    }

    fn submit_audio(&mut self, audio: AudioSubmission<'_>) -> Result<()> {
        self.audio_samples += audio.sample_count as u64;
        Ok(())
    }
}

/// Records the delivered audio to a WAV file. Video submissions are only
/// counted.
pub struct WavSink {
    writer: Option<WavWriter<BufWriter<File>>>,
    path: PathBuf,
    spec: WavSpec,
    video_frames: u64,
}

impl WavSink {
    pub fn create(path: &Path, format: OutputFormat) -> Result<Self> {
        if format.bits_per_sample != 16 {
            return Err(anyhow!(
                "WAV sink only writes 16-bit PCM, got {} bit",
                format.bits_per_sample
            ));
        }

        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.bits_per_sample,
            sample_format: SampleFormat::Int,
        };
        let writer = WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create {}", path.display()))?;

        info!("Recording audio to {}", path.display());

        Ok(WavSink {
            writer: Some(writer),
            path: path.to_path_buf(),
            spec,
            video_frames: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn video_frames(&self) -> u64 {
        self.video_frames
    }
}

impl DeliverySink for WavSink {
    fn submit_video(&mut self, image: &TargetImage) -> Result<()> {
        let (width, height) = image.dimensions();
        trace!("Video frame {width}x{height} delivered");
        self.video_frames += 1;
        Ok(())
    }

    fn submit_audio(&mut self, audio: AudioSubmission<'_>) -> Result<()> {
        if audio.sample_rate != self.spec.sample_rate || audio.channels != self.spec.channels {
            return Err(anyhow!(
                "Expected {} Hz / {} channels, got {} Hz / {} channels",
                self.spec.sample_rate,
                self.spec.channels,
                audio.sample_rate,
                audio.channels
            ));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("WAV sink already closed"))?;

        let mut samples = vec![0i16; audio.pcm.len() / 2];
        LittleEndian::read_i16_into(&audio.pcm[..samples.len() * 2], &mut samples);

        for sample in samples {
            writer.write_sample(sample)?;
        }

        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
            info!(
                "Finished {} ({} video frames seen)",
                self.path.display(),
                self.video_frames
            );
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SinkConfig {
    #[default]
    Null,
    /// One `<peer>.wav` per session under `dir`
    Wav { dir: PathBuf },
}

/// Build the sink for one session.
pub fn build(config: &SinkConfig, name: &str, format: OutputFormat) -> Result<Box<dyn DeliverySink>> {
    match config {
        SinkConfig::Null => Ok(Box::new(NullSink::default())),
        SinkConfig::Wav { dir } => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let path = dir.join(format!("{name}.wav"));
            Ok(Box::new(WavSink::create(&path, format)?))
        }
    }
}
