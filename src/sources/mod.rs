//! Sample source abstraction for the pacing loop.
//!
//! All sources implement the `SampleSource` trait, which provides a
//! pull-based interface: the pacing loop decides when a video frame or an
//! audio unit is due and asks for exactly one.

pub mod file;
pub mod raw_video;
pub mod symphonia;
pub mod synthetic;

use crate::{
    config::MediaConfig,
    error::Result,
    format::AudioFormat,
    surface::VideoImage,
    time::Timestamp,
};

/// One decoded video frame.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pub timestamp: Timestamp,
    pub image: VideoImage,
}

/// One decoded audio unit in the source's native format.
#[derive(Clone, Debug)]
pub struct RawAudioSample {
    pub timestamp: Timestamp,
    pub format: AudioFormat,
    /// Interleaved samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
}

impl RawAudioSample {
    pub fn frames(&self) -> usize {
        match self.format.channels {
            0 => 0,
            channels => self.samples.len() / channels as usize,
        }
    }
}

/// Trait for media sources that produce timestamped samples on demand.
///
/// Reading advances the decoder irreversibly; there is no seeking. Any
/// error is fatal to the session that owns the source.
pub trait SampleSource: Send {
    /// Dimensions of the video track, `None` if there is none.
    fn video_size(&self) -> Option<(u32, u32)>;

    /// Native format of the audio track, `None` if there is none.
    fn audio_format(&self) -> Option<AudioFormat>;

    /// Pull the next video frame.
    ///
    /// Returns:
    /// - `Ok(Some(frame))` with the next frame in presentation order
    /// - `Ok(None)` at end of stream, or when there is no video track
    fn next_video_frame(&mut self) -> Result<Option<VideoFrame>>;

    /// Pull the next raw audio unit.
    ///
    /// Returns `Ok(None)` at end of stream, or when there is no audio track.
    fn next_audio_sample(&mut self) -> Result<Option<RawAudioSample>>;
}

/// Open the source described by the media configuration.
pub fn open(config: &MediaConfig) -> Result<Box<dyn SampleSource>> {
    match config {
        MediaConfig::File { video, audio } => {
            let source = file::FileSource::open_tracks(video.as_deref(), audio.as_deref())?;
            Ok(Box::new(source))
        }
        MediaConfig::Synthetic(settings) => {
            Ok(Box::new(synthetic::SyntheticSource::new(settings.clone())?))
        }
    }
}
