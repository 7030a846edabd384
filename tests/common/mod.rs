//! Test infrastructure for peer-player integration tests.
//!
//! Provides scripted sources, an instrumented resampler and recording sinks
//! so the pacing loop can be driven without real media or a transport.

#![allow(dead_code)]

use anyhow::anyhow;
use bytes::Bytes;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Re-export key types from the main crate
pub use peer_player::config::{Config, MediaConfig, OutputConfig, PacingConfig};
pub use peer_player::error::Result;
pub use peer_player::format::{AudioFormat, OutputFormat};
pub use peer_player::pacing::{
    Deadline, FailurePolicy, LoopState, PacingLoop, PacingOptions, StopReason, TrackClock,
};
pub use peer_player::resampler::{AudioChunk, Resampler};
pub use peer_player::session::close_signal;
pub use peer_player::sink::{AudioSubmission, DeliverySink, SinkConfig};
pub use peer_player::sources::synthetic::{
    SyntheticAudio, SyntheticSettings, SyntheticSource, SyntheticVideo,
};
pub use peer_player::sources::{RawAudioSample, SampleSource, VideoFrame};
pub use peer_player::surface::{Surface, TargetImage, VideoImage};
pub use peer_player::time::{ManualClock, Timestamp};

/// Pacing options that never give up on the sink.
pub fn lenient_options() -> PacingOptions {
    PacingOptions {
        stop_at_end_of_stream: true,
        idle_interval: Duration::from_millis(10),
        failure_policy: FailurePolicy::Ignore,
    }
}

/// Synthetic media with the given tracks, `duration_secs` long.
pub fn synthetic(
    duration_secs: f64,
    video_fps: Option<u32>,
    audio: Option<(u32, u16)>,
) -> SyntheticSource {
    SyntheticSource::new(SyntheticSettings {
        duration_secs,
        video: video_fps.map(|fps| SyntheticVideo {
            width: 16,
            height: 16,
            fps,
        }),
        audio: audio.map(|(sample_rate, channels)| SyntheticAudio {
            sample_rate,
            channels,
            tone_hz: 440.0,
            frames_per_packet: 1024,
        }),
    })
    .unwrap()
}

/// Source that replays fixed timestamps.
pub struct ScriptedSource {
    pub video: Option<VecDeque<Timestamp>>,
    pub audio: Option<VecDeque<RawAudioSample>>,
    pub audio_format: AudioFormat,
}

impl ScriptedSource {
    pub fn new() -> Self {
        ScriptedSource {
            video: None,
            audio: None,
            audio_format: AudioFormat {
                sample_rate: 1000,
                channels: 1,
            },
        }
    }

    pub fn with_video(mut self, timestamps: &[Timestamp]) -> Self {
        self.video = Some(timestamps.iter().copied().collect());
        self
    }

    /// One packet of `frames` mono frames at each timestamp.
    pub fn with_audio(mut self, timestamps: &[Timestamp], frames: usize) -> Self {
        let format = self.audio_format;
        self.audio = Some(
            timestamps
                .iter()
                .map(|&timestamp| RawAudioSample {
                    timestamp,
                    format,
                    samples: vec![0.1; frames],
                })
                .collect(),
        );
        self
    }
}

impl SampleSource for ScriptedSource {
    fn video_size(&self) -> Option<(u32, u32)> {
        self.video.as_ref().map(|_| (2, 2))
    }

    fn audio_format(&self) -> Option<AudioFormat> {
        self.audio.as_ref().map(|_| self.audio_format)
    }

    fn next_video_frame(&mut self) -> Result<Option<VideoFrame>> {
        Ok(self
            .video
            .as_mut()
            .and_then(VecDeque::pop_front)
            .map(|timestamp| VideoFrame {
                timestamp,
                image: VideoImage::Owned(Surface::new(2, 2)),
            }))
    }

    fn next_audio_sample(&mut self) -> Result<Option<RawAudioSample>> {
        Ok(self.audio.as_mut().and_then(VecDeque::pop_front))
    }
}

/// Call counters shared between a test and its [`CountingResampler`].
#[derive(Clone, Default)]
pub struct ResamplerCalls {
    pub accepts: Arc<AtomicUsize>,
    pub pushes: Arc<AtomicUsize>,
    pub pulls: Arc<AtomicUsize>,
}

impl ResamplerCalls {
    pub fn total(&self) -> usize {
        self.accepts.load(Ordering::SeqCst)
            + self.pushes.load(Ordering::SeqCst)
            + self.pulls.load(Ordering::SeqCst)
    }
}

/// Passes mono input through at the input rate, one packet per pull, with
/// room for `capacity` packets. Output timestamps are the input timestamps.
pub struct CountingResampler {
    pub calls: ResamplerCalls,
    capacity: usize,
    queue: VecDeque<RawAudioSample>,
    finished: bool,
    output: OutputFormat,
}

impl CountingResampler {
    pub fn new(capacity: usize, calls: ResamplerCalls) -> Self {
        CountingResampler {
            calls,
            capacity,
            queue: VecDeque::new(),
            finished: false,
            output: OutputFormat {
                sample_rate: 1000,
                channels: 2,
                bits_per_sample: 16,
            },
        }
    }
}

impl Resampler for CountingResampler {
    fn accepts_input(&self) -> bool {
        self.calls.accepts.fetch_add(1, Ordering::SeqCst);
        !self.finished && self.queue.len() < self.capacity
    }

    fn push_input(&mut self, sample: RawAudioSample) -> Result<()> {
        self.calls.pushes.fetch_add(1, Ordering::SeqCst);
        self.queue.push_back(sample);
        Ok(())
    }

    fn finish(&mut self) {
        self.finished = true;
    }

    fn pull_output(&mut self) -> Result<Option<AudioChunk>> {
        self.calls.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(self.queue.pop_front().map(|sample| AudioChunk {
            timestamp: sample.timestamp,
            pcm: Bytes::from(vec![0u8; sample.frames() * 4]),
        }))
    }

    fn output_format(&self) -> OutputFormat {
        self.output
    }
}

/// Sink that keeps what it was given.
#[derive(Default)]
pub struct RecordingSink {
    pub video_frames: usize,
    pub audio_chunks: Vec<(Timestamp, u32)>,
    pub closed: bool,
}

impl RecordingSink {
    pub fn audio_samples(&self) -> u64 {
        self.audio_chunks.iter().map(|(_, n)| *n as u64).sum()
    }
}

impl DeliverySink for RecordingSink {
    fn submit_video(&mut self, image: &TargetImage) -> anyhow::Result<()> {
        // The lock is free again between iterations
        drop(image.lock());
        self.video_frames += 1;
        Ok(())
    }

    fn submit_audio(&mut self, audio: AudioSubmission<'_>) -> anyhow::Result<()> {
        assert_eq!(audio.pcm.len() as u32, audio.sample_count * 2 * audio.channels as u32);
        self.audio_chunks.push((audio.timestamp, audio.sample_count));
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.closed = true;
        Ok(())
    }
}

/// Sink whose video submissions always fail.
#[derive(Default)]
pub struct BrokenVideoSink {
    pub video_attempts: usize,
    pub audio_samples: u64,
}

impl DeliverySink for BrokenVideoSink {
    fn submit_video(&mut self, _image: &TargetImage) -> anyhow::Result<()> {
        self.video_attempts += 1;
        Err(anyhow!("encoder rejected frame"))
    }

    fn submit_audio(&mut self, audio: AudioSubmission<'_>) -> anyhow::Result<()> {
        self.audio_samples += audio.sample_count as u64;
        Ok(())
    }
}

pub fn ms(ms: i64) -> Timestamp {
    Timestamp::from_ticks(ms * 10_000)
}
