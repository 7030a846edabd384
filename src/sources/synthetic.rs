//! Generated media: a colour-cycling test pattern and a sine tone.

use crate::{
    error::{PacerError, Result},
    format::AudioFormat,
    sources::{RawAudioSample, SampleSource, VideoFrame},
    surface::{Surface, VideoImage},
    time::Timestamp,
};
use serde::{Deserialize, Serialize};

const AMPLITUDE: f64 = 0.5; // 50% amplitude

const PATTERN: [[u8; 4]; 4] = [
    [0x00, 0x00, 0xff, 0xff], // red
    [0x00, 0xff, 0x00, 0xff], // green
    [0xff, 0x00, 0x00, 0xff], // blue
    [0xff, 0xff, 0xff, 0xff], // white
];

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SyntheticSettings {
    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,
    pub video: Option<SyntheticVideo>,
    pub audio: Option<SyntheticAudio>,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SyntheticVideo {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct SyntheticAudio {
    pub sample_rate: u32,
    pub channels: u16,
    #[serde(default = "default_tone_hz")]
    pub tone_hz: f64,
    #[serde(default = "default_frames_per_packet")]
    pub frames_per_packet: usize,
}

fn default_duration_secs() -> f64 {
    10.0
}

fn default_tone_hz() -> f64 {
    440.0
}

fn default_frames_per_packet() -> usize {
    1024
}

pub struct SyntheticSource {
    settings: SyntheticSettings,
    video_frames: u64,
    next_video: u64,
    audio_frames: u64,
    next_audio_frame: u64,
    phase: f64,
}

impl SyntheticSource {
    pub fn new(settings: SyntheticSettings) -> Result<Self> {
        if settings.duration_secs.is_nan() || settings.duration_secs < 0.0 {
            return Err(PacerError::InvalidConfig(
                "synthetic duration must be non-negative".to_string(),
            ));
        }
        if settings.video.is_none() && settings.audio.is_none() {
            return Err(PacerError::InvalidConfig(
                "synthetic source needs a video or an audio track".to_string(),
            ));
        }

        let video_frames = match &settings.video {
            Some(video) => {
                if video.width == 0 || video.height == 0 || video.fps == 0 {
                    return Err(PacerError::InvalidConfig(
                        "synthetic video needs a non-zero size and frame rate".to_string(),
                    ));
                }
                if Surface::byte_len(video.width, video.height).is_none() {
                    return Err(PacerError::InvalidConfig(format!(
                        "synthetic video size {}x{} out of range",
                        video.width, video.height
                    )));
                }
                (settings.duration_secs * video.fps as f64).round() as u64
            }
            None => 0,
        };

        let audio_frames = match &settings.audio {
            Some(audio) => {
                if audio.sample_rate == 0 || audio.channels == 0 || audio.frames_per_packet == 0 {
                    return Err(PacerError::InvalidConfig(
                        "synthetic audio needs a non-zero rate, channel count and packet size"
                            .to_string(),
                    ));
                }
                (settings.duration_secs * audio.sample_rate as f64).round() as u64
            }
            None => 0,
        };

        Ok(SyntheticSource {
            settings,
            video_frames,
            next_video: 0,
            audio_frames,
            next_audio_frame: 0,
            phase: 0.0,
        })
    }
}

impl SampleSource for SyntheticSource {
    fn video_size(&self) -> Option<(u32, u32)> {
        self.settings.video.as_ref().map(|v| (v.width, v.height))
    }

    fn audio_format(&self) -> Option<AudioFormat> {
        self.settings.audio.as_ref().map(|a| AudioFormat {
            sample_rate: a.sample_rate,
            channels: a.channels,
        })
    }

    fn next_video_frame(&mut self) -> Result<Option<VideoFrame>> {
        let Some(video) = &self.settings.video else {
            return Ok(None);
        };
        if self.next_video >= self.video_frames {
            return Ok(None);
        }

        let index = self.next_video;
        self.next_video += 1;

        let colour = PATTERN[(index as usize / video.fps as usize) % PATTERN.len()];
        let timestamp = Timestamp::from_frames(index, video.fps);

        Ok(Some(VideoFrame {
            timestamp,
            image: VideoImage::Owned(Surface::filled(video.width, video.height, colour)),
        }))
    }

    fn next_audio_sample(&mut self) -> Result<Option<RawAudioSample>> {
        let Some(audio) = &self.settings.audio else {
            return Ok(None);
        };
        let remaining = self.audio_frames.saturating_sub(self.next_audio_frame);
        if remaining == 0 {
            return Ok(None);
        }

        let frames = remaining.min(audio.frames_per_packet as u64) as usize;
        let channels = audio.channels as usize;
        let mut samples = Vec::with_capacity(frames * channels);

        for _ in 0..frames {
            let sample = sine_wave(self.phase);
            samples.extend(std::iter::repeat(sample).take(channels));

            // Increment the phase by the frequency divided by the sample rate,
            // wrapping around 1.0 to avoid overflow
            self.phase += audio.tone_hz / audio.sample_rate as f64;
            self.phase %= 1.0;
        }

        let timestamp = Timestamp::from_frames(self.next_audio_frame, audio.sample_rate);
        self.next_audio_frame += frames as u64;

        Ok(Some(RawAudioSample {
            timestamp,
            format: AudioFormat {
                sample_rate: audio.sample_rate,
                channels: audio.channels,
            },
            samples,
        }))
    }
}

// Helper function to generate a sine wave sample given a phase
fn sine_wave(phase: f64) -> f32 {
    ((phase * std::f64::consts::PI * 2.0).sin() * AMPLITUDE) as f32
}
