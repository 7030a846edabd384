use crate::{
    constants::{
        DEFAULT_IDLE_INTERVAL_MS, DEFAULT_MAX_SINK_FAILURES, MAX_IMAGE_DIMENSION, TARGET_HEIGHT,
        TARGET_WIDTH,
    },
    format::OutputFormat,
    pacing::{FailurePolicy, PacingOptions},
    sink::SinkConfig,
    sources::synthetic::SyntheticSettings,
    surface::Surface,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};
use tokio::fs::read_to_string;

pub const DEFAULT_CONFIG_PATH: &str = "Config.toml";

/// Media each session streams.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaConfig {
    /// Raw BGRA frame file and/or any audio file symphonia can decode
    File {
        video: Option<PathBuf>,
        audio: Option<PathBuf>,
    },
    Synthetic(SyntheticSettings),
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct OutputConfig {
    #[serde(flatten)]
    pub format: OutputFormat,

    /// Size of the persistent target image
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: OutputFormat::default(),
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PacingConfig {
    /// Stop once every track has ended, instead of idling until closed
    #[serde(default = "default_true")]
    pub stop_at_end_of_stream: bool,

    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,

    /// 0 never stops on sink failures
    #[serde(default = "default_max_sink_failures")]
    pub max_consecutive_sink_failures: u32,

    /// Pace against the wall clock. When false, media is rendered as fast
    /// as possible.
    #[serde(default = "default_true")]
    pub realtime: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            stop_at_end_of_stream: true,
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            max_consecutive_sink_failures: DEFAULT_MAX_SINK_FAILURES,
            realtime: true,
        }
    }
}

impl PacingConfig {
    pub fn options(&self) -> PacingOptions {
        PacingOptions {
            stop_at_end_of_stream: self.stop_at_end_of_stream,
            idle_interval: Duration::from_millis(self.idle_interval_ms),
            failure_policy: FailurePolicy::from_limit(self.max_consecutive_sink_failures),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Config {
    /// `env_logger` filter, `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub log_level: String,

    pub media: MediaConfig,

    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub pacing: PacingConfig,

    #[serde(default)]
    pub sink: SinkConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_width() -> u32 {
    TARGET_WIDTH
}

fn default_height() -> u32 {
    TARGET_HEIGHT
}

fn default_true() -> bool {
    true
}

fn default_idle_interval_ms() -> u64 {
    DEFAULT_IDLE_INTERVAL_MS
}

fn default_max_sink_failures() -> u32 {
    DEFAULT_MAX_SINK_FAILURES
}

impl Config {
    pub fn parse(config: &str) -> Result<Config> {
        let config: Config = toml::from_str(config)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let output = &self.output;
        if output.width == 0 || output.height == 0 {
            bail!("output width and height must be non-zero");
        }
        if Surface::byte_len(output.width, output.height).is_none() {
            bail!(
                "output size {}x{} exceeds {MAX_IMAGE_DIMENSION} pixels per side",
                output.width,
                output.height
            );
        }
        let output = output.format;
        if output.sample_rate == 0 || output.channels == 0 {
            bail!("output sample_rate and channels must be non-zero");
        }
        if output.bits_per_sample != 16 {
            bail!(
                "only 16-bit output is supported, got {}",
                output.bits_per_sample
            );
        }
        if !self.pacing.stop_at_end_of_stream && self.pacing.idle_interval_ms == 0 {
            bail!("idle_interval_ms must be non-zero when the loop keeps running past end of stream");
        }
        if let MediaConfig::File {
            video: None,
            audio: None,
        } = &self.media
        {
            bail!("file media needs a video or an audio path");
        }
        Ok(())
    }
}

pub async fn load(path: &str) -> Result<Config> {
    let config = read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {path}"))?;
    Config::parse(&config).with_context(|| format!("Invalid configuration in {path}"))
}
