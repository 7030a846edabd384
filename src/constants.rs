// Define some constants for the output parameters
pub const AUDIO_SAMPLE_RATE: u32 = 44100; // 44.1 kHz sample rate
pub const BIT_DEPTH: u16 = 16; // 16 bits per sample
pub const CHANNELS: u16 = 2; // Stereo channel

// Persistent target image size
pub const TARGET_WIDTH: u32 = 1920;
pub const TARGET_HEIGHT: u32 = 1080;

/// Largest accepted image width or height
pub const MAX_IMAGE_DIMENSION: u32 = 16384;

/// Timestamps count 100 ns ticks
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Input frames per resampler chunk
pub const RESAMPLER_CHUNK_FRAMES: usize = 1024;

/// Sleep between iterations once every track has ended and the loop keeps running
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 10;

/// Roughly five seconds of 30 fps video
pub const DEFAULT_MAX_SINK_FAILURES: u32 = 150;
