//! Planar FIFO for audio samples waiting to be resampled.
//!
//! Decoders push interleaved samples; the resampler takes fixed-size planar
//! chunks out of the front.

/// Consumed frames per channel kept before the buffer is compacted.
const COMPACT_THRESHOLD: usize = 48000;

#[derive(Debug)]
pub struct SampleFifo {
    position: usize,
    channels: Vec<Vec<f64>>,
    /// Frames taken since creation
    total_frames_consumed: u64,
}

impl SampleFifo {
    pub fn new(channels: usize) -> Self {
        SampleFifo {
            position: 0,
            channels: vec![Vec::new(); channels],
            total_frames_consumed: 0,
        }
    }

    /// Compact the buffer by removing already-consumed frames
    fn compact(&mut self) {
        if self.position > 0 {
            for channel in &mut self.channels {
                channel.drain(..self.position);
            }
            self.position = 0;
        }
    }

    /// Append interleaved samples. A trailing partial frame is dropped.
    pub fn push_interleaved(&mut self, samples: &[f32]) {
        let count = self.channels.len();
        if count == 0 {
            return;
        }
        for frame in samples.chunks_exact(count) {
            for (channel, &sample) in self.channels.iter_mut().zip(frame) {
                channel.push(sample as f64);
            }
        }
    }

    /// Frames available to take.
    pub fn frames(&self) -> usize {
        self.channels
            .first()
            .map(|ch| ch.len() - self.position)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Take up to `count` frames, one vector per channel.
    pub fn take(&mut self, count: usize) -> Vec<Vec<f64>> {
        let to_read = count.min(self.frames());
        let start = self.position;

        let chunk = self
            .channels
            .iter()
            .map(|ch| ch[start..start + to_read].to_vec())
            .collect();

        self.position += to_read;
        self.total_frames_consumed += to_read as u64;

        // Compact periodically to prevent unbounded growth
        if self.position >= COMPACT_THRESHOLD {
            self.compact();
        }

        chunk
    }

    pub fn total_frames_consumed(&self) -> u64 {
        self.total_frames_consumed
    }
}
