//! Audio side of the pacing loop: feed the resampler until it is saturated
//! or the source runs dry, then drain one converted chunk.

use crate::{
    error::Result,
    pacing::TrackClock,
    resampler::{AudioChunk, Resampler},
    sources::SampleSource,
    time::Timestamp,
};

pub struct AudioStage {
    resampler: Box<dyn Resampler>,
    track: TrackClock,
    /// Input or the end-of-input marker was supplied since the last drain
    pending: bool,
    fed_any: bool,
    source_ended: bool,
}

impl AudioStage {
    pub fn new(resampler: Box<dyn Resampler>) -> Self {
        AudioStage {
            resampler,
            track: TrackClock::default(),
            pending: false,
            fed_any: false,
            source_ended: false,
        }
    }

    pub fn track(&self) -> &TrackClock {
        &self.track
    }

    /// Run one feed-then-drain cycle if audio is due at `now`.
    ///
    /// Audio is due once `now` reaches the timestamp of the last chunk the
    /// resampler produced. The chunk returned here carries the resampler's
    /// timestamp, which becomes the track's next due time.
    pub fn cycle(
        &mut self,
        now: Timestamp,
        source: &mut dyn SampleSource,
    ) -> Result<Option<AudioChunk>> {
        if !self.track.is_due(now) {
            return Ok(None);
        }

        let mut saturated = false;
        while !self.source_ended {
            // Check for room before reading, so no source data is thrown away
            if !self.resampler.accepts_input() {
                saturated = true;
                break;
            }
            match source.next_audio_sample()? {
                Some(sample) => {
                    self.resampler.push_input(sample)?;
                    self.pending = true;
                    self.fed_any = true;
                }
                None => {
                    trace!("Audio source reached end of stream");
                    self.source_ended = true;
                    self.resampler.finish();
                    // Flush what the resampler still holds; nothing to flush if it was never fed
                    self.pending = self.fed_any;
                }
            }
        }

        if !(self.pending || saturated) {
            if self.source_ended {
                self.track.end();
            }
            return Ok(None);
        }

        match self.resampler.pull_output()? {
            Some(chunk) => {
                // While flushing, keep draining until the resampler is empty
                self.pending = self.source_ended;
                self.track.observe(chunk.timestamp);
                Ok(Some(chunk))
            }
            None => {
                self.pending = false;
                if self.source_ended {
                    debug!("Audio track drained");
                    self.track.end();
                }
                Ok(None)
            }
        }
    }
}
