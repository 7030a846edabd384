//! Frame pacing loop.
//!
//! Each iteration advances a virtual clock by the measured wall-clock
//! delta, pulls a video frame if the video track is due, runs one audio
//! feed/drain cycle, forwards whatever was produced to the sink and works
//! out when the next sample can be due. The loop sleeps until then, which is
//! its only suspension point.

use crate::{
    audio::AudioStage,
    error::{PacerError, Result},
    format::OutputFormat,
    resampler::{AudioChunk, Resampler, RubatoResampler},
    session::CloseSignal,
    sink::{AudioSubmission, DeliverySink},
    sources::SampleSource,
    surface::{Surface, TargetImage},
    time::{Clock, Timestamp, VirtualClock},
};
use std::{fmt, time::Duration};

/// Timing state of one track.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TrackClock {
    /// Last observed timestamp; `None` until the first unit arrives
    next: Option<Timestamp>,
    ended: bool,
}

impl TrackClock {
    /// A track that does not exist and is never due.
    pub fn absent() -> Self {
        TrackClock {
            next: None,
            ended: true,
        }
    }

    pub fn next(&self) -> Option<Timestamp> {
        self.next
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        !self.ended && self.next.map_or(true, |next| now >= next)
    }

    /// Record the timestamp of a unit just pulled. Timestamps that go
    /// backwards are clamped so the track stays non-decreasing.
    pub fn observe(&mut self, timestamp: Timestamp) {
        match self.next {
            Some(prev) if timestamp < prev => {
                warn!("Timestamp went backwards ({timestamp} < {prev}), clamping");
            }
            _ => self.next = Some(timestamp),
        }
    }

    pub fn end(&mut self) {
        self.ended = true;
    }
}

/// When the loop has to look for new samples again.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deadline {
    /// A live track has no known timestamp yet; do not sleep.
    Now,
    /// Virtual clock value of the earliest next timestamp.
    At(Timestamp),
    /// Every track has ended.
    Exhausted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// What to do when the sink keeps rejecting submissions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log every failure and keep going.
    Ignore,
    /// Stop once one media kind failed this many times in a row.
    StopAfter(u32),
}

impl FailurePolicy {
    /// `0` disables the limit.
    pub fn from_limit(limit: u32) -> Self {
        match limit {
            0 => FailurePolicy::Ignore,
            n => FailurePolicy::StopAfter(n),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacingOptions {
    pub stop_at_end_of_stream: bool,
    /// Sleep per iteration once every track has ended
    pub idle_interval: Duration,
    pub failure_policy: FailurePolicy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The session was closed from outside
    Closed,
    /// Every track ended
    EndOfStream,
    /// The sink rejected too many submissions in a row
    DeliveryFailed,
    /// A fatal error ended the loop
    Failed,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            StopReason::Closed => "closed",
            StopReason::EndOfStream => "end of stream",
            StopReason::DeliveryFailed => "delivery failed",
            StopReason::Failed => "failed",
        };
        write!(f, "{reason}")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Starting,
    Running,
    Stopped(StopReason),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub iterations: u64,
    pub video_frames: u64,
    pub audio_chunks: u64,
    pub audio_samples: u64,
    pub video_failures: u64,
    pub audio_failures: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub reason: StopReason,
    pub stats: SessionStats,
    /// Virtual clock reading when the loop stopped
    pub media_time: Timestamp,
}

impl fmt::Display for SessionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.stats;
        write!(
            f,
            "{} after {} ({} iterations, {} video frames, {} audio chunks / {} samples, {} video + {} audio delivery failures)",
            self.reason,
            self.media_time,
            s.iterations,
            s.video_frames,
            s.audio_chunks,
            s.audio_samples,
            s.video_failures,
            s.audio_failures
        )
    }
}

/// Result of one loop iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickOutcome {
    pub now: Timestamp,
    pub video_delivered: bool,
    /// Samples per channel handed to the sink
    pub audio_samples: Option<u32>,
    pub deadline: Deadline,
    pub stop: Option<StopReason>,
}

#[derive(Debug, Default)]
struct ConsecutiveFailures {
    video: u32,
    audio: u32,
}

pub struct PacingLoop {
    source: Box<dyn SampleSource>,
    audio: Option<AudioStage>,
    video: TrackClock,
    target: TargetImage,
    clock: VirtualClock,
    output: OutputFormat,
    options: PacingOptions,
    failures: ConsecutiveFailures,
    stats: SessionStats,
    state: LoopState,
}

impl PacingLoop {
    /// Assemble a loop from an opened source and an optional resampler.
    ///
    /// Without a resampler, or if the source has no audio track, the audio
    /// track is never touched.
    pub fn new(
        source: Box<dyn SampleSource>,
        resampler: Option<Box<dyn Resampler>>,
        target: TargetImage,
        options: PacingOptions,
    ) -> Self {
        let video = match source.video_size() {
            Some(_) => TrackClock::default(),
            None => TrackClock::absent(),
        };
        let resampler = resampler.filter(|_| source.audio_format().is_some());
        let output = resampler
            .as_ref()
            .map(|r| r.output_format())
            .unwrap_or_default();

        PacingLoop {
            source,
            audio: resampler.map(AudioStage::new),
            video,
            target,
            clock: VirtualClock::new(),
            output,
            options,
            failures: ConsecutiveFailures::default(),
            stats: SessionStats::default(),
            state: LoopState::Starting,
        }
    }

    /// Set up the resampler for the source's audio track and allocate the
    /// persistent target image.
    pub fn open(
        source: Box<dyn SampleSource>,
        output: OutputFormat,
        (width, height): (u32, u32),
        options: PacingOptions,
    ) -> Result<Self> {
        if width == 0 || height == 0 || Surface::byte_len(width, height).is_none() {
            return Err(PacerError::InvalidConfig(format!(
                "unsupported target image size {width}x{height}"
            )));
        }

        let resampler = match source.audio_format() {
            Some(format) => {
                let resampler: Box<dyn Resampler> = Box::new(RubatoResampler::new(format, output)?);
                Some(resampler)
            }
            None => None,
        };

        debug!(
            "Media formats: video {}, audio in {}, audio out {}, target {width}x{height}",
            source
                .video_size()
                .map(|(w, h)| format!("{w}x{h} BGRA"))
                .unwrap_or_else(|| "none".to_string()),
            source
                .audio_format()
                .map(|f| f.to_string())
                .unwrap_or_else(|| "none".to_string()),
            output
        );

        Ok(Self::new(
            source,
            resampler,
            TargetImage::new(width, height),
            options,
        ))
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    pub fn video_track(&self) -> &TrackClock {
        &self.video
    }

    pub fn audio_track(&self) -> Option<&TrackClock> {
        self.audio.as_ref().map(AudioStage::track)
    }

    /// Image the sink reads video from.
    pub fn target(&self) -> &TargetImage {
        &self.target
    }

    pub fn stop(&mut self, reason: StopReason) {
        if !matches!(self.state, LoopState::Stopped(_)) {
            info!("Pacing loop stopping: {reason}");
            self.state = LoopState::Stopped(reason);
        }
    }

    pub fn report(&self) -> SessionReport {
        let reason = match self.state {
            LoopState::Stopped(reason) => reason,
            _ => StopReason::Closed,
        };
        SessionReport {
            reason,
            stats: self.stats,
            media_time: self.clock.now(),
        }
    }

    /// Earliest next timestamp over the tracks that have not ended.
    pub fn deadline(&self) -> Deadline {
        let live = std::iter::once(&self.video)
            .chain(self.audio.as_ref().map(AudioStage::track))
            .filter(|track| !track.is_ended());

        let mut deadline = Deadline::Exhausted;
        for track in live {
            deadline = match (deadline, track.next()) {
                (_, None) | (Deadline::Now, _) => Deadline::Now,
                (Deadline::Exhausted, Some(next)) => Deadline::At(next),
                (Deadline::At(current), Some(next)) => Deadline::At(current.min(next)),
            };
        }
        deadline
    }

    /// Advance the virtual clock by `elapsed` and do one iteration's work.
    pub fn tick(&mut self, elapsed: Duration, sink: &mut dyn DeliverySink) -> Result<TickOutcome> {
        if let LoopState::Stopped(reason) = self.state {
            return Ok(TickOutcome {
                now: self.clock.now(),
                video_delivered: false,
                audio_samples: None,
                deadline: self.deadline(),
                stop: Some(reason),
            });
        }
        self.state = LoopState::Running;

        let outcome = self.step(elapsed, sink);
        match &outcome {
            Ok(TickOutcome {
                stop: Some(reason), ..
            }) => self.stop(*reason),
            Ok(_) => {}
            Err(e) => {
                error!("Pacing loop failed: {e}");
                self.stop(StopReason::Failed);
            }
        }
        outcome
    }

    fn step(&mut self, elapsed: Duration, sink: &mut dyn DeliverySink) -> Result<TickOutcome> {
        self.stats.iterations += 1;
        let now = self.clock.advance(elapsed);

        let produced_video = self.pull_video(now)?;
        let audio = match self.audio.as_mut() {
            Some(stage) => stage.cycle(now, self.source.as_mut())?,
            None => None,
        };

        let mut outcome = TickOutcome {
            now,
            video_delivered: false,
            audio_samples: None,
            deadline: Deadline::Now,
            stop: None,
        };

        if produced_video {
            match sink.submit_video(&self.target) {
                Ok(()) => {
                    self.failures.video = 0;
                    self.stats.video_frames += 1;
                    outcome.video_delivered = true;
                }
                Err(e) => outcome.stop = self.record_failure(MediaKind::Video, e),
            }
        }

        if let Some(chunk) = audio.filter(|chunk| !chunk.is_empty()) {
            match self.deliver_audio(&chunk, sink)? {
                Ok(sample_count) => {
                    self.failures.audio = 0;
                    self.stats.audio_chunks += 1;
                    self.stats.audio_samples += sample_count as u64;
                    outcome.audio_samples = Some(sample_count);
                }
                Err(e) => {
                    let stop = self.record_failure(MediaKind::Audio, e);
                    outcome.stop = outcome.stop.or(stop);
                }
            }
        }

        outcome.deadline = self.deadline();
        if outcome.deadline == Deadline::Exhausted && self.options.stop_at_end_of_stream {
            outcome.stop = outcome.stop.or(Some(StopReason::EndOfStream));
        }

        Ok(outcome)
    }

    /// Pull one frame into the target image if the video track is due.
    fn pull_video(&mut self, now: Timestamp) -> Result<bool> {
        if !self.video.is_due(now) {
            return Ok(false);
        }

        match self.source.next_video_frame()? {
            Some(frame) => {
                self.video.observe(frame.timestamp);
                self.target.copy_from(&frame.image);
                trace!("Video frame {} at {now}", frame.timestamp);
                Ok(true)
            }
            None => {
                debug!("Video track reached end of stream at {now}");
                self.video.end();
                Ok(false)
            }
        }
    }

    /// Outer error is fatal (misaligned PCM), inner error is a sink failure.
    fn deliver_audio(
        &self,
        chunk: &AudioChunk,
        sink: &mut dyn DeliverySink,
    ) -> Result<anyhow::Result<u32>> {
        let sample_count = self.output.sample_count(chunk.pcm.len())?;
        let submission = AudioSubmission {
            timestamp: chunk.timestamp,
            pcm: &chunk.pcm,
            sample_rate: self.output.sample_rate,
            channels: self.output.channels,
            sample_count,
        };
        Ok(sink.submit_audio(submission).map(|()| sample_count))
    }

    fn record_failure(&mut self, kind: MediaKind, err: anyhow::Error) -> Option<StopReason> {
        let consecutive = match kind {
            MediaKind::Video => {
                self.stats.video_failures += 1;
                self.failures.video += 1;
                self.failures.video
            }
            MediaKind::Audio => {
                self.stats.audio_failures += 1;
                self.failures.audio += 1;
                self.failures.audio
            }
        };

        warn!("Failed to submit {kind} ({consecutive} in a row): {err:#}");

        match self.options.failure_policy {
            FailurePolicy::StopAfter(limit) if consecutive >= limit => {
                error!("Giving up after {consecutive} consecutive {kind} delivery failures");
                Some(StopReason::DeliveryFailed)
            }
            _ => None,
        }
    }

    /// Run until closed, stopped by policy, or a fatal error.
    ///
    /// The close signal is checked at the top of every iteration, before the
    /// sleep. Sleeps are measured from the wall-clock instant of the previous
    /// iteration.
    pub fn run(
        &mut self,
        clock: &dyn Clock,
        close: &CloseSignal,
        sink: &mut dyn DeliverySink,
    ) -> Result<SessionReport> {
        let result = self.drive(clock, close, sink);

        if let Err(e) = sink.close() {
            warn!("Failed to close sink: {e:#}");
        }

        result.map(|()| self.report())
    }

    fn drive(
        &mut self,
        clock: &dyn Clock,
        close: &CloseSignal,
        sink: &mut dyn DeliverySink,
    ) -> Result<()> {
        let mut last = clock.now();
        let mut deadline = Deadline::Now;

        loop {
            if matches!(self.state, LoopState::Stopped(_)) {
                return Ok(());
            }
            if close.is_closed() {
                self.stop(StopReason::Closed);
                return Ok(());
            }

            match deadline {
                Deadline::Now => {}
                Deadline::At(next) => {
                    let wait = next.saturating_sub(self.clock.now()).to_duration();
                    if !wait.is_zero() {
                        clock.sleep_until(last + wait);
                    }
                }
                Deadline::Exhausted => clock.idle(self.options.idle_interval),
            }

            let now = clock.now();
            let elapsed = now.saturating_duration_since(last);
            last = now;

            deadline = self.tick(elapsed, sink)?.deadline;
        }
    }
}
