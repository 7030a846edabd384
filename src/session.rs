//! One streaming session per peer, running its pacing loop on a blocking
//! thread.

use crate::{
    config::Config,
    host::PeerId,
    pacing::{PacingLoop, SessionReport},
    sink, sources,
    time::{ManualClock, SystemClock},
};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::{sync::watch, task::JoinHandle};

/// Sending half of a close signal.
#[derive(Debug)]
pub struct Closer {
    tx: watch::Sender<bool>,
}

impl Closer {
    pub fn close(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half, polled by the pacing loop at the top of every iteration.
///
/// Dropping the [`Closer`] also closes the signal.
#[derive(Clone, Debug)]
pub struct CloseSignal {
    rx: watch::Receiver<bool>,
}

impl CloseSignal {
    pub fn is_closed(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

pub fn close_signal() -> (Closer, CloseSignal) {
    let (tx, rx) = watch::channel(false);
    (Closer { tx }, CloseSignal { rx })
}

pub struct SessionHandle {
    peer: PeerId,
    closer: Closer,
    task: JoinHandle<Result<SessionReport>>,
}

impl SessionHandle {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    /// Ask the loop to stop. It notices before its next sleep.
    pub fn stop(&self) {
        self.closer.close();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<SessionReport> {
        self.task.await.context("Session thread panicked")?
    }
}

/// Start streaming the configured media to `peer`.
///
/// Must be called from within a tokio runtime.
pub fn spawn(peer: PeerId, config: Arc<Config>) -> SessionHandle {
    let (closer, close) = close_signal();
    let name = peer.to_string();

    let task = tokio::task::spawn_blocking(move || {
        let result = run(&name, &config, &close);
        if let Err(e) = &result {
            error!("Session {name} failed: {e:#}");
        }
        result
    });

    SessionHandle { peer, closer, task }
}

/// Open the source, resampler and sink, and run the pacing loop until it
/// stops. Blocks the calling thread.
pub fn run(name: &str, config: &Config, close: &CloseSignal) -> Result<SessionReport> {
    let source = sources::open(&config.media).context("Failed to open media")?;
    let format = config.output.format;

    let mut pacing = PacingLoop::open(
        source,
        format,
        (config.output.width, config.output.height),
        config.pacing.options(),
    )
    .context("Failed to set up pacing loop")?;

    let mut sink = sink::build(&config.sink, name, format)?;

    info!("Session {name} started");

    let report = if config.pacing.realtime {
        pacing.run(&SystemClock, close, sink.as_mut())?
    } else {
        pacing.run(&ManualClock::new(), close, sink.as_mut())?
    };

    info!("Session {name} finished: {report}");

    Ok(report)
}
