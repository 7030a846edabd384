//! Host side of the peer network: a typed registry of event handlers and
//! the per-peer streaming sessions they start and stop.

use crate::{
    config::Config,
    event::{Event, EventBus},
    pacing::SessionReport,
    session::{self, SessionHandle},
};
use anyhow::Result;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::task::JoinHandle;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        PeerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        PeerId::new(id)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
}

impl PeerState {
    /// Whether the peer is gone and its session should end.
    pub fn is_closed(self) -> bool {
        matches!(self, PeerState::Disconnected | PeerState::Failed)
    }
}

impl fmt::Display for PeerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            PeerState::Connecting => "connecting",
            PeerState::Connected => "connected",
            PeerState::Disconnected => "disconnected",
            PeerState::Failed => "failed",
        };
        write!(f, "{state}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamRequest {
    pub peer: PeerId,
}

/// Answer to a connection or stream request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

/// Data received on, or sent to, a named data channel of a peer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelMessage {
    pub peer: PeerId,
    pub channel: String,
    pub data: Vec<u8>,
}

type ConnectionRequestHandler = Box<dyn Fn(&PeerId) -> Decision + Send + Sync>;
type PeerStateHandler = Box<dyn Fn(&PeerId, PeerState) + Send + Sync>;
type StreamRequestHandler = Box<dyn Fn(&StreamRequest) -> Decision + Send + Sync>;
type ChannelDataHandler = Box<dyn Fn(&ChannelMessage) -> Option<Vec<u8>> + Send + Sync>;

/// One subscription point per event kind.
///
/// Peer state handlers accumulate. The others replace the previous one;
/// without one, connections and streams are accepted and channel data gets
/// no reply.
#[derive(Default)]
pub struct Handlers {
    connection_requested: Option<ConnectionRequestHandler>,
    peer_state_changed: Vec<PeerStateHandler>,
    stream_requested: Option<StreamRequestHandler>,
    channel_data: Option<ChannelDataHandler>,
}

impl Handlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log peer states, accept every connection and stream, echo channel
    /// data reversed.
    pub fn console() -> Self {
        Self::new()
            .on_connection_requested(|peer| {
                info!("Peer {peer} wants to connect");
                Decision::Accept
            })
            .on_peer_state_changed(|peer, state| info!("Peer {peer} is {state}"))
            .on_stream_requested(|request| {
                info!("Peer {} requested a stream", request.peer);
                Decision::Accept
            })
            .on_channel_data(echo_reversed)
    }

    pub fn on_connection_requested(
        mut self,
        handler: impl Fn(&PeerId) -> Decision + Send + Sync + 'static,
    ) -> Self {
        self.connection_requested = Some(Box::new(handler));
        self
    }

    pub fn on_peer_state_changed(
        mut self,
        handler: impl Fn(&PeerId, PeerState) + Send + Sync + 'static,
    ) -> Self {
        self.peer_state_changed.push(Box::new(handler));
        self
    }

    pub fn on_stream_requested(
        mut self,
        handler: impl Fn(&StreamRequest) -> Decision + Send + Sync + 'static,
    ) -> Self {
        self.stream_requested = Some(Box::new(handler));
        self
    }

    pub fn on_channel_data(
        mut self,
        handler: impl Fn(&ChannelMessage) -> Option<Vec<u8>> + Send + Sync + 'static,
    ) -> Self {
        self.channel_data = Some(Box::new(handler));
        self
    }

    pub fn connection_requested(&self, peer: &PeerId) -> Decision {
        match &self.connection_requested {
            Some(handler) => handler(peer),
            None => Decision::Accept,
        }
    }

    pub fn peer_state_changed(&self, peer: &PeerId, state: PeerState) {
        for handler in &self.peer_state_changed {
            handler(peer, state);
        }
    }

    pub fn stream_requested(&self, request: &StreamRequest) -> Decision {
        match &self.stream_requested {
            Some(handler) => handler(request),
            None => Decision::Accept,
        }
    }

    pub fn channel_data(&self, message: &ChannelMessage) -> Option<Vec<u8>> {
        self.channel_data.as_ref().and_then(|handler| handler(message))
    }
}

/// Reply with the received bytes in reverse order.
pub fn echo_reversed(message: &ChannelMessage) -> Option<Vec<u8>> {
    Some(message.data.iter().rev().copied().collect())
}

pub struct Host {
    handlers: Handlers,
    config: Arc<Config>,
    /// Accepted peers that have not disconnected or failed
    peers: HashMap<PeerId, PeerState>,
    sessions: HashMap<PeerId, SessionHandle>,
    /// Asked to stop, not yet joined
    stopping: Vec<SessionHandle>,
}

impl Host {
    pub fn new(handlers: Handlers, config: Arc<Config>) -> Self {
        Host {
            handlers,
            config,
            peers: HashMap::new(),
            sessions: HashMap::new(),
            stopping: vec![],
        }
    }

    /// `None` for peers that never connected or are gone.
    pub fn peer_state(&self, peer: &PeerId) -> Option<PeerState> {
        self.peers.get(peer).copied()
    }

    pub fn has_session(&self, peer: &PeerId) -> bool {
        self.sessions.contains_key(peer)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// React to one event. Returns the replies to send back over data
    /// channels.
    pub fn handle(&mut self, event: Event) -> Vec<ChannelMessage> {
        match event {
            Event::ConnectionRequested { peer } => self.connection_requested(peer),
            Event::PeerStateChanged { peer, state } => self.set_peer_state(peer, state),
            Event::StreamRequested(request) => self.stream_requested(request),
            Event::StreamStopped { peer } => {
                if !self.stop_session(&peer) {
                    debug!("No stream running for {peer}");
                }
            }
            Event::ChannelData(message) => {
                if let Some(data) = self.handlers.channel_data(&message) {
                    return vec![ChannelMessage {
                        peer: message.peer,
                        channel: message.channel,
                        data,
                    }];
                }
            }
            Event::Shutdown => {
                let peers: Vec<PeerId> = self.sessions.keys().cloned().collect();
                for peer in peers {
                    self.stop_session(&peer);
                }
            }
        }

        vec![]
    }

    /// The console has no handshake, so an accepted peer is connected at
    /// once.
    fn connection_requested(&mut self, peer: PeerId) {
        if self.peers.contains_key(&peer) {
            debug!("Peer {peer} is already connected");
            return;
        }

        match self.handlers.connection_requested(&peer) {
            Decision::Accept => self.set_peer_state(peer, PeerState::Connected),
            Decision::Reject => info!("Connection from {peer} rejected"),
        }
    }

    fn set_peer_state(&mut self, peer: PeerId, state: PeerState) {
        self.handlers.peer_state_changed(&peer, state);
        if state.is_closed() {
            self.peers.remove(&peer);
            self.stop_session(&peer);
        } else {
            self.peers.insert(peer, state);
        }
    }

    fn stream_requested(&mut self, request: StreamRequest) {
        if !self.peers.contains_key(&request.peer) {
            warn!("Rejecting stream for {}: not connected", request.peer);
            return;
        }

        match self.sessions.get(&request.peer).map(SessionHandle::is_finished) {
            Some(true) => {
                self.stop_session(&request.peer);
            }
            Some(false) => {
                warn!("Rejecting stream for {}: already streaming", request.peer);
                return;
            }
            None => {}
        }

        match self.handlers.stream_requested(&request) {
            Decision::Accept => {
                let handle = session::spawn(request.peer.clone(), self.config.clone());
                self.sessions.insert(request.peer, handle);
            }
            Decision::Reject => info!("Stream for {} rejected", request.peer),
        }
    }

    /// Signal the peer's session to stop. Returns whether one was running.
    pub fn stop_session(&mut self, peer: &PeerId) -> bool {
        match self.sessions.remove(peer) {
            Some(handle) => {
                info!("Stopping stream for {peer}");
                handle.stop();
                self.stopping.push(handle);
                true
            }
            None => false,
        }
    }

    /// Collect sessions whose thread has finished, logging how they ended.
    pub async fn prune(&mut self) -> Vec<(PeerId, Result<SessionReport>)> {
        let finished: Vec<PeerId> = self
            .sessions
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(peer, _)| peer.clone())
            .collect();

        let mut done: Vec<SessionHandle> = finished
            .iter()
            .filter_map(|peer| self.sessions.remove(peer))
            .collect();

        let (stopped, still_running): (Vec<_>, Vec<_>) = std::mem::take(&mut self.stopping)
            .into_iter()
            .partition(SessionHandle::is_finished);
        self.stopping = still_running;
        done.extend(stopped);

        join_all(done).await
    }

    /// Stop every session and wait for all of them.
    pub async fn shutdown(&mut self) -> Vec<(PeerId, Result<SessionReport>)> {
        self.handle(Event::Shutdown);
        join_all(std::mem::take(&mut self.stopping)).await
    }
}

async fn join_all(handles: Vec<SessionHandle>) -> Vec<(PeerId, Result<SessionReport>)> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let peer = handle.peer().clone();
        let result = handle.join().await;
        match &result {
            Ok(report) => debug!("Session for {peer} ended: {}", report.reason),
            Err(e) => warn!("Session for {peer} ended with an error: {e:#}"),
        }
        results.push((peer, result));
    }
    results
}

/// Run the host on the event bus until shutdown or until the bus closes.
pub fn start(host: Host, bus: &EventBus) -> JoinHandle<()> {
    let mut subscriber = bus.subscribe();

    tokio::spawn(async move {
        let mut host = host;

        while let Some(event) = subscriber.recv().await {
            let shutdown = event == Event::Shutdown;

            for reply in host.handle(event) {
                info!(
                    "Reply to {} on '{}': {}",
                    reply.peer,
                    reply.channel,
                    String::from_utf8_lossy(&reply.data)
                );
            }
            host.prune().await;

            if shutdown {
                break;
            }
        }

        host.shutdown().await;
        info!("Host stopped");
    })
}
