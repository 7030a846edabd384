use crate::host::{ChannelMessage, PeerId, PeerState, StreamRequest};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::broadcast::{self, Receiver, Sender};

#[derive(Clone)]
pub struct EventBus {
    tx: Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(100);
        Self { tx }
    }

    pub fn send(&self, event: Event) {
        let result = self.tx.send(event);

        if let Err(e) = result {
            error!("Error while sending event: {:?}", e);
        }
    }

    pub fn subscribe(&self) -> Subscriber {
        Subscriber::new(self.tx.subscribe())
    }
}

pub struct Subscriber {
    rx: Receiver<Event>,
}

impl Subscriber {
    pub fn new(rx: Receiver<Event>) -> Self {
        Self { rx }
    }

    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        self.rx.try_recv()
    }

    /// Next event, `None` once every sender is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) => break Some(event),
                Err(RecvError::Closed) => break None,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        "EventBus::Subscriber lagging behind senders, skipping {skipped} messages"
                    );
                }
            }
        }
    }
}

/// Callbacks from the peer network, as seen by the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    ConnectionRequested { peer: PeerId },
    PeerStateChanged { peer: PeerId, state: PeerState },
    StreamRequested(StreamRequest),
    StreamStopped { peer: PeerId },
    ChannelData(ChannelMessage),
    Shutdown,
}

pub fn debug(bus: &EventBus) {
    let mut bus = bus.subscribe();
    tokio::spawn(async move {
        while let Some(event) = bus.recv().await {
            debug!("Received event: {:?}", event);
        }
    });
}
