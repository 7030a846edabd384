//! Console stand-in for the peer network: each line typed becomes an event.

use crate::{
    event::{Event, EventBus},
    host::{ChannelMessage, PeerId, PeerState, StreamRequest},
};
use anyhow::{anyhow, bail, Result};
use std::io::BufRead;

pub const HELP: &str = "commands: connect <peer> | fail <peer> | disconnect <peer> | \
stream <peer> | stop <peer> | send <peer> <channel> <text> | quit";

/// Parse one console line.
pub fn parse_command(line: &str) -> Result<Event> {
    let mut words = line.split_whitespace();
    let command = words.next().ok_or_else(|| anyhow!("empty command"))?;

    let mut peer = || -> Result<PeerId> {
        words
            .next()
            .map(PeerId::from)
            .ok_or_else(|| anyhow!("'{command}' needs a peer id"))
    };

    let event = match command {
        "connect" => Event::ConnectionRequested { peer: peer()? },
        "fail" => Event::PeerStateChanged {
            peer: peer()?,
            state: PeerState::Failed,
        },
        "disconnect" => Event::PeerStateChanged {
            peer: peer()?,
            state: PeerState::Disconnected,
        },
        "stream" => Event::StreamRequested(StreamRequest { peer: peer()? }),
        "stop" => Event::StreamStopped { peer: peer()? },
        "send" => {
            let peer = peer()?;
            let channel = words.next();
            let text = words.collect::<Vec<_>>().join(" ");
            let (Some(channel), false) = (channel, text.is_empty()) else {
                bail!("usage: send <peer> <channel> <text>");
            };
            Event::ChannelData(ChannelMessage {
                peer,
                channel: channel.to_string(),
                data: text.into_bytes(),
            })
        }
        "quit" => Event::Shutdown,
        other => bail!("unknown command '{other}'"),
    };

    Ok(event)
}

/// Read commands on a detached thread until stdin closes.
pub fn start(bus: EventBus) {
    std::thread::spawn(move || {
        info!("{HELP}");

        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    error!("Error while reading stdin: {e}");
                    return;
                }
            };

            if line.trim().is_empty() {
                continue;
            }

            match parse_command(&line) {
                Ok(event) => bus.send(event),
                Err(e) => warn!("{e}. {HELP}"),
            }
        }

        debug!("stdin closed");
    });
}
