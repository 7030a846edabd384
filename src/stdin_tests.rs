//! Unit tests for the stdin module

#[cfg(test)]
mod tests {
    use crate::event::Event;
    use crate::host::{ChannelMessage, PeerId, PeerState, StreamRequest};
    use crate::stdin::parse_command;

    #[test]
    fn test_parse_peer_state_commands() {
        assert_eq!(
            parse_command("connect alice").unwrap(),
            Event::ConnectionRequested {
                peer: PeerId::from("alice")
            }
        );
        assert_eq!(
            parse_command("  disconnect   bob ").unwrap(),
            Event::PeerStateChanged {
                peer: PeerId::from("bob"),
                state: PeerState::Disconnected
            }
        );
        assert_eq!(
            parse_command("fail carol").unwrap(),
            Event::PeerStateChanged {
                peer: PeerId::from("carol"),
                state: PeerState::Failed
            }
        );
    }

    #[test]
    fn test_parse_stream_commands() {
        assert_eq!(
            parse_command("stream alice").unwrap(),
            Event::StreamRequested(StreamRequest {
                peer: PeerId::from("alice")
            })
        );
        assert_eq!(
            parse_command("stop alice").unwrap(),
            Event::StreamStopped {
                peer: PeerId::from("alice")
            }
        );
    }

    #[test]
    fn test_parse_send() {
        assert_eq!(
            parse_command("send alice chat hello  there").unwrap(),
            Event::ChannelData(ChannelMessage {
                peer: PeerId::from("alice"),
                channel: "chat".to_string(),
                data: b"hello there".to_vec(),
            })
        );
    }

    #[test]
    fn test_parse_quit() {
        assert_eq!(parse_command("quit").unwrap(), Event::Shutdown);
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_command("").is_err());
        assert!(parse_command("connect").is_err());
        assert!(parse_command("send alice").is_err());
        assert!(parse_command("send alice chat").is_err());
        assert!(parse_command("dance alice").is_err());
    }
}
