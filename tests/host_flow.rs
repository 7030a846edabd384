//! Integration tests for the console host.
//!
//! Console lines are parsed into events and handled by a host whose
//! sessions render synthetic media offline.

mod common;

use common::*;
use peer_player::event::{Event, EventBus};
use peer_player::host::{self, Decision, Handlers, Host, PeerId};
use peer_player::stdin::parse_command;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn config(duration_secs: f64, realtime: bool) -> Arc<Config> {
    Arc::new(Config {
        log_level: "info".to_string(),
        media: MediaConfig::Synthetic(SyntheticSettings {
            duration_secs,
            video: Some(SyntheticVideo {
                width: 8,
                height: 8,
                fps: 30,
            }),
            audio: Some(SyntheticAudio {
                sample_rate: 44100,
                channels: 1,
                tone_hz: 440.0,
                frames_per_packet: 1024,
            }),
        }),
        output: OutputConfig {
            format: OutputFormat::default(),
            width: 8,
            height: 8,
        },
        pacing: PacingConfig {
            realtime,
            ..PacingConfig::default()
        },
        sink: SinkConfig::Null,
    })
}

/// Test a console session from connect to echo to stream end.
#[tokio::test]
async fn test_console_session() {
    let states = Arc::new(Mutex::new(vec![]));
    let seen = states.clone();
    let handlers = Handlers::console()
        .on_peer_state_changed(move |peer, state| {
            seen.lock().unwrap().push(format!("{peer}:{state}"))
        });
    let mut host = Host::new(handlers, config(0.5, false));

    assert!(host.handle(parse_command("stream alice").unwrap()).is_empty());
    assert!(!host.has_session(&PeerId::from("alice")));

    for line in ["connect alice", "stream alice"] {
        assert!(host.handle(parse_command(line).unwrap()).is_empty());
    }
    assert!(host.has_session(&PeerId::from("alice")));

    let replies = host.handle(parse_command("send alice chat stressed").unwrap());
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].data, b"desserts".to_vec());
    assert_eq!(replies[0].channel, "chat");

    let mut reports = vec![];
    for _ in 0..500 {
        reports = host.prune().await;
        if !reports.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let report = reports[0].1.as_ref().unwrap();
    assert_eq!(report.reason, StopReason::EndOfStream);
    assert_eq!(report.stats.video_frames, 15);
    assert_eq!(report.stats.audio_samples, 22050);

    host.handle(parse_command("disconnect alice").unwrap());
    assert_eq!(
        *states.lock().unwrap(),
        vec!["alice:connected".to_string(), "alice:disconnected".to_string()]
    );
}

/// Test that peers stream independently of each other.
#[tokio::test]
async fn test_sessions_are_independent() {
    let handlers = Handlers::new().on_stream_requested(|request| {
        if request.peer.as_str() == "mallory" {
            Decision::Reject
        } else {
            Decision::Accept
        }
    });
    let mut host = Host::new(handlers, config(60.0, true));

    for line in [
        "connect alice",
        "connect bob",
        "connect mallory",
        "stream alice",
        "stream bob",
        "stream mallory",
    ] {
        host.handle(parse_command(line).unwrap());
    }
    assert_eq!(host.session_count(), 2);

    host.handle(parse_command("fail alice").unwrap());
    assert!(!host.has_session(&PeerId::from("alice")));
    assert!(host.has_session(&PeerId::from("bob")));

    let reports = host.shutdown().await;
    assert_eq!(reports.len(), 2);
    for (_, report) in reports {
        assert_eq!(report.unwrap().reason, StopReason::Closed);
    }
}

/// Test the host task driven over the event bus.
#[tokio::test]
async fn test_host_over_event_bus() {
    let bus = EventBus::new();
    let task = host::start(Host::new(Handlers::console(), config(60.0, true)), &bus);

    for line in ["connect bob", "stream bob", "send bob data ping", "quit"] {
        bus.send(parse_command(line).unwrap());
    }

    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("Host did not shut down")
        .unwrap();
}

/// Test that a stream can be restarted once the previous one ended.
#[tokio::test]
async fn test_restart_after_end_of_stream() {
    let mut host = Host::new(Handlers::new(), config(0.2, false));
    let carol = PeerId::from("carol");

    host.handle(Event::ConnectionRequested {
        peer: carol.clone(),
    });
    host.handle(Event::StreamRequested(peer_player::host::StreamRequest {
        peer: carol.clone(),
    }));

    for _ in 0..500 {
        if !host.prune().await.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!host.has_session(&carol));

    host.handle(parse_command("stream carol").unwrap());
    assert!(host.has_session(&carol));

    let reports = host.shutdown().await;
    assert_eq!(reports.len(), 1);
}
