//! Integration tests for the stream connection manager
//!
//! These run `StreamManager` against a scripted transport under tokio's
//! paused clock, so backoff sleeps and watchdog ticks elapse instantly and
//! deterministically.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio::sync::watch;
use tokio::time::{Duration, Instant};

use weft_core::config::StreamConfig;
use weft_core::stream::{EventStream, EventTransport, StreamFrame, StreamUpdate};
use weft_core::types::{ConnectionState, EventKind, RawEvent};
use weft_core::{Error, StreamManager, ThreadState};

/// One scripted step inside an accepted connection.
enum Step {
    Frame(StreamFrame),
    /// Let virtual time pass before the next step
    Idle(Duration),
    /// Fail the stream with a transport error
    Fail(&'static str),
}

/// One scripted connection attempt.
enum Conn {
    Refuse(&'static str),
    Accept(Vec<Step>),
}

/// Transport that replays a fixed script of connection attempts and records
/// every `since` cursor it was opened with.
#[derive(Clone)]
struct ScriptedTransport {
    connections: Arc<Mutex<VecDeque<Conn>>>,
    opens: Arc<Mutex<Vec<Option<u64>>>>,
}

impl ScriptedTransport {
    fn new(connections: Vec<Conn>) -> Self {
        Self {
            connections: Arc::new(Mutex::new(connections.into())),
            opens: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn opens(&self) -> Vec<Option<u64>> {
        self.opens.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    async fn open(&self, _thread_id: &str, since: Option<u64>) -> weft_core::Result<EventStream> {
        self.opens.lock().unwrap().push(since);

        let conn = self
            .connections
            .lock()
            .unwrap()
            .pop_front()
            // Script exhausted: stay silent for a long time, then close
            .unwrap_or_else(|| Conn::Accept(vec![Step::Idle(Duration::from_secs(3600))]));

        match conn {
            Conn::Refuse(message) => Err(Error::Stream(message.to_string())),
            Conn::Accept(steps) => {
                let stream = futures::stream::unfold(steps.into_iter(), |mut steps| async move {
                    loop {
                        match steps.next() {
                            Some(Step::Idle(delay)) => {
                                tokio::time::sleep(delay).await;
                            }
                            Some(Step::Frame(frame)) => return Some((Ok(frame), steps)),
                            Some(Step::Fail(message)) => {
                                return Some((Err(Error::Stream(message.to_string())), steps))
                            }
                            None => return None,
                        }
                    }
                })
                .boxed();
                Ok(stream)
            }
        }
    }
}

fn delta_event(seq: u64, text: &str) -> RawEvent {
    RawEvent {
        seq,
        server_ts: format!("2026-08-01T10:00:{:02}Z", seq),
        thread_id: "th-1".to_string(),
        turn_id: Some("turn-1".to_string()),
        kind: EventKind::Item,
        name: "item/agentMessage/delta".to_string(),
        payload: json!({"delta": text}),
    }
}

fn frame(seq: u64, text: &str) -> Step {
    Step::Frame(StreamFrame::Event(delta_event(seq, text)))
}

fn manager(transport: ScriptedTransport) -> StreamManager<ScriptedTransport> {
    StreamManager::new(
        transport,
        StreamConfig::default(),
        ThreadState::new("th-1", 4096),
    )
}

// ============================================
// Resume cursor across reconnects
// ============================================

#[tokio::test(start_paused = true)]
async fn test_reconnect_resumes_from_cursor_and_discards_replays() {
    let transport = ScriptedTransport::new(vec![
        Conn::Accept(vec![
            frame(4, "Hel"),
            frame(5, "lo"),
            Step::Fail("connection reset"),
        ]),
        // Server replays the cursor event at the reconnect boundary
        Conn::Accept(vec![
            frame(5, "lo"),
            frame(6, " world"),
            Step::Idle(Duration::from_secs(3600)),
        ]),
    ]);

    let mut manager = manager(transport.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    manager
        .run(shutdown_rx, |_state, update| {
            if let StreamUpdate::Item(item) = &update {
                if item.id.starts_with("6-") {
                    let _ = shutdown_tx.send(true);
                }
            }
        })
        .await
        .expect("run should exit cleanly");

    // Second attempt resumed from the highest applied seq
    assert_eq!(transport.opens(), vec![None, Some(5)]);

    let state = manager.state();
    assert_eq!(state.cursor(), Some(6));
    // The replayed seq=5 did not duplicate
    let timeline = state.timeline();
    assert_eq!(timeline.len(), 3);
    assert_eq!(
        timeline.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
        vec!["4-agent-delta", "5-agent-delta", "6-agent-delta"]
    );
}

// ============================================
// Staleness watchdog
// ============================================

#[tokio::test(start_paused = true)]
async fn test_silent_stream_goes_lagging_until_heartbeat() {
    let transport = ScriptedTransport::new(vec![Conn::Accept(vec![
        frame(1, "x"),
        // 21 seconds of silence exceeds the 20s staleness threshold
        Step::Idle(Duration::from_secs(21)),
        Step::Frame(StreamFrame::Heartbeat),
        Step::Idle(Duration::from_secs(3600)),
    ])]);

    let mut manager = manager(transport);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut transitions: Vec<ConnectionState> = Vec::new();
    let mut saw_lagging = false;

    manager
        .run(shutdown_rx, |_state, update| {
            if let StreamUpdate::Connection(state) = update {
                transitions.push(state);
                if state == ConnectionState::Lagging {
                    saw_lagging = true;
                } else if saw_lagging && state == ConnectionState::Connected {
                    // Recovered; end the test
                    let _ = shutdown_tx.send(true);
                }
            }
        })
        .await
        .expect("run should exit cleanly");

    assert_eq!(
        transitions,
        vec![
            ConnectionState::Connected,
            ConnectionState::Lagging,
            ConnectionState::Connected,
        ]
    );

    // Heartbeats refresh liveness but never advance the cursor
    assert_eq!(manager.state().cursor(), Some(1));
}

// ============================================
// Backoff on refused connections
// ============================================

#[tokio::test(start_paused = true)]
async fn test_refused_connections_back_off_then_connect() {
    let transport = ScriptedTransport::new(vec![
        Conn::Refuse("503 service unavailable"),
        Conn::Refuse("503 service unavailable"),
        Conn::Accept(vec![frame(1, "up again"), Step::Idle(Duration::from_secs(3600))]),
    ]);

    let mut manager = manager(transport.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let started = Instant::now();
    let mut transitions: Vec<ConnectionState> = Vec::new();

    manager
        .run(shutdown_rx, |_state, update| match update {
            StreamUpdate::Connection(state) => transitions.push(state),
            StreamUpdate::Item(_) => {
                let _ = shutdown_tx.send(true);
            }
            StreamUpdate::Pending => {}
        })
        .await
        .expect("run should exit cleanly");

    // Three attempts: two refused, one accepted
    assert_eq!(transport.opens().len(), 3);

    // The two retries slept 800ms and 1600ms of virtual time
    assert!(started.elapsed() >= Duration::from_millis(2400));

    assert!(transitions.contains(&ConnectionState::Reconnecting));
    assert_eq!(transitions.last(), Some(&ConnectionState::Connected));
    assert_eq!(manager.state().cursor(), Some(1));
}

// ============================================
// Registry updates through the manager
// ============================================

#[tokio::test(start_paused = true)]
async fn test_pending_updates_fan_out() {
    let approval = RawEvent {
        seq: 1,
        server_ts: "2026-08-01T10:00:00Z".to_string(),
        thread_id: "th-1".to_string(),
        turn_id: Some("turn-1".to_string()),
        kind: EventKind::Approval,
        name: "approval/requested".to_string(),
        payload: json!({"approvalId": "ap-1", "command": "rm -rf target"}),
    };

    let transport = ScriptedTransport::new(vec![Conn::Accept(vec![
        Step::Frame(StreamFrame::Event(approval)),
        Step::Idle(Duration::from_secs(3600)),
    ])]);

    let mut manager = manager(transport);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut pending_updates = 0;
    manager
        .run(shutdown_rx, |state, update| {
            if matches!(update, StreamUpdate::Pending) {
                pending_updates += 1;
                assert_eq!(state.approvals().len(), 1);
                let _ = shutdown_tx.send(true);
            }
        })
        .await
        .expect("run should exit cleanly");

    assert_eq!(pending_updates, 1);
    assert!(manager.state().approvals().get("ap-1").is_some());
}
