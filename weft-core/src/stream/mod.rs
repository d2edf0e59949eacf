//! Stream connection manager
//!
//! Owns the transport loop for one thread subscription: connect with the
//! resume cursor, fan incoming frames out to the reconciliation state,
//! reconnect with exponential backoff, and flag staleness via a heartbeat
//! watchdog.
//!
//! State machine: connecting, then connected, dropping to reconnecting or
//! lagging and back. Only `connecting`/`reconnecting` have a transport
//! attempt in flight. `lagging` is a liveness signal: it never tears the
//! transport down, and any frame flips the state back to `connected`.
//!
//! Teardown is cancellation-by-drop: the retry sleep, the watchdog interval,
//! and the transport stream all live inside [`StreamManager::run`], so
//! dropping that future (or signalling the shutdown channel) cancels all
//! three together and no zombie retry can revive a discarded subscription.

pub mod sse;

pub use sse::SseTransport;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::watch;
use tokio::time::{interval, sleep, Duration, Instant};

use crate::config::StreamConfig;
use crate::error::Result;
use crate::reconcile::{Applied, ThreadState};
use crate::types::{ConnectionState, RawEvent, TimelineItem};

/// One frame off the push channel.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    /// A gateway event carrying one raw domain event
    Event(RawEvent),
    /// Liveness-only message, no domain data
    Heartbeat,
}

/// A live frame stream; ends (or errors) when the transport fails.
pub type EventStream = BoxStream<'static, Result<StreamFrame>>;

/// Transport seam for the connection manager.
///
/// Contract: opening with `since = Some(seq)` makes the server replay every
/// event with sequence number at or after `seq`, gap-free. The client trusts
/// this (there is no client-side gap detection) and defensively discards
/// anything at or below its cursor to absorb double-sends at reconnect
/// boundaries.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Open a subscription for a thread, resuming from `since` if given.
    async fn open(&self, thread_id: &str, since: Option<u64>) -> Result<EventStream>;
}

/// Notification fanned out to the consumer after each state change.
#[derive(Debug, Clone)]
pub enum StreamUpdate {
    /// Connection label changed
    Connection(ConnectionState),
    /// A timeline item was applied
    Item(TimelineItem),
    /// Pending approvals/interactions changed
    Pending,
}

/// Drives one thread subscription against a transport.
pub struct StreamManager<T> {
    transport: T,
    config: StreamConfig,
    state: ThreadState,
}

impl<T: EventTransport> StreamManager<T> {
    pub fn new(transport: T, config: StreamConfig, state: ThreadState) -> Self {
        Self {
            transport,
            config,
            state,
        }
    }

    /// Current reconciliation state.
    pub fn state(&self) -> &ThreadState {
        &self.state
    }

    /// Consume the manager, handing the reconciliation state back.
    pub fn into_state(self) -> ThreadState {
        self.state
    }

    /// Run the subscription until the shutdown channel fires (or its sender
    /// drops). Transport failures are absorbed: they surface only as the
    /// `reconnecting` label and a backoff delay, never as an `Err`.
    pub async fn run<F>(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
        mut on_update: F,
    ) -> Result<()>
    where
        F: FnMut(&ThreadState, StreamUpdate),
    {
        let mut attempt: u32 = 0;
        let mut first_attempt = true;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let label = if first_attempt {
                ConnectionState::Connecting
            } else {
                ConnectionState::Reconnecting
            };
            first_attempt = false;
            self.transition(label, &mut on_update);

            match self
                .transport
                .open(self.state.thread_id(), self.state.cursor())
                .await
            {
                Ok(stream) => {
                    tracing::info!(
                        thread_id = %self.state.thread_id(),
                        since = ?self.state.cursor(),
                        "Subscription open"
                    );
                    self.transition(ConnectionState::Connected, &mut on_update);

                    if self
                        .pump(stream, &mut attempt, &mut shutdown, &mut on_update)
                        .await
                    {
                        return Ok(());
                    }
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Subscription attempt failed");
                }
            }

            let delay = backoff_delay(&self.config, attempt);
            attempt = attempt.saturating_add(1);
            self.transition(ConnectionState::Reconnecting, &mut on_update);
            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, "Retry scheduled");

            tokio::select! {
                _ = sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Read frames until the stream ends or errors. Returns true on shutdown.
    async fn pump<F>(
        &mut self,
        mut stream: EventStream,
        attempt: &mut u32,
        shutdown: &mut watch::Receiver<bool>,
        on_update: &mut F,
    ) -> bool
    where
        F: FnMut(&ThreadState, StreamUpdate),
    {
        let mut last_activity = Instant::now();
        let mut watchdog = interval(self.config.watchdog_interval());

        loop {
            tokio::select! {
                frame = stream.next() => match frame {
                    Some(Ok(StreamFrame::Heartbeat)) => {
                        // Heartbeats refresh liveness but never the cursor.
                        last_activity = Instant::now();
                        *attempt = 0;
                        self.transition(ConnectionState::Connected, on_update);
                    }
                    Some(Ok(StreamFrame::Event(event))) => {
                        last_activity = Instant::now();
                        *attempt = 0;
                        self.transition(ConnectionState::Connected, on_update);
                        match self.state.apply(&event) {
                            Applied::Item(item) => {
                                on_update(&self.state, StreamUpdate::Item(item));
                            }
                            Applied::Registry => {
                                on_update(&self.state, StreamUpdate::Pending);
                            }
                            Applied::Duplicate
                            | Applied::ForeignThread
                            | Applied::Skipped
                            | Applied::Malformed => {}
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Event stream failed");
                        return false;
                    }
                    None => {
                        tracing::debug!("Event stream closed by server");
                        return false;
                    }
                },
                _ = watchdog.tick() => {
                    if last_activity.elapsed() >= self.config.stale_after()
                        && self.state.connection() == ConnectionState::Connected
                    {
                        tracing::warn!(
                            idle_secs = last_activity.elapsed().as_secs(),
                            "No stream activity past staleness threshold"
                        );
                        self.transition(ConnectionState::Lagging, on_update);
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        return true;
                    }
                }
            }
        }
    }

    fn transition<F>(&mut self, next: ConnectionState, on_update: &mut F)
    where
        F: FnMut(&ThreadState, StreamUpdate),
    {
        if self.state.connection() == next {
            return;
        }
        tracing::debug!(from = %self.state.connection(), to = %next, "Connection state change");
        self.state.set_connection(next);
        on_update(&self.state, StreamUpdate::Connection(next));
    }
}

/// Exponential backoff: `min(cap, base × 2^attempt)`.
pub fn backoff_delay(config: &StreamConfig, attempt: u32) -> Duration {
    let exponent = attempt.min(16);
    let ms = config.backoff_base_ms.saturating_mul(1u64 << exponent);
    Duration::from_millis(ms.min(config.backoff_max_ms))
}
