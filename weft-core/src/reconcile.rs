//! Thread reconciliation state
//!
//! [`ThreadState`] is the single mutable value behind a conversation view:
//! the snapshot fetched once over REST, the capped buffer of live items, the
//! resume cursor, both pending-action registries, and the connection label.
//! It is a reducer: `apply` folds one raw event into the state and reports
//! what changed, and every read is a pure derivation over current state.
//!
//! The cursor advances on every applied event and never goes back. Events at
//! or below it are discarded: the server double-sends at reconnect
//! boundaries, and at-least-once delivery with idempotent merge is the
//! actual contract.

use std::collections::{HashMap, VecDeque};

use crate::client::ThreadSnapshot;
use crate::normalize::normalize;
use crate::pending::{ApprovalRegistry, InteractionRegistry};
use crate::timeline::{aggregate, merge, ordered_turns};
use crate::types::{
    ConnectionState, ConversationTurn, EventKind, RawEvent, TimelineItem,
};

/// What applying one raw event did to the state.
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    /// A timeline item was added
    Item(TimelineItem),
    /// A pending registry changed membership
    Registry,
    /// Event was at or below the cursor (replay) and was discarded
    Duplicate,
    /// Event belongs to a different thread and was discarded
    ForeignThread,
    /// Recognized but content-free (or unrecognized) event; cursor advanced
    Skipped,
    /// Recognized event with a malformed payload; dropped, cursor advanced
    Malformed,
}

/// Reconciliation state for one thread subscription.
#[derive(Debug)]
pub struct ThreadState {
    thread_id: String,
    snapshot: Vec<TimelineItem>,
    live: VecDeque<TimelineItem>,
    live_cap: usize,
    cursor: Option<u64>,
    evicted: u64,
    approvals: ApprovalRegistry,
    interactions: InteractionRegistry,
    connection: ConnectionState,
}

impl ThreadState {
    /// Create empty state for a thread. `live_cap` bounds the live buffer;
    /// oldest items are evicted beyond it to keep merge cost bounded.
    pub fn new(thread_id: impl Into<String>, live_cap: usize) -> Self {
        Self {
            thread_id: thread_id.into(),
            snapshot: Vec::new(),
            live: VecDeque::new(),
            live_cap: live_cap.max(1),
            cursor: None,
            evicted: 0,
            approvals: ApprovalRegistry::default(),
            interactions: InteractionRegistry::default(),
            connection: ConnectionState::Connecting,
        }
    }

    /// Seed state from the one-time REST snapshot.
    pub fn seed(&mut self, snapshot: ThreadSnapshot) {
        self.snapshot = snapshot.items;
        self.approvals.load(snapshot.pending_approvals);
        self.interactions.load(snapshot.pending_interactions);
    }

    /// Fold one raw event into the state.
    pub fn apply(&mut self, event: &RawEvent) -> Applied {
        if event.thread_id != self.thread_id {
            tracing::debug!(
                thread_id = %event.thread_id,
                expected = %self.thread_id,
                "Discarding event for foreign thread"
            );
            return Applied::ForeignThread;
        }

        if let Some(cursor) = self.cursor {
            if event.seq <= cursor {
                tracing::debug!(seq = event.seq, cursor, "Discarding replayed event");
                return Applied::Duplicate;
            }
        }
        self.cursor = Some(event.seq);

        match event.kind {
            EventKind::Approval => {
                if self.approvals.apply(event) {
                    Applied::Registry
                } else {
                    Applied::Skipped
                }
            }
            EventKind::Interaction => {
                if self.interactions.apply(event) {
                    Applied::Registry
                } else {
                    Applied::Skipped
                }
            }
            _ => match normalize(event) {
                Ok(Some(item)) => {
                    self.push_live(item.clone());
                    Applied::Item(item)
                }
                Ok(None) => Applied::Skipped,
                Err(e) => {
                    // A single bad event must never halt the stream.
                    tracing::warn!(
                        seq = event.seq,
                        name = %event.name,
                        error = %e,
                        "Dropping malformed event"
                    );
                    Applied::Malformed
                }
            },
        }
    }

    fn push_live(&mut self, item: TimelineItem) {
        if self.live.len() >= self.live_cap {
            self.live.pop_front();
            self.evicted += 1;
            tracing::debug!(
                cap = self.live_cap,
                evicted = self.evicted,
                "Live buffer full, evicting oldest item"
            );
        }
        self.live.push_back(item);
    }

    /// Deduplicated, ordered timeline over snapshot + live buffer.
    pub fn timeline(&self) -> Vec<TimelineItem> {
        let live: Vec<TimelineItem> = self.live.iter().cloned().collect();
        merge(&self.snapshot, &live)
    }

    /// Per-turn aggregates keyed by turn id.
    pub fn turn_map(&self) -> HashMap<String, ConversationTurn> {
        aggregate(&self.timeline())
    }

    /// Per-turn aggregates, ordered by start time.
    pub fn turns(&self) -> Vec<ConversationTurn> {
        ordered_turns(self.turn_map())
    }

    /// Highest event sequence number applied; the resume cursor.
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Count of live items evicted by the buffer cap.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    pub fn approvals(&self) -> &ApprovalRegistry {
        &self.approvals
    }

    pub fn interactions(&self) -> &InteractionRegistry {
        &self.interactions
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub(crate) fn set_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }
}
