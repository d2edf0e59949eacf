//! Pending-action registries
//!
//! Two independent keyed sets (approvals awaiting a decision, interactions
//! awaiting an answer) whose membership is driven by the same live event
//! feed as the timeline, but independently of it. The REST snapshot seeds
//! them once at connection start; afterwards the feed is the sole source of
//! truth. Outbound HTTP responses never mutate these sets: an entry leaves
//! only when the matching terminal event arrives.
//!
//! Removing a key that is not present is a no-op, not an error: terminal
//! events can be redelivered, and decisions made elsewhere race the seed.

use serde_json::Value;

use crate::types::{EventKind, PendingApproval, PendingInteraction, RawEvent};

/// Terminal event names that clear an approval entry.
const APPROVAL_TERMINALS: [&str; 2] = ["approval/decision", "approval/cancelled"];

/// Terminal event names that clear an interaction entry.
const INTERACTION_TERMINALS: [&str; 2] = ["interaction/responded", "interaction/cancelled"];

/// Approvals awaiting an operator decision, in arrival order.
#[derive(Debug, Default)]
pub struct ApprovalRegistry {
    entries: Vec<PendingApproval>,
}

impl ApprovalRegistry {
    /// Seed from the snapshot's pending list.
    pub fn load(&mut self, entries: Vec<PendingApproval>) {
        self.entries = entries;
    }

    /// Apply one live event. Returns true if membership changed.
    pub fn apply(&mut self, event: &RawEvent) -> bool {
        if event.kind != EventKind::Approval {
            return false;
        }
        let Some(id) = id_field(&event.payload, "approvalId") else {
            tracing::debug!(name = %event.name, seq = event.seq, "Approval event without approvalId");
            return false;
        };

        if APPROVAL_TERMINALS.contains(&event.name.as_str()) {
            return self.remove(&id);
        }

        if self.get(&id).is_some() {
            return false;
        }
        self.entries.push(PendingApproval {
            id,
            received_at: event.server_ts.clone(),
            summary: summary_field(&event.payload),
            payload: event.payload.clone(),
        });
        true
    }

    /// Remove by id. Absent keys are a no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&PendingApproval> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingApproval> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Interactions awaiting an operator answer, in arrival order.
#[derive(Debug, Default)]
pub struct InteractionRegistry {
    entries: Vec<PendingInteraction>,
}

impl InteractionRegistry {
    /// Seed from the snapshot's pending list.
    pub fn load(&mut self, entries: Vec<PendingInteraction>) {
        self.entries = entries;
    }

    /// Apply one live event. Returns true if membership changed.
    pub fn apply(&mut self, event: &RawEvent) -> bool {
        if event.kind != EventKind::Interaction {
            return false;
        }
        let Some(id) = id_field(&event.payload, "interactionId") else {
            tracing::debug!(name = %event.name, seq = event.seq, "Interaction event without interactionId");
            return false;
        };

        if INTERACTION_TERMINALS.contains(&event.name.as_str()) {
            return self.remove(&id);
        }

        if self.get(&id).is_some() {
            return false;
        }
        self.entries.push(PendingInteraction {
            id,
            received_at: event.server_ts.clone(),
            summary: summary_field(&event.payload),
            payload: event.payload.clone(),
        });
        true
    }

    /// Remove by id. Absent keys are a no-op.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    pub fn get(&self, id: &str) -> Option<&PendingInteraction> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingInteraction> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Extract the identifying id from a payload, falling back to plain `id`.
fn id_field(payload: &Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .or_else(|| payload.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Best-effort one-line description from conventional payload fields.
fn summary_field(payload: &Value) -> Option<String> {
    for key in ["summary", "question", "reason", "command"] {
        if let Some(text) = payload.get(key).and_then(Value::as_str) {
            if !text.trim().is_empty() {
                return Some(text.to_string());
            }
        }
    }
    None
}
