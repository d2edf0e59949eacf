//! Core domain types for weft
//!
//! These types form the canonical data model the reconciliation engine
//! operates on: raw server-push events coming off the wire, the normalized
//! timeline facts derived from them, per-turn aggregates, and the pending
//! human-action records.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Thread** | One conversation with the assistant process |
//! | **Turn** | One request/response cycle within a Thread, identified by a stable turn id |
//! | **Event** | A raw push message from the gateway, sequenced per-thread |
//! | **Item** | A normalized, UI-agnostic timeline fact derived from one event |
//! | **Delta** | An incremental fragment of streamed text belonging to a larger message |
//! | **Cursor** | Highest event sequence number already applied; resumes the subscription |
//! | **Heartbeat** | A liveness-only push message carrying no domain data |
//!
//! ## Timestamps
//!
//! Server timestamps travel as RFC 3339 strings from a single server clock
//! and are compared lexicographically, which for that format coincides with
//! chronological order. They are kept as strings so an item's identity and
//! sort position never depend on a parse step; [`TimelineItem::timestamp`]
//! parses on demand for display layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================
// Raw events (wire shape)
// ============================================

/// Category of a raw gateway event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Timeline content (messages, tool activity)
    Item,
    /// Turn lifecycle (started, completed)
    Turn,
    /// Approval requests and decisions
    Approval,
    /// Interaction requests and responses
    Interaction,
    /// Thread-level bookkeeping
    Thread,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Item => "item",
            EventKind::Turn => "turn",
            EventKind::Approval => "approval",
            EventKind::Interaction => "interaction",
            EventKind::Thread => "thread",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item" => Ok(EventKind::Item),
            "turn" => Ok(EventKind::Turn),
            "approval" => Ok(EventKind::Approval),
            "interaction" => Ok(EventKind::Interaction),
            "thread" => Ok(EventKind::Thread),
            _ => Err(format!("unknown event kind: {}", s)),
        }
    }
}

/// One raw event as pushed by the gateway channel.
///
/// `seq` is monotonic per thread and is the resume cursor's unit. The payload
/// is carried opaquely here; [`crate::normalize`] gives it a typed reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    /// Monotonic sequence number within the thread
    pub seq: u64,
    /// Server-side emission timestamp (RFC 3339)
    pub server_ts: String,
    /// Thread this event belongs to
    pub thread_id: String,
    /// Turn this event belongs to, when attributable
    #[serde(default)]
    pub turn_id: Option<String>,
    /// Event category
    pub kind: EventKind,
    /// Dotted event type name (e.g., `item/agentMessage/delta`)
    pub name: String,
    /// Type-specific payload, preserved losslessly
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ============================================
// Timeline items
// ============================================

/// Kind of a normalized timeline item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    /// Message authored by the human operator
    UserMessage,
    /// Message authored by the assistant
    AssistantMessage,
    /// Assistant reasoning/thinking output
    Reasoning,
    /// Tool invocation
    ToolCall,
    /// Tool output
    ToolResult,
    /// Turn/lifecycle status marker
    Status,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::UserMessage => "userMessage",
            ItemType::AssistantMessage => "assistantMessage",
            ItemType::Reasoning => "reasoning",
            ItemType::ToolCall => "toolCall",
            ItemType::ToolResult => "toolResult",
            ItemType::Status => "status",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A canonical, UI-agnostic timeline fact.
///
/// Items come from two places: the REST snapshot (already in this shape) and
/// the normalizer (one item per recognized live event). `id` is synthesized
/// deterministically, so redelivering the identical event reproduces the
/// identical item and deduplication stays content-addressable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineItem {
    /// Stable identifier, unique within a session
    pub id: String,
    /// Server timestamp (RFC 3339, lexicographically ordered)
    pub ts: String,
    /// Turn this item belongs to, when attributable
    #[serde(default)]
    pub turn_id: Option<String>,
    /// Item kind
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Short human-readable label
    pub title: String,
    /// Textual content (never empty; empty facts are not recorded)
    #[serde(default)]
    pub text: Option<String>,
    /// Original event name, preserved for downstream heuristics
    pub raw_type: String,
    /// Tool name for tool activity
    #[serde(default)]
    pub tool_name: Option<String>,
    /// Tool call correlation id
    #[serde(default)]
    pub call_id: Option<String>,
}

impl TimelineItem {
    /// Whether this item carries an incremental streamed fragment rather
    /// than a final text.
    pub fn is_delta(&self) -> bool {
        self.raw_type.ends_with("/delta") || self.raw_type.ends_with("Delta")
    }

    /// Parse the server timestamp for display purposes.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

// ============================================
// Conversation turns
// ============================================

/// Lifecycle status of a conversation turn
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// No lifecycle signal observed yet
    #[default]
    Unknown,
    /// Turn is actively streaming
    InProgress,
    /// Turn finished normally
    Completed,
    /// Turn reported a failure
    Failed,
    /// Turn was interrupted by the operator
    Interrupted,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Unknown => "unknown",
            TurnStatus::InProgress => "in_progress",
            TurnStatus::Completed => "completed",
            TurnStatus::Failed => "failed",
            TurnStatus::Interrupted => "interrupted",
        }
    }

    /// Whether this is a terminal status
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TurnStatus::Completed | TurnStatus::Failed | TurnStatus::Interrupted
        )
    }
}

impl std::fmt::Display for TurnStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TurnStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(TurnStatus::Unknown),
            "in_progress" => Ok(TurnStatus::InProgress),
            "completed" => Ok(TurnStatus::Completed),
            "failed" => Ok(TurnStatus::Failed),
            "interrupted" => Ok(TurnStatus::Interrupted),
            _ => Err(format!("unknown turn status: {}", s)),
        }
    }
}

/// One tool invocation recorded on a turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCall {
    /// Tool name (e.g., `shell_command`)
    pub tool_name: String,
    /// Arguments or query text as shown to the operator
    pub text: String,
}

/// Aggregate over all timeline items sharing a turn id.
///
/// Turns are created lazily on the first attributed item, never deleted, and
/// mutate monotonically: text only grows or is replaced by a more complete
/// variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    /// Stable turn identifier
    pub turn_id: String,
    /// Earliest item timestamp seen for this turn
    pub started_at: String,
    /// Latest item timestamp seen for this turn
    pub completed_at: String,
    /// Lifecycle status
    pub status: TurnStatus,
    /// Derived: status == in_progress
    pub is_streaming: bool,
    /// Operator prompt text
    pub user_text: Option<String>,
    /// Assistant reply text (finals merged with streamed deltas)
    pub assistant_text: Option<String>,
    /// Assistant reasoning text
    pub thinking_text: Option<String>,
    /// Tool invocations in first-seen order
    pub tool_calls: Vec<ToolCall>,
    /// Tool outputs in first-seen order
    pub tool_results: Vec<String>,
}

impl ConversationTurn {
    /// Wall-clock span of the turn, when both timestamps parse.
    pub fn duration(&self) -> Option<chrono::Duration> {
        let start = DateTime::parse_from_rfc3339(&self.started_at).ok()?;
        let end = DateTime::parse_from_rfc3339(&self.completed_at).ok()?;
        Some(end.signed_duration_since(start))
    }
}

// ============================================
// Pending human actions
// ============================================

/// An approval request awaiting an operator decision
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApproval {
    /// Approval identifier
    pub id: String,
    /// Server timestamp of the requesting event
    pub received_at: String,
    /// Best-effort one-line description (command, reason, ...)
    #[serde(default)]
    pub summary: Option<String>,
    /// Complete original payload - never loses data
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// An interaction (question) awaiting an operator answer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInteraction {
    /// Interaction identifier
    pub id: String,
    /// Server timestamp of the requesting event
    pub received_at: String,
    /// Best-effort one-line description (question text, ...)
    #[serde(default)]
    pub summary: Option<String>,
    /// Complete original payload - never loses data
    #[serde(default)]
    pub payload: serde_json::Value,
}

// ============================================
// Connection state
// ============================================

/// State of the active event subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// First transport attempt in flight
    Connecting,
    /// Subscription live and healthy
    Connected,
    /// Transport lost; retry scheduled
    Reconnecting,
    /// Transport open but no activity past the staleness threshold
    Lagging,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Lagging => "lagging",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
