//! Event normalizer
//!
//! Maps one raw gateway event into at most one canonical [`TimelineItem`].
//! Dispatch is by event name, with the generic `item/started` /
//! `item/completed` envelope unpacked by its nested `item.type` discriminator.
//!
//! # Error Handling
//!
//! Normalization is total over recognized shapes and never panics:
//!
//! - **Unrecognized event names**: `Ok(None)`, not an error; the stream
//!   carries event types this client does not render.
//!
//! - **Recognized name, malformed payload**: `Err(Error::Payload)`. Callers
//!   log the event and skip it; a single bad payload must never halt the
//!   stream.
//!
//! - **Empty derived text**: `Ok(None)`. Empty facts are not recorded, so a
//!   whitespace-only delta or a tool call whose arguments have not arrived
//!   yet produces nothing.
//!
//! Item ids are synthesized deterministically from the event sequence number
//! plus a type-specific suffix, so redelivery of the identical event yields
//! the identical item and downstream dedup is content-addressable.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{EventKind, ItemType, RawEvent, TimelineItem};

/// Event names recognized outside the generic item envelope.
const TURN_STARTED: &str = "turn/started";
const TURN_COMPLETED: &str = "turn/completed";
const AGENT_MESSAGE_DELTA: &str = "item/agentMessage/delta";
const COMMAND_OUTPUT_DELTA: &str = "item/commandExecution/outputDelta";
const FILE_CHANGE_OUTPUT_DELTA: &str = "item/fileChange/outputDelta";
const ITEM_STARTED: &str = "item/started";
const ITEM_COMPLETED: &str = "item/completed";

// ============================================
// Raw payload shapes (serde deserialization)
// ============================================

/// Payload of `turn/completed`; `turn/started` carries no fields we read.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct TurnCompletedPayload {
    status: Option<String>,
    message: Option<String>,
}

/// Payload of the streaming delta events.
#[derive(Debug, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct DeltaPayload {
    delta: Option<String>,
    text: Option<String>,
    output: Option<String>,
    call_id: Option<String>,
}

impl DeltaPayload {
    fn fragment(&self) -> Option<&str> {
        self.delta
            .as_deref()
            .or(self.text.as_deref())
            .or(self.output.as_deref())
    }
}

/// Envelope carried by `item/started` and `item/completed`.
#[derive(Debug, Deserialize)]
struct ItemEnvelope {
    item: SubItem,
}

/// Typed sub-items of the generic envelope.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum SubItem {
    #[serde(rename = "userMessage")]
    UserMessage {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(rename = "agentMessage")]
    AgentMessage {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(rename = "reasoning")]
    Reasoning {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        summary: Option<String>,
    },
    #[serde(rename = "plan")]
    Plan {
        #[serde(default)]
        text: Option<String>,
    },
    #[serde(rename = "function_call", rename_all = "camelCase")]
    FunctionCall {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
    },
    #[serde(rename = "custom_tool_call", rename_all = "camelCase")]
    CustomToolCall {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        arguments: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
    },
    #[serde(rename = "web_search_call", rename_all = "camelCase")]
    WebSearchCall {
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
    },
    #[serde(rename = "function_call_output", rename_all = "camelCase")]
    FunctionCallOutput {
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
    },
    #[serde(rename = "custom_tool_call_output", rename_all = "camelCase")]
    CustomToolCallOutput {
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
    },
    #[serde(rename = "web_search_call_output", rename_all = "camelCase")]
    WebSearchCallOutput {
        #[serde(default)]
        output: Option<String>,
        #[serde(default)]
        call_id: Option<String>,
    },
    #[serde(rename = "enteredReviewMode")]
    EnteredReviewMode,
    #[serde(rename = "exitedReviewMode")]
    ExitedReviewMode,
    #[serde(other)]
    Unknown,
}

// ============================================
// Normalization
// ============================================

/// Normalize one raw event into at most one timeline item.
///
/// See the module docs for the `Ok(None)` / `Err` contract.
pub fn normalize(event: &RawEvent) -> Result<Option<TimelineItem>> {
    // Approval/interaction traffic feeds the pending registries, never the
    // timeline.
    if matches!(event.kind, EventKind::Approval | EventKind::Interaction) {
        return Ok(None);
    }

    match event.name.as_str() {
        TURN_STARTED => Ok(build(
            event,
            "turn-started",
            ItemType::Status,
            "Turn",
            Some("started".to_string()),
            None,
            None,
        )),
        TURN_COMPLETED => {
            let payload: TurnCompletedPayload = parse_payload(event)?;
            let text = payload
                .status
                .or(payload.message)
                .unwrap_or_else(|| "completed".to_string());
            Ok(build(
                event,
                "turn-completed",
                ItemType::Status,
                "Turn",
                Some(text),
                None,
                None,
            ))
        }
        AGENT_MESSAGE_DELTA => {
            let payload: DeltaPayload = parse_payload(event)?;
            Ok(build(
                event,
                "agent-delta",
                ItemType::AssistantMessage,
                "Assistant",
                payload.fragment().map(str::to_string),
                None,
                None,
            ))
        }
        COMMAND_OUTPUT_DELTA | FILE_CHANGE_OUTPUT_DELTA => {
            let payload: DeltaPayload = parse_payload(event)?;
            let tool = tool_name_from_event(&event.name);
            Ok(build(
                event,
                "output-delta",
                ItemType::ToolResult,
                "Output",
                payload.fragment().map(str::to_string),
                Some(tool.to_string()),
                payload.call_id.clone(),
            ))
        }
        ITEM_STARTED | ITEM_COMPLETED => {
            let envelope: ItemEnvelope = parse_payload(event)?;
            Ok(normalize_sub_item(event, envelope.item))
        }
        name if name.starts_with("item/reasoning/") && name.ends_with("Delta") => {
            let payload: DeltaPayload = parse_payload(event)?;
            Ok(build(
                event,
                "reasoning-delta",
                ItemType::Reasoning,
                "Reasoning",
                payload.fragment().map(str::to_string),
                None,
                None,
            ))
        }
        _ => Ok(None),
    }
}

/// Unpack a typed sub-item of the `item/started` / `item/completed` envelope.
fn normalize_sub_item(event: &RawEvent, item: SubItem) -> Option<TimelineItem> {
    match item {
        SubItem::UserMessage { text } => {
            build(event, "user", ItemType::UserMessage, "You", text, None, None)
        }
        SubItem::AgentMessage { text } => build(
            event,
            "agent",
            ItemType::AssistantMessage,
            "Assistant",
            text,
            None,
            None,
        ),
        SubItem::Reasoning { text, summary } => build(
            event,
            "reasoning",
            ItemType::Reasoning,
            "Reasoning",
            text.or(summary),
            None,
            None,
        ),
        SubItem::Plan { text } => build(
            event,
            "plan",
            ItemType::AssistantMessage,
            "Plan",
            text,
            None,
            None,
        ),
        SubItem::FunctionCall {
            name,
            arguments,
            call_id,
        }
        | SubItem::CustomToolCall {
            name,
            arguments,
            call_id,
        } => {
            let tool = name.unwrap_or_else(|| "tool".to_string());
            let title = tool.clone();
            build(
                event,
                "tool-call",
                ItemType::ToolCall,
                &title,
                arguments,
                Some(tool),
                call_id,
            )
        }
        SubItem::WebSearchCall { query, call_id } => build(
            event,
            "tool-call",
            ItemType::ToolCall,
            "web_search",
            query,
            Some("web_search".to_string()),
            call_id,
        ),
        SubItem::FunctionCallOutput { output, call_id }
        | SubItem::CustomToolCallOutput { output, call_id }
        | SubItem::WebSearchCallOutput { output, call_id } => build(
            event,
            "tool-result",
            ItemType::ToolResult,
            "Output",
            output,
            None,
            call_id,
        ),
        SubItem::EnteredReviewMode => build(
            event,
            "review",
            ItemType::Status,
            "Review",
            Some("entered review mode".to_string()),
            None,
            None,
        ),
        SubItem::ExitedReviewMode => build(
            event,
            "review",
            ItemType::Status,
            "Review",
            Some("exited review mode".to_string()),
            None,
            None,
        ),
        SubItem::Unknown => None,
    }
}

/// Construct an item, suppressing it when the derived text is empty.
fn build(
    event: &RawEvent,
    suffix: &str,
    item_type: ItemType,
    title: &str,
    text: Option<String>,
    tool_name: Option<String>,
    call_id: Option<String>,
) -> Option<TimelineItem> {
    let text = text.filter(|t| !t.trim().is_empty())?;

    Some(TimelineItem {
        id: format!("{}-{}", event.seq, suffix),
        ts: event.server_ts.clone(),
        turn_id: event.turn_id.clone(),
        item_type,
        title: title.to_string(),
        text: Some(text),
        raw_type: event.name.clone(),
        tool_name,
        call_id,
    })
}

/// Deserialize the payload of a recognized event, mapping serde failures to
/// [`Error::Payload`].
fn parse_payload<'a, T: Deserialize<'a>>(event: &'a RawEvent) -> Result<T> {
    T::deserialize(&event.payload).map_err(|e| Error::payload(&event.name, e.to_string()))
}

/// Middle segment of a dotted item event name (`item/<tool>/outputDelta`).
fn tool_name_from_event(name: &str) -> &str {
    name.split('/').nth(1).unwrap_or("tool")
}
