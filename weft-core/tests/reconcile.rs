//! Integration tests for the reconciliation pipeline
//!
//! These drive raw gateway events (in wire shape) through `ThreadState` and
//! assert on the derived timeline and turn views, the same path the
//! connection manager exercises at runtime.

use serde_json::json;
use weft_core::client::ThreadSnapshot;
use weft_core::types::{ItemType, RawEvent, TurnStatus};
use weft_core::{Applied, ThreadState};

/// Build a RawEvent from wire-shaped JSON.
fn wire_event(value: serde_json::Value) -> RawEvent {
    serde_json::from_value(value).expect("event should deserialize")
}

fn state() -> ThreadState {
    ThreadState::new("th-1", 4096)
}

// ============================================
// Streamed turn lifecycle
// ============================================

#[test]
fn test_streamed_turn_reconciles_to_final_text() {
    let mut state = state();

    let events = [
        json!({"seq": 1, "serverTs": "2026-08-01T10:00:00Z", "threadId": "th-1",
               "turnId": "turn-1", "kind": "turn", "name": "turn/started", "payload": {}}),
        json!({"seq": 2, "serverTs": "2026-08-01T10:00:01Z", "threadId": "th-1",
               "turnId": "turn-1", "kind": "item", "name": "item/agentMessage/delta",
               "payload": {"delta": "Hel"}}),
        json!({"seq": 3, "serverTs": "2026-08-01T10:00:02Z", "threadId": "th-1",
               "turnId": "turn-1", "kind": "item", "name": "item/agentMessage/delta",
               "payload": {"delta": "lo"}}),
        json!({"seq": 4, "serverTs": "2026-08-01T10:00:03Z", "threadId": "th-1",
               "turnId": "turn-1", "kind": "item", "name": "item/completed",
               "payload": {"item": {"type": "agentMessage", "text": "Hello world"}}}),
        json!({"seq": 5, "serverTs": "2026-08-01T10:00:04Z", "threadId": "th-1",
               "turnId": "turn-1", "kind": "turn", "name": "turn/completed",
               "payload": {"status": "completed"}}),
    ];

    for event in events {
        state.apply(&wire_event(event));
    }

    let turns = state.turns();
    assert_eq!(turns.len(), 1);

    let turn = &turns[0];
    assert_eq!(turn.turn_id, "turn-1");
    assert_eq!(turn.status, TurnStatus::Completed);
    assert!(!turn.is_streaming);
    // Final text contains the delta accumulation "Hello" and is longer: it wins
    assert_eq!(turn.assistant_text.as_deref(), Some("Hello world"));
}

#[test]
fn test_mid_stream_turn_is_streaming() {
    let mut state = state();

    state.apply(&wire_event(json!({
        "seq": 1, "serverTs": "2026-08-01T10:00:00Z", "threadId": "th-1",
        "turnId": "turn-1", "kind": "item", "name": "item/agentMessage/delta",
        "payload": {"delta": "thinking about it"}
    })));

    let turns = state.turns();
    assert_eq!(turns[0].status, TurnStatus::InProgress);
    assert!(turns[0].is_streaming);
}

#[test]
fn test_failed_turn_status_from_completion_text() {
    let mut state = state();

    state.apply(&wire_event(json!({
        "seq": 1, "serverTs": "2026-08-01T10:00:00Z", "threadId": "th-1",
        "turnId": "turn-1", "kind": "item", "name": "item/completed",
        "payload": {"item": {"type": "userMessage", "text": "do it"}}
    })));
    state.apply(&wire_event(json!({
        "seq": 2, "serverTs": "2026-08-01T10:00:01Z", "threadId": "th-1",
        "turnId": "turn-1", "kind": "turn", "name": "turn/completed",
        "payload": {"status": "failed: model overloaded"}
    })));

    assert_eq!(state.turns()[0].status, TurnStatus::Failed);
}

// ============================================
// Tool activity
// ============================================

#[test]
fn test_identical_tool_calls_collapse_across_call_ids() {
    let mut state = state();

    for (seq, call_id) in [(1, "call-1"), (2, "call-2")] {
        state.apply(&wire_event(json!({
            "seq": seq, "serverTs": format!("2026-08-01T10:00:0{}Z", seq),
            "threadId": "th-1", "turnId": "turn-1", "kind": "item",
            "name": "item/completed",
            "payload": {"item": {"type": "function_call", "name": "shell_command",
                         "arguments": "{\"cmd\": \"cargo test\"}", "callId": call_id}}
        })));
    }

    let turns = state.turns();
    assert_eq!(turns[0].tool_calls.len(), 1);
    assert_eq!(turns[0].tool_calls[0].tool_name, "shell_command");
}

#[test]
fn test_command_output_deltas_recorded_in_order() {
    let mut state = state();

    for (seq, line) in [(1, "compiling...\n"), (2, "test result: ok\n")] {
        state.apply(&wire_event(json!({
            "seq": seq, "serverTs": format!("2026-08-01T10:00:0{}Z", seq),
            "threadId": "th-1", "turnId": "turn-1", "kind": "item",
            "name": "item/commandExecution/outputDelta",
            "payload": {"output": line, "callId": "call-1"}
        })));
    }

    let turns = state.turns();
    assert_eq!(
        turns[0].tool_results,
        vec!["compiling...\n".to_string(), "test result: ok\n".to_string()]
    );
}

// ============================================
// Approvals through the full feed
// ============================================

#[test]
fn test_approval_lifecycle_through_event_feed() {
    let mut state = state();

    state.apply(&wire_event(json!({
        "seq": 1, "serverTs": "2026-08-01T10:00:00Z", "threadId": "th-1",
        "turnId": "turn-1", "kind": "approval", "name": "approval/requested",
        "payload": {"approvalId": "ap-1", "command": "git push --force"}
    })));
    assert!(state.approvals().get("ap-1").is_some());

    let decision = wire_event(json!({
        "seq": 2, "serverTs": "2026-08-01T10:00:01Z", "threadId": "th-1",
        "turnId": "turn-1", "kind": "approval", "name": "approval/decision",
        "payload": {"approvalId": "ap-1", "decision": "approve"}
    }));
    assert_eq!(state.apply(&decision), Applied::Registry);
    assert!(state.approvals().is_empty());

    // A second decision for the same id is replayed with a fresh seq;
    // removal of the absent key is a no-op, not an error.
    let replay = wire_event(json!({
        "seq": 3, "serverTs": "2026-08-01T10:00:02Z", "threadId": "th-1",
        "turnId": "turn-1", "kind": "approval", "name": "approval/decision",
        "payload": {"approvalId": "ap-1", "decision": "approve"}
    }));
    assert_eq!(state.apply(&replay), Applied::Skipped);
    assert!(state.approvals().is_empty());
}

// ============================================
// Snapshot + live merge
// ============================================

#[test]
fn test_snapshot_seeds_registries_and_timeline() {
    let mut state = state();

    let snapshot: ThreadSnapshot = serde_json::from_value(json!({
        "items": [
            {"id": "snap-1", "ts": "2026-08-01T09:59:00Z", "turnId": "turn-0",
             "type": "userMessage", "title": "You", "text": "earlier prompt",
             "rawType": "item/completed"},
            {"id": "snap-2", "ts": "2026-08-01T09:59:05Z", "turnId": "turn-0",
             "type": "assistantMessage", "title": "Assistant", "text": "earlier answer",
             "rawType": "item/completed"}
        ],
        "pendingApprovals": [
            {"id": "ap-9", "receivedAt": "2026-08-01T09:59:10Z", "payload": {}}
        ],
        "pendingInteractions": []
    }))
    .unwrap();

    state.seed(snapshot);

    assert_eq!(state.approvals().len(), 1);
    assert_eq!(state.timeline().len(), 2);

    // Live event for a newer turn merges after the snapshot items
    state.apply(&wire_event(json!({
        "seq": 10, "serverTs": "2026-08-01T10:00:00Z", "threadId": "th-1",
        "turnId": "turn-1", "kind": "item", "name": "item/completed",
        "payload": {"item": {"type": "userMessage", "text": "new prompt"}}
    })));

    let timeline = state.timeline();
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[0].id, "snap-1");
    assert_eq!(timeline[2].item_type, ItemType::UserMessage);

    let turns = state.turns();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].turn_id, "turn-0");
    assert_eq!(turns[1].turn_id, "turn-1");
}

#[test]
fn test_redelivered_live_events_do_not_duplicate() {
    let mut state = state();

    let event = wire_event(json!({
        "seq": 1, "serverTs": "2026-08-01T10:00:00Z", "threadId": "th-1",
        "turnId": "turn-1", "kind": "item", "name": "item/completed",
        "payload": {"item": {"type": "agentMessage", "text": "once"}}
    }));

    assert!(matches!(state.apply(&event), Applied::Item(_)));
    assert_eq!(state.apply(&event), Applied::Duplicate);
    assert_eq!(state.timeline().len(), 1);

    // Deriving views twice yields identical output
    assert_eq!(state.timeline(), state.timeline());
}
