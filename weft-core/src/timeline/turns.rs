//! Turn aggregation
//!
//! Folds a merged timeline into per-turn conversation aggregates. Items
//! without a turn id are skipped; they cannot be rendered in a per-turn
//! view. Turns that produced no observable content (no text, no tool
//! activity) are excluded from the output rather than rendered empty.
//!
//! Status transitions are deliberately not monotonic: a later `turn/started`
//! reverts a terminal status, because servers are free to reuse turn ids.
//! Terminal sub-status comes from a substring match on the completion text
//! ("failed", "interrupted"), kept for compatibility with payload shapes
//! that carry only free-form status text.

use std::collections::{HashMap, HashSet};

use crate::types::{ConversationTurn, ItemType, TimelineItem, ToolCall, TurnStatus};

/// Aggregate a merged, ordered timeline into per-turn conversation models.
pub fn aggregate(items: &[TimelineItem]) -> HashMap<String, ConversationTurn> {
    let mut accumulators: HashMap<String, TurnAccumulator> = HashMap::new();

    for item in items {
        let Some(turn_id) = item.turn_id.as_deref() else {
            continue;
        };

        accumulators
            .entry(turn_id.to_string())
            .or_insert_with(|| TurnAccumulator::new(&item.ts))
            .observe(item);
    }

    accumulators
        .into_iter()
        .filter_map(|(turn_id, acc)| acc.finish(&turn_id).map(|turn| (turn_id, turn)))
        .collect()
}

/// Sort aggregated turns by start time (turn id as tie-break).
pub fn ordered_turns(turns: HashMap<String, ConversationTurn>) -> Vec<ConversationTurn> {
    let mut list: Vec<ConversationTurn> = turns.into_values().collect();
    list.sort_by(|a, b| {
        a.started_at
            .cmp(&b.started_at)
            .then_with(|| a.turn_id.cmp(&b.turn_id))
    });
    list
}

/// Reconcile a final message text with accumulated streamed deltas.
///
/// With no base the delta wins outright. When one string fully contains the
/// other the longer one wins. Genuinely divergent strings (a final that
/// arrived mid-stream in a different shape) fall back to longer-by-length,
/// favoring eventual completeness over loss.
pub fn merge_streamed_text(base: Option<&str>, delta: &str) -> String {
    match base {
        None | Some("") => delta.to_string(),
        Some(base) => {
            if base.contains(delta) {
                base.to_string()
            } else if delta.contains(base) || delta.len() > base.len() {
                delta.to_string()
            } else {
                base.to_string()
            }
        }
    }
}

/// Per-kind final texts, deduplicated case/whitespace-insensitively.
#[derive(Debug, Default)]
struct FinalTexts {
    texts: Vec<String>,
    keys: HashSet<String>,
}

impl FinalTexts {
    fn push(&mut self, text: &str) {
        if self.keys.insert(normalized_key(text)) {
            self.texts.push(text.to_string());
        }
    }

    /// Longest recorded final, first-seen wins on equal length.
    fn longest(&self) -> Option<&str> {
        self.texts
            .iter()
            .fold(None::<&String>, |best, candidate| match best {
                Some(best) if best.len() >= candidate.len() => Some(best),
                _ => Some(candidate),
            })
            .map(String::as_str)
    }
}

#[derive(Debug)]
struct TurnAccumulator {
    started_at: String,
    completed_at: String,
    status: TurnStatus,
    user: FinalTexts,
    assistant: FinalTexts,
    thinking: FinalTexts,
    assistant_delta: String,
    thinking_delta: String,
    tool_calls: Vec<ToolCall>,
    tool_call_keys: HashSet<(String, String)>,
    tool_results: Vec<String>,
    tool_result_keys: HashSet<String>,
}

impl TurnAccumulator {
    fn new(ts: &str) -> Self {
        Self {
            started_at: ts.to_string(),
            completed_at: ts.to_string(),
            status: TurnStatus::Unknown,
            user: FinalTexts::default(),
            assistant: FinalTexts::default(),
            thinking: FinalTexts::default(),
            assistant_delta: String::new(),
            thinking_delta: String::new(),
            tool_calls: Vec::new(),
            tool_call_keys: HashSet::new(),
            tool_results: Vec::new(),
            tool_result_keys: HashSet::new(),
        }
    }

    fn observe(&mut self, item: &TimelineItem) {
        if item.ts < self.started_at {
            self.started_at = item.ts.clone();
        }
        if item.ts > self.completed_at {
            self.completed_at = item.ts.clone();
        }

        match item.raw_type.as_str() {
            // Lifecycle markers override any prior status, in either
            // direction: turn ids can be reused.
            "turn/started" => {
                self.status = TurnStatus::InProgress;
                return;
            }
            "turn/completed" => {
                self.status = status_from_text(item.text.as_deref().unwrap_or(""));
                return;
            }
            _ => {}
        }

        let text = item.text.as_deref().unwrap_or("");

        match item.item_type {
            ItemType::UserMessage => self.user.push(text),
            ItemType::AssistantMessage if item.is_delta() => {
                self.assistant_delta.push_str(text);
                self.promote_streaming();
            }
            ItemType::AssistantMessage => self.assistant.push(text),
            ItemType::Reasoning if item.is_delta() => {
                self.thinking_delta.push_str(text);
                self.promote_streaming();
            }
            ItemType::Reasoning => self.thinking.push(text),
            ItemType::ToolCall => {
                let tool = item.tool_name.clone().unwrap_or_else(|| "tool".to_string());
                let key = (tool.clone(), normalized_key(text));
                if self.tool_call_keys.insert(key) {
                    self.tool_calls.push(ToolCall {
                        tool_name: tool,
                        text: text.to_string(),
                    });
                }
            }
            ItemType::ToolResult => {
                if self.tool_result_keys.insert(normalized_key(text)) {
                    self.tool_results.push(text.to_string());
                }
            }
            ItemType::Status => {}
        }
    }

    /// Streamed output on a turn that never announced itself: covers servers
    /// that do not emit an explicit start event.
    fn promote_streaming(&mut self) {
        if self.status == TurnStatus::Unknown {
            self.status = TurnStatus::InProgress;
        }
    }

    fn finish(self, turn_id: &str) -> Option<ConversationTurn> {
        let user_text = self.user.longest().map(str::to_string);
        let assistant_text = published(self.assistant.longest(), &self.assistant_delta);
        let thinking_text = published(self.thinking.longest(), &self.thinking_delta);

        let empty = user_text.is_none()
            && assistant_text.is_none()
            && thinking_text.is_none()
            && self.tool_calls.is_empty()
            && self.tool_results.is_empty();
        if empty {
            return None;
        }

        Some(ConversationTurn {
            turn_id: turn_id.to_string(),
            started_at: self.started_at,
            completed_at: self.completed_at,
            status: self.status,
            is_streaming: self.status == TurnStatus::InProgress,
            user_text,
            assistant_text,
            thinking_text,
            tool_calls: self.tool_calls,
            tool_results: self.tool_results,
        })
    }
}

/// Merge a final text with a delta accumulation into the published field.
fn published(base: Option<&str>, delta: &str) -> Option<String> {
    if delta.is_empty() {
        return base.map(str::to_string);
    }
    Some(merge_streamed_text(base, delta))
}

/// Derive terminal status from completion text.
fn status_from_text(text: &str) -> TurnStatus {
    let lowered = text.to_lowercase();
    if lowered.contains("failed") {
        TurnStatus::Failed
    } else if lowered.contains("interrupted") {
        TurnStatus::Interrupted
    } else {
        TurnStatus::Completed
    }
}

/// Case- and whitespace-insensitive dedup key.
fn normalized_key(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
