//! Timeline merge layer
//!
//! Combines the REST snapshot of a thread with normalized live events into
//! one deduplicated, ordered sequence. The merge is a pure function: callers
//! re-run it over the full accumulated live buffer whenever a fresh view is
//! needed (cheap, because the buffer is capped by the connection manager).
//!
//! Ordering is `(ts, id)` ascending. Timestamps compare lexicographically
//! (they are RFC 3339 strings from a single server clock), and the id
//! tie-break keeps same-timestamp ordering stable across re-merges.
//!
//! Deduplication is content-addressed: two items are the same fact iff they
//! agree on `(ts, turnId, type, rawType, callId, text)`. Since live item ids
//! are synthesized deterministically from the event sequence number, feeding
//! the same event twice, or an event already present in the snapshot,
//! produces no duplicate.

pub mod turns;

pub use turns::{aggregate, merge_streamed_text, ordered_turns};

use sha2::{Digest, Sha256};
use std::collections::HashSet;

use crate::types::TimelineItem;

/// Merge snapshot and live items into one deduplicated, ordered sequence.
///
/// Idempotent and order-independent with respect to redelivery: merging the
/// same inputs twice yields identical output, and the first occurrence in
/// sort order wins for duplicated content.
pub fn merge(snapshot: &[TimelineItem], live: &[TimelineItem]) -> Vec<TimelineItem> {
    let mut all: Vec<TimelineItem> = Vec::with_capacity(snapshot.len() + live.len());
    all.extend_from_slice(snapshot);
    all.extend_from_slice(live);

    all.sort_by(|a, b| a.ts.cmp(&b.ts).then_with(|| a.id.cmp(&b.id)));

    let mut seen: HashSet<String> = HashSet::with_capacity(all.len());
    all.retain(|item| seen.insert(signature(item)));
    all
}

/// Compute a content-based dedup signature for a timeline item.
///
/// Returns a 32-character hex digest of SHA-256 over the identity fields,
/// joined with a separator that cannot occur in the field values.
pub fn signature(item: &TimelineItem) -> String {
    let input = format!(
        "{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}\u{1f}{}",
        item.ts,
        item.turn_id.as_deref().unwrap_or(""),
        item.item_type.as_str(),
        item.raw_type,
        item.call_id.as_deref().unwrap_or(""),
        item.text.as_deref().unwrap_or(""),
    );

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();

    // Take first 16 bytes (32 hex chars)
    hex::encode(&result[..16])
}
