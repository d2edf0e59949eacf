//! # weft-core
//!
//! Core library for weft - a control-plane client for long-running
//! coding-assistant processes.
//!
//! This library provides:
//! - Domain types for raw events, timeline items, and conversation turns
//! - The live timeline reconciliation engine (normalize, merge, aggregate)
//! - Pending approval/interaction registries
//! - A resumable event-stream connection manager with backoff and staleness
//!   detection
//! - REST clients for the snapshot fetch and outbound operator actions
//!
//! ## Architecture
//!
//! Data flows one direction:
//!
//! ```text
//! transport → normalizer → merger → aggregator/registries → presentation
//! ```
//!
//! The connection manager is the only component with I/O side effects; the
//! normalizer, merger, and aggregator are deterministic folds over immutable
//! inputs, which is what makes them testable in isolation. The reconciled
//! model is rebuilt per session; nothing here persists.
//!
//! ## Example
//!
//! ```rust,no_run
//! use weft_core::{Config, ThreadWatcher};
//!
//! # async fn example() -> weft_core::Result<()> {
//! let config = Config::load()?;
//! let watcher = ThreadWatcher::new(config)?;
//!
//! let (_shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! watcher
//!     .watch("thread-1", shutdown_rx, |state, _update| {
//!         for turn in state.turns() {
//!             println!("{}: {}", turn.turn_id, turn.status);
//!         }
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

// Re-export commonly used items at the crate root
pub use client::{ApprovalDecision, ControlPlaneClient, ThreadSnapshot};
pub use config::Config;
pub use error::{Error, Result};
pub use normalize::normalize;
pub use reconcile::{Applied, ThreadState};
pub use stream::{EventTransport, SseTransport, StreamFrame, StreamManager, StreamUpdate};
pub use timeline::{aggregate, merge, merge_streamed_text};
pub use types::*;
pub use watch::ThreadWatcher;

// Public modules
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pending;
pub mod reconcile;
pub mod stream;
pub mod timeline;
pub mod types;
pub mod watch;
