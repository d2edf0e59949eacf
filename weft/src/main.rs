//! weft - converse with a long-running coding assistant from the terminal
//!
//! Connects to a control-plane server, reconciles the REST snapshot of a
//! conversation with the live event stream, and prints the resulting
//! per-turn activity as it happens.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Config: $XDG_CONFIG_HOME/weft/config.toml (~/.config/weft/config.toml)
//! - Logs: $XDG_STATE_HOME/weft/weft.log (~/.local/state/weft/weft.log)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;

use weft_core::types::{ConversationTurn, TimelineItem};
use weft_core::{ApprovalDecision, Config, StreamUpdate, ThreadState, ThreadWatcher};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Converse with a long-running coding assistant")]
#[command(version)]
struct Cli {
    /// Path to a config file (defaults to the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Follow a thread live: snapshot, then streamed updates until Ctrl+C
    Watch {
        /// Thread to follow
        thread_id: String,
    },
    /// Print a one-shot reconciled view of a thread
    Snapshot {
        /// Thread to fetch
        thread_id: String,

        /// Emit turns as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Decide a pending approval
    Approve {
        /// Approval to decide
        approval_id: String,

        /// Deny instead of approving
        #[arg(long)]
        deny: bool,
    },
    /// Answer a pending interaction
    Reply {
        /// Interaction to answer
        interaction_id: String,

        /// Answer text
        answer: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Ensure XDG environment variables are set before using core library
    Config::ensure_xdg_env();

    // Load configuration
    let config = match &cli.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };

    // Initialize logging
    let _log_guard =
        weft_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!(server = %config.server.base_url, "weft starting");

    let watcher = ThreadWatcher::new(config).context("failed to create thread watcher")?;

    match cli.command {
        Command::Watch { thread_id } => run_watch(&watcher, &thread_id).await,
        Command::Snapshot { thread_id, json } => run_snapshot(&watcher, &thread_id, json).await,
        Command::Approve { approval_id, deny } => {
            let decision = if deny {
                ApprovalDecision::Deny
            } else {
                ApprovalDecision::Approve
            };
            watcher
                .client()
                .submit_approval(&approval_id, decision)
                .await
                .context("failed to submit approval decision")?;
            // Membership changes arrive via the event feed, not this response
            println!("Decision '{}' submitted for {}", decision.as_str(), approval_id);
            Ok(())
        }
        Command::Reply {
            interaction_id,
            answer,
        } => {
            watcher
                .client()
                .submit_interaction_reply(&interaction_id, &answer)
                .await
                .context("failed to submit interaction reply")?;
            println!("Reply submitted for {}", interaction_id);
            Ok(())
        }
    }
}

/// Follow a thread until Ctrl+C, printing activity as it arrives.
async fn run_watch(watcher: &ThreadWatcher, thread_id: &str) -> Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nShutting down...");
            let _ = shutdown_tx.send(true);
        }
    });

    println!("Watching thread {}. Press Ctrl+C to stop.", thread_id);
    println!();

    let state = watcher
        .watch(thread_id, shutdown_rx, on_update)
        .await
        .with_context(|| format!("failed to watch thread {}", thread_id))?;

    println!();
    print_summary(&state);

    tracing::info!(thread_id = %thread_id, cursor = ?state.cursor(), "weft watch stopped");

    Ok(())
}

/// Print one stream update as a timestamped line.
fn on_update(state: &ThreadState, update: StreamUpdate) {
    let now = chrono::Local::now().format("%H:%M:%S");
    match update {
        StreamUpdate::Connection(connection) => {
            eprintln!("[{}] connection: {}", now, connection);
        }
        StreamUpdate::Item(item) => {
            println!("[{}] {}: {}", now, item.title, preview(&item));
        }
        StreamUpdate::Pending => {
            let approvals: Vec<&str> = state.approvals().iter().map(|a| a.id.as_str()).collect();
            let interactions: Vec<&str> =
                state.interactions().iter().map(|i| i.id.as_str()).collect();
            println!(
                "[{}] pending: {} approval(s) {:?}, {} interaction(s) {:?}",
                now,
                approvals.len(),
                approvals,
                interactions.len(),
                interactions
            );
        }
    }
}

/// Fetch and print a one-shot reconciled view.
async fn run_snapshot(watcher: &ThreadWatcher, thread_id: &str, json: bool) -> Result<()> {
    let state = watcher
        .snapshot(thread_id)
        .await
        .with_context(|| format!("failed to fetch snapshot for thread {}", thread_id))?;

    if json {
        let turns = state.turns();
        println!("{}", serde_json::to_string_pretty(&turns)?);
        return Ok(());
    }

    print_summary(&state);
    Ok(())
}

/// Print the per-turn conversation summary.
fn print_summary(state: &ThreadState) {
    let turns = state.turns();

    println!("Thread {}: {} turn(s)", state.thread_id(), turns.len());
    for turn in &turns {
        print_turn(turn);
    }

    if !state.approvals().is_empty() {
        println!("\nPending approvals:");
        for approval in state.approvals().iter() {
            println!(
                "  {}  {}",
                approval.id,
                approval.summary.as_deref().unwrap_or("")
            );
        }
    }

    if !state.interactions().is_empty() {
        println!("\nPending interactions:");
        for interaction in state.interactions().iter() {
            println!(
                "  {}  {}",
                interaction.id,
                interaction.summary.as_deref().unwrap_or("")
            );
        }
    }
}

fn print_turn(turn: &ConversationTurn) {
    let duration = turn
        .duration()
        .map(|d| format!(" ({}s)", d.num_seconds()))
        .unwrap_or_default();
    println!("\n--- {} [{}]{}", turn.turn_id, turn.status, duration);

    if let Some(text) = &turn.user_text {
        println!("  you: {}", truncate(text, 200));
    }
    if let Some(text) = &turn.thinking_text {
        println!("  thinking: {}", truncate(text, 120));
    }
    for call in &turn.tool_calls {
        println!("  tool {}: {}", call.tool_name, truncate(&call.text, 120));
    }
    if !turn.tool_results.is_empty() {
        println!("  tool output: {} chunk(s)", turn.tool_results.len());
    }
    if let Some(text) = &turn.assistant_text {
        println!("  assistant: {}", truncate(text, 400));
    }
}

/// One-line preview of a timeline item's text.
fn preview(item: &TimelineItem) -> String {
    let text = item.text.as_deref().unwrap_or("");
    truncate(&text.split_whitespace().collect::<Vec<_>>().join(" "), 100)
}

/// Truncate for display, on a char boundary.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let truncated: String = text.chars().take(max_chars).collect();
    format!("{}...", truncated)
}
