//! Thread watching
//!
//! Composes the pieces a consumer needs for one conversation view: the
//! one-time REST snapshot, the reconciliation state it seeds, and the live
//! subscription that keeps the state current.
//!
//! Switching threads is expressed by dropping the watch future and starting
//! a new one. An in-flight snapshot response, a pending reconnect sleep, and
//! the open transport all live inside that future, so the drop discards them
//! together and a stale snapshot can never clobber the newer thread's state.

use tokio::sync::watch;

use crate::client::ControlPlaneClient;
use crate::config::Config;
use crate::error::Result;
use crate::reconcile::ThreadState;
use crate::stream::{SseTransport, StreamManager, StreamUpdate};

/// Watches threads against one control-plane server.
pub struct ThreadWatcher {
    client: ControlPlaneClient,
    transport: SseTransport,
    config: Config,
}

impl ThreadWatcher {
    /// Build a watcher from configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let client = ControlPlaneClient::new(&config.server)?;
        let transport = SseTransport::new(&config.server)?;
        Ok(Self {
            client,
            transport,
            config,
        })
    }

    /// The REST client, for outbound actions.
    pub fn client(&self) -> &ControlPlaneClient {
        &self.client
    }

    /// Fetch a one-shot reconciled view of a thread without subscribing.
    pub async fn snapshot(&self, thread_id: &str) -> Result<ThreadState> {
        let snapshot = self.client.fetch_snapshot(thread_id).await?;
        let mut state = ThreadState::new(thread_id, self.config.stream.live_buffer_cap);
        state.seed(snapshot);
        Ok(state)
    }

    /// Watch a thread until the shutdown channel fires, returning the final
    /// reconciliation state.
    ///
    /// The snapshot fetch is fatal on failure (no retry; the operator
    /// re-opens the thread); everything after it is supervised by the
    /// connection manager and survives transport failures.
    pub async fn watch<F>(
        &self,
        thread_id: &str,
        shutdown: watch::Receiver<bool>,
        on_update: F,
    ) -> Result<ThreadState>
    where
        F: FnMut(&ThreadState, StreamUpdate),
    {
        let state = self.snapshot(thread_id).await?;
        let mut manager =
            StreamManager::new(self.transport.clone(), self.config.stream.clone(), state);
        manager.run(shutdown, on_update).await?;
        Ok(manager.into_state())
    }
}
