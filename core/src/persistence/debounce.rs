//! Debounced, serialized commit scheduling: single slot, latest-wins.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use super::PersistenceAdapter;
use crate::AgentState;

/// Watches a stream of state updates and commits at most the most recent one, no more
/// often than `delay` apart. A state that arrives while one is already queued replaces
/// it rather than queuing a second commit.
pub struct Debouncer {
    tx: watch::Sender<Option<AgentState>>,
    task: JoinHandle<()>,
}

impl Debouncer {
    pub fn new(adapter: Arc<dyn PersistenceAdapter>, delay: Duration) -> Self {
        let (tx, mut rx) = watch::channel(None::<AgentState>);
        let task = tokio::spawn(async move {
            loop {
                if rx.changed().await.is_err() {
                    return;
                }
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => break,
                        changed = rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                        }
                    }
                }
                let latest = rx.borrow_and_update().clone();
                if let Some(state) = latest {
                    if let Err(error) = adapter.commit(&state).await {
                        warn!(%error, "debounced commit failed");
                    }
                }
            }
        });
        Self { tx, task }
    }

    /// Enqueues `state` for the next commit, superseding any state queued but not yet
    /// committed.
    pub fn enqueue(&self, state: AgentState) {
        let _ = self.tx.send(Some(state));
    }

    /// Cancels the debounce loop and waits for any commit in flight to finish. Does not
    /// itself flush a pending state — callers should commit the final state directly
    /// before calling this, per the "always flush on close" contract.
    pub async fn shutdown(self) {
        drop(self.tx);
        let _ = self.task.await;
    }
}
