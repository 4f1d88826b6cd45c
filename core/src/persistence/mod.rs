//! Content-addressed persistence: `commit(value) -> versionHandle`, `head() -> Option<versionHandle>`.
//!
//! The adapter itself is a dumb key-value store over opaque version handles; the
//! debounce/serialize policy that decides *when* to commit lives in [`Debouncer`], which
//! the scheduler drives from its `state-updated` notifications.

mod debounce;
pub mod sqlite;

pub use debounce::Debouncer;

use async_trait::async_trait;

use crate::error::AgentError;
use crate::AgentState;

/// A content-addressed store: committing the same logical value twice returns the same
/// handle. The core never inspects the handle; it only round-trips it through `head`.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn commit(&self, state: &AgentState) -> Result<String, AgentError>;
    async fn head(&self) -> Result<Option<AgentState>, AgentError>;
}
