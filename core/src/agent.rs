//! The public surface of the core: `open`, `send_message`, `get_state`, `subscribe`,
//! `close`.

use std::sync::Arc;
use std::time::Duration;

use stream_event::CoreEvent;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::AgentOptions;
use crate::error::AgentError;
use crate::persistence::sqlite::SqlitePersistence;
use crate::persistence::PersistenceAdapter;
use crate::scheduler::{Scheduler, SchedulerDeps};
use crate::signal::Signal;
use crate::time::now_millis;
use crate::AgentState;

/// A running instance of the core, keyed by a stable identifier used by persistence.
pub struct Agent {
    key: String,
    scheduler: Scheduler,
}

impl Agent {
    /// Opens an agent. `key` must be a syntactically valid UUID; it identifies the
    /// persisted state across restarts. On first open with no prior `head`, a fresh
    /// state is constructed from `options.system_prompt`.
    pub async fn open(key: impl Into<String>, options: AgentOptions) -> Result<Self, AgentError> {
        let key = key.into();
        Uuid::parse_str(&key)
            .map_err(|e| AgentError::InvalidConfig(format!("key must be a valid UUID: {e}")))?;

        if let Err(error) = env_config::load_and_apply("agent-core", None) {
            tracing::warn!(%error, "failed to load ambient config, continuing with process environment");
        }

        if options.system_prompt.trim().is_empty() {
            return Err(AgentError::InvalidConfig("systemPrompt is required".into()));
        }
        if options.persistence.location.trim().is_empty() {
            return Err(AgentError::InvalidConfig("persistence.location is required".into()));
        }

        let persistence: Arc<dyn PersistenceAdapter> = Arc::new(SqlitePersistence::open(&options.persistence.location)?);

        let initial_state = match persistence.head().await? {
            Some(state) => state,
            None => AgentState::new(options.system_prompt.clone(), options.action_definitions.clone()),
        };

        let deps = SchedulerDeps {
            think: options.think,
            speak: options.speak,
            act: options.act,
            initial_history_count: options.reaction.initial_history_count,
            additional_history_count: options.reaction.additional_history_count,
        };

        let debounce_delay: Duration = options.persistence.debounce_delay;
        let scheduler = Scheduler::start(initial_state, deps, persistence, debounce_delay);

        Ok(Self { key, scheduler })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Synthesizes a `UserMessageReceived` signal with a fresh ID and the current time.
    pub fn send_message(&self, content: impl Into<String>) {
        self.scheduler.dispatch(Signal::UserMessageReceived {
            message_id: Uuid::new_v4().to_string(),
            content: content.into(),
            timestamp: now_millis(),
        });
    }

    /// The current state, as of the last applied transition.
    pub async fn get_state(&self) -> AgentState {
        self.scheduler.state().await
    }

    /// Subscribes to scheduler notifications for this agent's lifetime.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.scheduler.subscribe()
    }

    /// Cancels all running effects and flushes a final commit.
    pub async fn close(&self) {
        self.scheduler.close().await;
    }
}
