//! The agent's state: one value, all mutation by replacement.
//!
//! [`AgentState`] is the content-addressed snapshot that flows through
//! [`crate::transition::transition`]. All maps use [`BTreeMap`] rather than a hasher-based
//! map so that `serde_json::to_vec` of a state is byte-identical across processes for the
//! same logical content — required for the content-addressed persistence adapter and for
//! deterministic round-tripping.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

mod action;
mod history;
mod reply;

pub use action::{Action, ActionDefinition, ActionRequest, ActionResponse};
pub use history::{HistoryMessage, Role};
pub use reply::ReplyContext;

/// The full state bundle: system prompt, known action definitions, in-flight and
/// completed actions, conversation history, the reaction watermark, and replies.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub system_prompt: String,
    pub action_definitions: BTreeMap<String, ActionDefinition>,
    pub actions: BTreeMap<String, Action>,
    pub history_messages: Vec<HistoryMessage>,
    pub last_reaction_timestamp: i64,
    pub replies: BTreeMap<String, ReplyContext>,
}

impl AgentState {
    /// A fresh state for a newly opened agent: no history, no actions, watermark at zero.
    pub fn new(system_prompt: impl Into<String>, action_definitions: Vec<ActionDefinition>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            action_definitions: action_definitions
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
            actions: BTreeMap::new(),
            history_messages: Vec::new(),
            last_reaction_timestamp: 0,
            replies: BTreeMap::new(),
        }
    }

    /// The timestamp of the last history message, or `0` if history is empty.
    ///
    /// Used by the transition to reject out-of-order appends.
    pub fn last_history_timestamp(&self) -> i64 {
        self.history_messages
            .last()
            .map(|m| m.timestamp)
            .unwrap_or(0)
    }

    /// Checks cross-field invariants: strictly increasing history timestamps, replies
    /// disjoint from history, and every reply's related actions present in `actions`.
    /// Intended for tests and debug assertions, not the hot path.
    #[cfg(any(test, debug_assertions))]
    pub fn check_invariants(&self) -> Result<(), String> {
        for pair in self.history_messages.windows(2) {
            if pair[0].timestamp >= pair[1].timestamp {
                return Err(format!(
                    "history_messages not strictly sorted at timestamps {} >= {}",
                    pair[0].timestamp, pair[1].timestamp
                ));
            }
        }
        for message_id in self.replies.keys() {
            if self.history_messages.iter().any(|m| &m.id == message_id) {
                return Err(format!(
                    "reply {message_id} also present in history_messages"
                ));
            }
        }
        for reply in self.replies.values() {
            for action_id in &reply.related_action_ids {
                if !self.actions.contains_key(action_id) {
                    return Err(format!(
                        "reply {} references missing action {}",
                        reply.message_id, action_id
                    ));
                }
            }
        }
        Ok(())
    }
}
