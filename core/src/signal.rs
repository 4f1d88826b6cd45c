//! Signals: the only way state changes. Observations fed into [`crate::transition::transition`].

use serde::{Deserialize, Serialize};

/// A new action to create as part of an `adjust-actions` decision. The ID is minted by
/// the Reaction runner before the decision is emitted — transition never mints IDs.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct NewActionSpec {
    pub action_id: String,
    pub action_name: String,
    pub initial_intent: String,
}

/// The outcome of one Reaction cycle.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ReactionDecision {
    ReplyToUser {
        message_id: String,
        last_history_message_id: String,
        related_action_ids: Vec<String>,
    },
    AdjustActions {
        cancel_action_ids: Vec<String>,
        new_actions: Vec<NewActionSpec>,
    },
    Noop,
}

/// One observation fed into the transition. Total over this set: every variant below is
/// handled, and only these.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Signal {
    UserMessageReceived {
        message_id: String,
        content: String,
        timestamp: i64,
    },
    AssistantChunkReceived {
        message_id: String,
        chunk: String,
        timestamp: i64,
    },
    AssistantMessageComplete {
        message_id: String,
        timestamp: i64,
    },
    ActionRequestRefined {
        action_id: String,
        parameter: String,
    },
    ActionCompleted {
        action_id: String,
        result: String,
        timestamp: i64,
    },
    ActionCancelledByUser {
        action_id: String,
        timestamp: i64,
    },
    ReactionComplete {
        decision: ReactionDecision,
        timestamp: i64,
    },
}
