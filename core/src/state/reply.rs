//! In-flight assistant replies: a ReplyContext accumulates chunks until completion folds
//! it into one [`super::HistoryMessage`].

use serde::{Deserialize, Serialize};

/// Exists while an assistant message is being streamed. `related_action_ids` is kept
/// sorted on insertion so the canonical serialization of this struct is stable
/// regardless of the order the Reaction decision listed them in.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReplyContext {
    pub message_id: String,
    pub timestamp: i64,
    pub related_action_ids: Vec<String>,
    pub chunks: Vec<String>,
}

impl ReplyContext {
    pub fn new(message_id: impl Into<String>, timestamp: i64, mut related_action_ids: Vec<String>) -> Self {
        related_action_ids.sort();
        Self {
            message_id: message_id.into(),
            timestamp,
            related_action_ids,
            chunks: Vec::new(),
        }
    }

    /// Concatenates all chunks received so far, in arrival order.
    pub fn content(&self) -> String {
        self.chunks.concat()
    }
}
