//! Conversation history: the append-only, timestamp-sorted record of user and
//! assistant messages.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// `{ id, role, content, timestamp }`. Never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: i64,
}
