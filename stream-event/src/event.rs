//! Wire shape of one scheduler notification: `{state-updated, effect-started,
//! effect-cancelled, effect-completed, effect-failed}`.
//!
//! State itself is carried as an opaque `serde_json::Value` here; the bridge that owns
//! the concrete state type serializes it before constructing a `CoreEvent`.

use serde::Serialize;
use serde_json::Value;

/// One scheduler notification, matching the five kinds `subscribe` handlers observe.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    StateUpdated { state: Value },
    EffectStarted { key: String },
    EffectCancelled { key: String },
    EffectCompleted { key: String },
    EffectFailed { key: String, error: String },
}

impl CoreEvent {
    /// Serializes this event to a JSON object (type + payload only; no envelope).
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
