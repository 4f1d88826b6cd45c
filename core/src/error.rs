//! Crate-wide error type.
//!
//! `AgentError` is returned by every fallible contract the core depends on — `think`,
//! `speak`, `act`, persistence, and `open`. Runners surface these as `effect-failed`
//! notifications (see [`crate::scheduler`]) rather than propagating them to the caller;
//! only configuration and persistence-initialization failures at `open` reach the caller
//! directly.

use thiserror::Error;

/// Error returned by the core's external contracts and public API.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("llm think call failed: {0}")]
    Think(String),

    #[error("llm speak call failed: {0}")]
    Speak(String),

    #[error("action call failed: {0}")]
    Act(String),

    #[error("persistence: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("schema validation failed for {context}: {reason}")]
    SchemaValidation { context: String, reason: String },

    #[error("missing action definition: {0}")]
    MissingActionDefinition(String),

    #[error("missing reply context: {0}")]
    MissingReplyContext(String),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
