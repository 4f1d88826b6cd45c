//! Action definitions and dynamic action instances.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `{ name, description, parameterSchema }`. Name is unique within one agent's lifetime
/// and doubles as the map key in [`super::AgentState::action_definitions`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActionDefinition {
    pub name: String,
    pub description: String,
    pub parameter_schema: Value,
}

/// The request half of an action: who asked for it, why, and when.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ActionRequest {
    pub action_name: String,
    pub intention: String,
    pub created_at: i64,
}

/// The resolution of an action, or its absence while still pending.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResponse {
    Completed { result: String, at: i64 },
    Cancelled { at: i64 },
}

/// A dynamic action instance. `parameter` is filled in by a Refine effect; `response` is
/// filled in by an ActRequest runner completing, or by a Reaction cancelling it. Neither
/// is ever cleared once set — an action is created once and only ever resolved.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Action {
    pub id: String,
    pub request: ActionRequest,
    pub parameter: Option<String>,
    pub response: Option<ActionResponse>,
}

impl Action {
    pub fn new(id: impl Into<String>, action_name: impl Into<String>, intention: impl Into<String>, created_at: i64) -> Self {
        Self {
            id: id.into(),
            request: ActionRequest {
                action_name: action_name.into(),
                intention: intention.into(),
                created_at,
            },
            parameter: None,
            response: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.response.is_some()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.response, Some(ActionResponse::Completed { .. }))
    }
}
