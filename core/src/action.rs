//! The action boundary: one function contract, `act`.

use async_trait::async_trait;

use crate::error::AgentError;

/// `act(actionName, parameterJson) -> result`. The returned string is opaque to the
/// core — echoed back into state and used only by future reasoning.
#[async_trait]
pub trait ActFn: Send + Sync {
    async fn act(&self, action_name: &str, parameter: &str) -> Result<String, AgentError>;
}
