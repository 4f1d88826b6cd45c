//! The Refine runner: fills in one action's parameter by asking the model to produce
//! arguments matching the action's schema.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::{EffectRunner, RunnerContext};
use crate::error::AgentError;
use crate::llm::ThinkFn;
use crate::signal::Signal;
use crate::AgentState;

pub struct RefineRunner {
    action_id: String,
    think: Arc<dyn ThinkFn>,
}

impl RefineRunner {
    pub fn new(action_id: impl Into<String>, think: Arc<dyn ThinkFn>) -> Self {
        Self {
            action_id: action_id.into(),
            think,
        }
    }

    /// `think`'s result is either `{"parameters": ...}` or is itself the parameter
    /// object — the `parameters` field wins if present.
    fn normalize(raw: &str) -> String {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(mut obj)) => match obj.remove("parameters") {
                Some(parameters) => parameters.to_string(),
                None => Value::Object(obj).to_string(),
            },
            _ => raw.to_string(),
        }
    }
}

#[async_trait]
impl EffectRunner for RefineRunner {
    async fn run(&self, snapshot: AgentState, ctx: RunnerContext) -> Result<(), AgentError> {
        let Some(action) = snapshot.actions.get(&self.action_id) else {
            warn!(action_id = %self.action_id, "refine runner: action missing from snapshot");
            return Ok(());
        };
        let Some(definition) = snapshot.action_definitions.get(&action.request.action_name) else {
            warn!(action_id = %self.action_id, "refine runner: action definition missing");
            return Ok(());
        };

        let prompt = format!(
            "Produce parameters for action \"{}\" (intent: \"{}\"). The output must satisfy the given schema.",
            definition.name, action.request.intention
        );
        let schema = definition.parameter_schema.clone();

        if ctx.is_cancelled() {
            return Ok(());
        }

        let raw = self
            .think
            .think(&|_| prompt.clone(), &snapshot.history_messages, &schema)
            .await?;

        if ctx.is_cancelled() {
            return Ok(());
        }

        let parameter = Self::normalize(&raw);
        ctx.dispatch(Signal::ActionRequestRefined {
            action_id: self.action_id.clone(),
            parameter,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use crate::state::{Action, ActionDefinition, HistoryMessage};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    struct StubThink(&'static str);

    #[async_trait]
    impl ThinkFn for StubThink {
        async fn think(
            &self,
            _get_system_prompt: &(dyn Fn(&str) -> String + Send + Sync),
            _window: &[HistoryMessage],
            _output_schema: &Value,
        ) -> Result<String, AgentError> {
            Ok(self.0.to_string())
        }
    }

    fn snapshot_with_action() -> AgentState {
        let mut state = AgentState::new("p", vec![]);
        state.action_definitions.insert(
            "search".into(),
            ActionDefinition {
                name: "search".into(),
                description: "".into(),
                parameter_schema: serde_json::json!({"type": "object"}),
            },
        );
        state
            .actions
            .insert("a1".into(), Action::new("a1", "search", "find weather", 10));
        state
    }

    /// **Scenario**: a `{"parameters": ...}` wrapper unwraps to just the inner object.
    #[tokio::test]
    async fn wrapped_parameters_field_wins() {
        let snapshot = snapshot_with_action();
        let think = Arc::new(StubThink(r#"{"parameters":{"query":"Tokyo weather"}}"#));
        let runner = RefineRunner::new("a1", think);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunnerContext::new(tx, CancellationToken::new());
        runner.run(snapshot, ctx).await.unwrap();

        match rx.try_recv().unwrap() {
            Signal::ActionRequestRefined { action_id, parameter } => {
                assert_eq!(action_id, "a1");
                assert_eq!(parameter, r#"{"query":"Tokyo weather"}"#);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    /// **Scenario**: a bare object with no `parameters` field is treated as the
    /// parameters themselves.
    #[tokio::test]
    async fn bare_object_is_treated_as_parameters() {
        let snapshot = snapshot_with_action();
        let think = Arc::new(StubThink(r#"{"query":"Tokyo weather"}"#));
        let runner = RefineRunner::new("a1", think);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunnerContext::new(tx, CancellationToken::new());
        runner.run(snapshot, ctx).await.unwrap();

        match rx.try_recv().unwrap() {
            Signal::ActionRequestRefined { parameter, .. } => {
                assert_eq!(parameter, r#"{"query":"Tokyo weather"}"#);
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    /// **Scenario**: a missing action in the snapshot (raced with cancellation) dispatches
    /// nothing.
    #[tokio::test]
    async fn missing_action_dispatches_nothing() {
        let snapshot = AgentState::new("p", vec![]);
        let think = Arc::new(StubThink(r#"{"query":"x"}"#));
        let runner = RefineRunner::new("ghost", think);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunnerContext::new(tx, CancellationToken::new());
        runner.run(snapshot, ctx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
