//! The ActRequest runner: invokes one action's side effect with its refined parameter.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::{EffectRunner, RunnerContext};
use crate::action::ActFn;
use crate::error::AgentError;
use crate::signal::Signal;
use crate::time::now_millis;
use crate::AgentState;

pub struct ActRequestRunner {
    action_id: String,
    act: Arc<dyn ActFn>,
}

impl ActRequestRunner {
    pub fn new(action_id: impl Into<String>, act: Arc<dyn ActFn>) -> Self {
        Self {
            action_id: action_id.into(),
            act,
        }
    }
}

#[async_trait]
impl EffectRunner for ActRequestRunner {
    async fn run(&self, snapshot: AgentState, ctx: RunnerContext) -> Result<(), AgentError> {
        let Some(action) = snapshot.actions.get(&self.action_id) else {
            warn!(action_id = %self.action_id, "act request runner: action missing from snapshot");
            return Ok(());
        };
        let Some(parameter) = action.parameter.clone() else {
            warn!(action_id = %self.action_id, "act request runner: parameter missing from snapshot");
            return Ok(());
        };
        let action_name = action.request.action_name.clone();

        if ctx.is_cancelled() {
            return Ok(());
        }

        let result = self.act.act(&action_name, &parameter).await?;

        if ctx.is_cancelled() {
            return Ok(());
        }

        ctx.dispatch(Signal::ActionCompleted {
            action_id: self.action_id.clone(),
            result,
            timestamp: now_millis(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::action::mock::MockAct;
    use crate::state::Action;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    /// **Scenario**: an action with a known parameter and name dispatches
    /// `ActionCompleted` with the mock's result.
    #[tokio::test]
    async fn completes_with_act_result() {
        let mut snapshot = AgentState::new("p", vec![]);
        let mut action = Action::new("a1", "search", "find weather", 10);
        action.parameter = Some(r#"{"query":"Tokyo weather"}"#.into());
        snapshot.actions.insert("a1".into(), action);

        let mut results = BTreeMap::new();
        results.insert("search".to_string(), "22C, cloudy".to_string());
        let act = Arc::new(MockAct::new(results));

        let runner = ActRequestRunner::new("a1", act);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunnerContext::new(tx, CancellationToken::new());
        runner.run(snapshot, ctx).await.unwrap();

        match rx.try_recv().unwrap() {
            Signal::ActionCompleted { action_id, result, .. } => {
                assert_eq!(action_id, "a1");
                assert_eq!(result, "22C, cloudy");
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    /// **Scenario**: a missing parameter (raced with cancellation) dispatches nothing.
    #[tokio::test]
    async fn missing_parameter_dispatches_nothing() {
        let mut snapshot = AgentState::new("p", vec![]);
        snapshot
            .actions
            .insert("a1".into(), Action::new("a1", "search", "find weather", 10));

        let act = Arc::new(MockAct::new(BTreeMap::new()));
        let runner = ActRequestRunner::new("a1", act);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunnerContext::new(tx, CancellationToken::new());
        runner.run(snapshot, ctx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
