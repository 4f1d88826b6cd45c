//! The Reply runner: streams one assistant message and folds its chunks into history.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;

use super::{EffectRunner, RunnerContext};
use crate::error::AgentError;
use crate::llm::{SpeakFn, SupplementalAction};
use crate::signal::Signal;
use crate::state::ActionResponse;
use crate::time::now_millis;
use crate::AgentState;

pub struct ReplyRunner {
    message_id: String,
    speak: Arc<dyn SpeakFn>,
}

impl ReplyRunner {
    pub fn new(message_id: impl Into<String>, speak: Arc<dyn SpeakFn>) -> Self {
        Self {
            message_id: message_id.into(),
            speak,
        }
    }
}

#[async_trait]
impl EffectRunner for ReplyRunner {
    async fn run(&self, snapshot: AgentState, ctx: RunnerContext) -> Result<(), AgentError> {
        let Some(reply) = snapshot.replies.get(&self.message_id) else {
            return Err(AgentError::MissingReplyContext(self.message_id.clone()));
        };

        let history_slice: Vec<_> = snapshot
            .history_messages
            .iter()
            .filter(|m| m.timestamp <= reply.timestamp)
            .cloned()
            .collect();

        let supplemental_actions: Vec<SupplementalAction> = reply
            .related_action_ids
            .iter()
            .filter_map(|id| snapshot.actions.get(id))
            .filter_map(|action| match &action.response {
                Some(ActionResponse::Completed { result, .. }) => Some(SupplementalAction {
                    action_id: action.id.clone(),
                    action_name: action.request.action_name.clone(),
                    intention: action.request.intention.clone(),
                    result: result.clone(),
                }),
                _ => None,
            })
            .collect();

        let already_sent = reply.content();

        if ctx.is_cancelled() {
            return Ok(());
        }

        let mut stream = self
            .speak
            .speak(&snapshot.system_prompt, &history_slice, &supplemental_actions, &already_sent)
            .await?;

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    return Ok(());
                }
                next = stream.next() => {
                    match next {
                        Some(Ok(chunk)) => {
                            ctx.dispatch(Signal::AssistantChunkReceived {
                                message_id: self.message_id.clone(),
                                chunk,
                                timestamp: now_millis(),
                            });
                        }
                        Some(Err(error)) => {
                            return Err(error);
                        }
                        None => {
                            ctx.dispatch(Signal::AssistantMessageComplete {
                                message_id: self.message_id.clone(),
                                timestamp: now_millis(),
                            });
                            return Ok(());
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockSpeak;
    use crate::state::{HistoryMessage, ReplyContext, Role};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn snapshot_with_reply() -> AgentState {
        let mut state = AgentState::new("be helpful", vec![]);
        state.history_messages.push(HistoryMessage {
            id: "u1".into(),
            role: Role::User,
            content: "hi".into(),
            timestamp: 1000,
        });
        state
            .replies
            .insert("m1".into(), ReplyContext::new("m1", 1100, vec![]));
        state
    }

    /// **Scenario**: chunks are dispatched in stream order, followed by one completion
    /// signal — stream fidelity under normal termination.
    #[tokio::test]
    async fn dispatches_chunks_in_order_then_completes() {
        let snapshot = snapshot_with_reply();
        let speak = Arc::new(MockSpeak::new(vec!["he", "llo"]));
        let runner = ReplyRunner::new("m1", speak);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunnerContext::new(tx, CancellationToken::new());
        runner.run(snapshot, ctx).await.unwrap();

        let mut chunks = Vec::new();
        while let Ok(signal) = rx.try_recv() {
            match signal {
                Signal::AssistantChunkReceived { chunk, .. } => chunks.push(chunk),
                Signal::AssistantMessageComplete { .. } => break,
                other => panic!("unexpected signal: {other:?}"),
            }
        }
        assert_eq!(chunks, vec!["he".to_string(), "llo".to_string()]);
    }

    /// **Scenario**: a missing ReplyContext fails the effect rather than silently no-oping —
    /// unlike ActRequest/Refine's stale-snapshot race, a Reply with no context to stream is a
    /// contract violation.
    #[tokio::test]
    async fn missing_reply_context_fails_the_effect() {
        let snapshot = AgentState::new("p", vec![]);
        let speak = Arc::new(MockSpeak::new(vec!["x"]));
        let runner = ReplyRunner::new("ghost", speak);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = RunnerContext::new(tx, CancellationToken::new());
        let result = runner.run(snapshot, ctx).await;
        assert!(matches!(result, Err(AgentError::MissingReplyContext(ref id)) if id == "ghost"));
        assert!(rx.try_recv().is_err());
    }

    /// **Scenario**: cancellation before the first suspension point yields no dispatched
    /// signals at all.
    #[tokio::test]
    async fn cancellation_before_first_suspension_dispatches_nothing() {
        let snapshot = snapshot_with_reply();
        let speak = Arc::new(MockSpeak::new(vec!["he", "llo"]));
        let runner = ReplyRunner::new("m1", speak);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = RunnerContext::new(tx, cancel);
        runner.run(snapshot, ctx).await.unwrap();
        assert!(rx.try_recv().is_err());
    }
}
