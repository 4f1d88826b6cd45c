//! The Reaction runner: folds every input newer than the watermark into one decision.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{EffectRunner, RunnerContext};
use crate::error::AgentError;
use crate::llm::ThinkFn;
use crate::signal::{NewActionSpec, ReactionDecision, Signal};
use crate::state::{ActionResponse, HistoryMessage, Role};
use crate::AgentState;

/// The model's answer to one Reaction iteration: either a final decision, or a request
/// for more context before deciding.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum IterationOutput {
    DecisionMade { decision: RawDecision },
    MoreHistory,
    ActionDetail { ids: Vec<String> },
}

/// A decision as returned by the model, before fresh IDs are injected. Mirrors
/// [`ReactionDecision`] but with the generated-ID fields omitted — the model never mints
/// IDs.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum RawDecision {
    ReplyToUser {
        last_history_message_id: String,
        related_action_ids: Vec<String>,
    },
    AdjustActions {
        cancel_action_ids: Vec<String>,
        new_actions: Vec<RawNewAction>,
    },
    Noop,
}

#[derive(Debug, Deserialize)]
struct RawNewAction {
    action_name: String,
    initial_intent: String,
}

pub struct ReactionRunner {
    think: Arc<dyn ThinkFn>,
    initial_history_count: usize,
    additional_history_count: usize,
}

impl ReactionRunner {
    pub fn new(think: Arc<dyn ThinkFn>, initial_history_count: usize, additional_history_count: usize) -> Self {
        Self {
            think,
            initial_history_count,
            additional_history_count,
        }
    }

    fn unresponded_user_messages<'a>(snapshot: &'a AgentState) -> Vec<&'a HistoryMessage> {
        snapshot
            .history_messages
            .iter()
            .filter(|m| matches!(m.role, Role::User) && m.timestamp > snapshot.last_reaction_timestamp)
            .collect()
    }

    fn unresponded_action_timestamps(snapshot: &AgentState) -> Vec<(String, i64)> {
        snapshot
            .actions
            .values()
            .filter_map(|a| match &a.response {
                Some(ActionResponse::Completed { at, .. }) | Some(ActionResponse::Cancelled { at }) => {
                    Some((a.id.clone(), *at))
                }
                None => None,
            })
            .filter(|(_, at)| *at > snapshot.last_reaction_timestamp)
            .collect()
    }

    fn window(snapshot: &AgentState, history_count: usize) -> Vec<HistoryMessage> {
        let watermark = snapshot.last_reaction_timestamp;
        let older: Vec<&HistoryMessage> = snapshot
            .history_messages
            .iter()
            .filter(|m| m.timestamp <= watermark)
            .collect();
        let newer: Vec<&HistoryMessage> = snapshot
            .history_messages
            .iter()
            .filter(|m| m.timestamp > watermark)
            .collect();

        let skip = older.len().saturating_sub(history_count);
        older[skip..]
            .iter()
            .chain(newer.iter())
            .map(|&m| m.clone())
            .collect()
    }

    fn system_prompt(snapshot: &AgentState, loaded_action_detail_ids: &[String], more_history_available: bool) -> String {
        let catalogue: Vec<Value> = snapshot
            .action_definitions
            .values()
            .map(|d| json!({"name": d.name, "description": d.description, "parameterSchema": d.parameter_schema}))
            .collect();

        let actions_table: Vec<Value> = snapshot
            .actions
            .values()
            .map(|a| {
                let status = match &a.response {
                    None => "pending",
                    Some(ActionResponse::Completed { .. }) => "completed",
                    Some(ActionResponse::Cancelled { .. }) => "cancelled",
                };
                let mut entry = json!({
                    "id": a.id,
                    "name": a.request.action_name,
                    "intention": a.request.intention,
                    "status": status,
                });
                if loaded_action_detail_ids.iter().any(|id| id == &a.id) {
                    entry["request"] = json!(a.request);
                    entry["response"] = json!(a.response);
                }
                entry
            })
            .collect();

        json!({
            "systemPrompt": snapshot.system_prompt,
            "actionDefinitions": catalogue,
            "actions": actions_table,
            "moreHistoryAvailable": more_history_available,
        })
        .to_string()
    }

    fn output_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "kind": {"enum": ["decision-made", "more-history", "action-detail"]},
            },
            "required": ["kind"],
        })
    }

    fn inject_fresh_ids(raw: RawDecision, timestamp: i64) -> ReactionDecision {
        match raw {
            RawDecision::ReplyToUser {
                last_history_message_id,
                related_action_ids,
            } => ReactionDecision::ReplyToUser {
                message_id: Uuid::new_v4().to_string(),
                last_history_message_id,
                related_action_ids,
            },
            RawDecision::AdjustActions {
                cancel_action_ids,
                new_actions,
            } => ReactionDecision::AdjustActions {
                cancel_action_ids,
                new_actions: new_actions
                    .into_iter()
                    .map(|n| NewActionSpec {
                        action_id: Uuid::new_v4().to_string(),
                        action_name: n.action_name,
                        initial_intent: n.initial_intent,
                    })
                    .collect(),
            },
            RawDecision::Noop => {
                let _ = timestamp;
                ReactionDecision::Noop
            }
        }
    }
}

#[async_trait]
impl EffectRunner for ReactionRunner {
    async fn run(&self, snapshot: AgentState, ctx: RunnerContext) -> Result<(), AgentError> {
        let unresponded_messages = Self::unresponded_user_messages(&snapshot);
        let unresponded_actions = Self::unresponded_action_timestamps(&snapshot);

        let mut max_timestamp = snapshot.last_reaction_timestamp;
        for m in &unresponded_messages {
            max_timestamp = max_timestamp.max(m.timestamp);
        }
        for (_, at) in &unresponded_actions {
            max_timestamp = max_timestamp.max(*at);
        }

        if unresponded_messages.is_empty() && unresponded_actions.is_empty() {
            ctx.dispatch(Signal::ReactionComplete {
                decision: ReactionDecision::Noop,
                timestamp: max_timestamp,
            });
            return Ok(());
        }

        let mut current_history_count = self.initial_history_count;
        let mut loaded_action_detail_ids: Vec<String> =
            unresponded_actions.iter().map(|(id, _)| id.clone()).collect();

        loop {
            if ctx.is_cancelled() {
                debug!("reaction runner observed cancellation before think call");
                return Ok(());
            }

            let window = Self::window(&snapshot, current_history_count);
            let total_older = snapshot
                .history_messages
                .iter()
                .filter(|m| m.timestamp <= snapshot.last_reaction_timestamp)
                .count();
            let more_history_available = current_history_count < total_older;

            let system_prompt = Self::system_prompt(&snapshot, &loaded_action_detail_ids, more_history_available);
            let schema = Self::output_schema();

            let raw = self
                .think
                .think(&|_tool_name: &str| system_prompt.clone(), &window, &schema)
                .await?;

            if ctx.is_cancelled() {
                debug!("reaction runner observed cancellation after think call, discarding result");
                return Ok(());
            }

            let output: IterationOutput = match serde_json::from_str(&raw) {
                Ok(output) => output,
                Err(error) => {
                    warn!(%error, raw, "reaction think output failed to parse, coercing to noop");
                    ctx.dispatch(Signal::ReactionComplete {
                        decision: ReactionDecision::Noop,
                        timestamp: max_timestamp,
                    });
                    return Ok(());
                }
            };

            match output {
                IterationOutput::DecisionMade { decision } => {
                    let decision = Self::inject_fresh_ids(decision, max_timestamp);
                    ctx.dispatch(Signal::ReactionComplete {
                        decision,
                        timestamp: max_timestamp,
                    });
                    return Ok(());
                }
                IterationOutput::MoreHistory => {
                    if !more_history_available {
                        ctx.dispatch(Signal::ReactionComplete {
                            decision: ReactionDecision::Noop,
                            timestamp: max_timestamp,
                        });
                        return Ok(());
                    }
                    current_history_count += self.additional_history_count;
                }
                IterationOutput::ActionDetail { ids } => {
                    for id in ids {
                        if !loaded_action_detail_ids.contains(&id) {
                            loaded_action_detail_ids.push(id);
                        }
                    }
                }
            }
        }
    }
}
