//! The pure signal-to-state fold.
//!
//! `transition` never performs I/O and never mints IDs — every ID arrives with the
//! signal that introduces it. It is total over [`Signal`]'s variants; invariant-breaking
//! signals are logged and dropped rather than rejected with an error, matching the rest
//! of the core's "log and drop" treatment of stale or racing input.

use tracing::warn;

use crate::signal::{NewActionSpec, ReactionDecision, Signal};
use crate::state::{Action, ActionResponse, HistoryMessage, ReplyContext, Role};
use crate::AgentState;

/// Applies one signal to `state`, returning the new state. `state` is consumed and a
/// fresh value returned rather than mutated in place, mirroring the "state is one value,
/// all mutation by replacement" contract.
pub fn transition(state: AgentState, signal: Signal) -> AgentState {
    match signal {
        Signal::UserMessageReceived {
            message_id,
            content,
            timestamp,
        } => on_user_message_received(state, message_id, content, timestamp),

        Signal::AssistantChunkReceived {
            message_id,
            chunk,
            timestamp,
        } => on_assistant_chunk_received(state, message_id, chunk, timestamp),

        Signal::AssistantMessageComplete {
            message_id,
            timestamp,
        } => on_assistant_message_complete(state, message_id, timestamp),

        Signal::ActionRequestRefined {
            action_id,
            parameter,
        } => on_action_request_refined(state, action_id, parameter),

        Signal::ActionCompleted {
            action_id,
            result,
            timestamp,
        } => on_action_completed(state, action_id, result, timestamp),

        Signal::ActionCancelledByUser {
            action_id,
            timestamp,
        } => on_action_cancelled_by_user(state, action_id, timestamp),

        Signal::ReactionComplete { decision, timestamp } => {
            on_reaction_complete(state, decision, timestamp)
        }
    }
}

fn on_user_message_received(
    mut state: AgentState,
    message_id: String,
    content: String,
    timestamp: i64,
) -> AgentState {
    if timestamp <= state.last_history_timestamp() {
        warn!(
            message_id,
            timestamp,
            last_history_timestamp = state.last_history_timestamp(),
            "dropping user message with non-increasing timestamp"
        );
        return state;
    }
    state.history_messages.push(HistoryMessage {
        id: message_id,
        role: Role::User,
        content,
        timestamp,
    });
    state
}

fn on_assistant_chunk_received(
    mut state: AgentState,
    message_id: String,
    chunk: String,
    timestamp: i64,
) -> AgentState {
    match state.replies.get_mut(&message_id) {
        Some(reply) => {
            reply.chunks.push(chunk);
            state
        }
        None => {
            warn!(
                message_id,
                timestamp, "dropping assistant chunk for unknown reply context"
            );
            state
        }
    }
}

fn on_assistant_message_complete(
    mut state: AgentState,
    message_id: String,
    timestamp: i64,
) -> AgentState {
    let Some(reply) = state.replies.remove(&message_id) else {
        warn!(message_id, timestamp, "assistant-message-complete for unknown reply context");
        return state;
    };

    if timestamp <= state.last_history_timestamp() {
        warn!(
            message_id,
            timestamp,
            last_history_timestamp = state.last_history_timestamp(),
            "dropping completed reply with non-increasing timestamp"
        );
        return state;
    }

    state.history_messages.push(HistoryMessage {
        id: message_id,
        role: Role::Assistant,
        content: reply.content(),
        timestamp,
    });
    state
}

fn on_action_request_refined(mut state: AgentState, action_id: String, parameter: String) -> AgentState {
    match state.actions.get_mut(&action_id) {
        Some(action) => {
            action.parameter = Some(parameter);
            state
        }
        None => {
            warn!(action_id, "dropping refine result for unknown action");
            state
        }
    }
}

fn on_action_completed(mut state: AgentState, action_id: String, result: String, timestamp: i64) -> AgentState {
    match state.actions.get_mut(&action_id) {
        Some(action) => {
            action.response = Some(ActionResponse::Completed {
                result,
                at: timestamp,
            });
            state
        }
        None => {
            warn!(action_id, "dropping completion for unknown action");
            state
        }
    }
}

fn on_action_cancelled_by_user(mut state: AgentState, action_id: String, timestamp: i64) -> AgentState {
    if let Some(action) = state.actions.get_mut(&action_id) {
        if action.response.is_none() {
            action.response = Some(ActionResponse::Cancelled { at: timestamp });
        }
    } else {
        warn!(action_id, "dropping cancellation for unknown action");
    }
    state
}

fn on_reaction_complete(mut state: AgentState, decision: ReactionDecision, timestamp: i64) -> AgentState {
    match decision {
        ReactionDecision::ReplyToUser {
            message_id,
            last_history_message_id: _,
            related_action_ids,
        } => {
            state
                .replies
                .insert(message_id.clone(), ReplyContext::new(message_id, timestamp, related_action_ids));
        }
        ReactionDecision::AdjustActions {
            cancel_action_ids,
            new_actions,
        } => {
            for action_id in cancel_action_ids {
                if let Some(action) = state.actions.get_mut(&action_id) {
                    if action.response.is_none() {
                        action.response = Some(ActionResponse::Cancelled { at: timestamp });
                    }
                }
            }
            for NewActionSpec {
                action_id,
                action_name,
                initial_intent,
            } in new_actions
            {
                state
                    .actions
                    .insert(action_id.clone(), Action::new(action_id, action_name, initial_intent, timestamp));
            }
        }
        ReactionDecision::Noop => {}
    }

    state.last_reaction_timestamp = state.last_reaction_timestamp.max(timestamp);
    state
}
