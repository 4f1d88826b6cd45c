//! The pure state-to-effect-set derivation.
//!
//! `effects_at` carries no state of its own — it is a query over the current
//! [`AgentState`] — and is idempotent: calling it twice with no signals in between
//! returns the same key set, so the scheduler's reconcile step never thrashes.

use std::collections::BTreeMap;

use crate::AgentState;

/// One unit of desired work, keyed so that identical work across successive plans is
/// recognized as "the same in-flight effect" rather than relaunched.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    Reply { message_id: String },
    Reaction,
    Refine { action_id: String },
    ActRequest { action_id: String },
}

/// Computes the desired effect set for `state`, keyed by a stable string so the
/// scheduler can diff it against the running set.
pub fn effects_at(state: &AgentState) -> BTreeMap<String, Effect> {
    let mut effects = BTreeMap::new();

    for message_id in state.replies.keys() {
        effects.insert(
            format!("reply-{message_id}"),
            Effect::Reply {
                message_id: message_id.clone(),
            },
        );
    }

    if let Some(key) = reaction_key(state) {
        effects.insert(key, Effect::Reaction);
    }

    for (action_id, action) in &state.actions {
        if action.response.is_some() {
            continue;
        }
        match &action.parameter {
            None if state.action_definitions.contains_key(&action.request.action_name) => {
                effects.insert(format!("refine-{action_id}"), Effect::Refine {
                    action_id: action_id.clone(),
                });
            }
            Some(_) => {
                effects.insert(format!("act-{action_id}"), Effect::ActRequest {
                    action_id: action_id.clone(),
                });
            }
            None => {}
        }
    }

    effects
}

/// A Reaction is desired iff something newer than the watermark exists: an unresponded
/// user message, or an action whose response arrived after the watermark. The key
/// changes only when a newer input arrives, so an in-flight reaction survives unrelated
/// state changes (e.g. a Reply streaming chunks) without being relaunched.
fn reaction_key(state: &AgentState) -> Option<String> {
    let newest_user_message = state
        .history_messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, crate::state::Role::User) && m.timestamp > state.last_reaction_timestamp);

    let newest_action = state
        .actions
        .values()
        .filter_map(|a| match &a.response {
            Some(crate::state::ActionResponse::Completed { at, .. })
            | Some(crate::state::ActionResponse::Cancelled { at }) => Some((*at, a)),
            None => None,
        })
        .filter(|(at, _)| *at > state.last_reaction_timestamp)
        .max_by_key(|(at, _)| *at);

    if newest_user_message.is_none() && newest_action.is_none() {
        return None;
    }

    let max_new_timestamp = newest_user_message
        .map(|m| m.timestamp)
        .into_iter()
        .chain(newest_action.map(|(at, _)| at))
        .max()
        .unwrap_or(state.last_reaction_timestamp);

    let latest_action_id = newest_action.map(|(_, a)| a.id.as_str()).unwrap_or("");
    let latest_user_message_id = newest_user_message.map(|m| m.id.as_str()).unwrap_or("");

    Some(format!(
        "reaction-{max_new_timestamp}-{latest_action_id}-{latest_user_message_id}"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Action, ActionDefinition, HistoryMessage, ReplyContext, Role};

    fn fresh() -> AgentState {
        AgentState::new("prompt", vec![])
    }

    /// **Scenario**: a brand new state with no input produces no effects.
    #[test]
    fn empty_state_has_no_effects() {
        assert!(effects_at(&fresh()).is_empty());
    }

    /// **Scenario**: a user message newer than the watermark yields exactly a Reaction
    /// effect.
    #[test]
    fn new_user_message_yields_reaction() {
        let mut state = fresh();
        state.history_messages.push(HistoryMessage {
            id: "m1".into(),
            role: Role::User,
            content: "hi".into(),
            timestamp: 1000,
        });
        let effects = effects_at(&state);
        assert_eq!(effects.len(), 1);
        assert!(effects.keys().next().unwrap().starts_with("reaction-1000-"));
    }

    /// **Scenario**: calling `effects_at` twice with no signal in between returns an
    /// identical key set (idempotence of planning).
    #[test]
    fn effects_at_is_idempotent() {
        let mut state = fresh();
        state.history_messages.push(HistoryMessage {
            id: "m1".into(),
            role: Role::User,
            content: "hi".into(),
            timestamp: 1000,
        });
        assert_eq!(effects_at(&state), effects_at(&state));
    }

    /// **Scenario**: an action with a null parameter but a registered definition yields
    /// a Refine effect; once parameterized, it yields an ActRequest effect instead.
    #[test]
    fn action_without_parameter_yields_refine_then_act_request() {
        let mut state = fresh();
        state.action_definitions.insert(
            "search".into(),
            ActionDefinition {
                name: "search".into(),
                description: "".into(),
                parameter_schema: serde_json::json!({}),
            },
        );
        state
            .actions
            .insert("a1".into(), Action::new("a1", "search", "find weather", 10));

        let effects = effects_at(&state);
        assert_eq!(effects.get("refine-a1"), Some(&Effect::Refine { action_id: "a1".into() }));

        let mut action = state.actions.get("a1").unwrap().clone();
        action.parameter = Some(r#"{"query":"weather"}"#.into());
        state.actions.insert("a1".into(), action);

        let effects = effects_at(&state);
        assert_eq!(
            effects.get("act-a1"),
            Some(&Effect::ActRequest { action_id: "a1".into() })
        );
        assert!(!effects.contains_key("refine-a1"));
    }

    /// **Scenario**: an action whose definition was never registered does not produce a
    /// Refine effect (there is nothing to refine it against).
    #[test]
    fn action_without_registered_definition_yields_no_refine() {
        let mut state = fresh();
        state
            .actions
            .insert("a1".into(), Action::new("a1", "unknown-tool", "do it", 10));
        assert!(effects_at(&state).is_empty());
    }

    /// **Scenario**: a resolved action never yields Refine or ActRequest regardless of
    /// its parameter field.
    #[test]
    fn resolved_action_yields_no_effect() {
        let mut state = fresh();
        let mut action = Action::new("a1", "search", "find weather", 10);
        action.response = Some(crate::state::ActionResponse::Completed {
            result: "done".into(),
            at: 20,
        });
        state.actions.insert("a1".into(), action);
        assert!(effects_at(&state).is_empty());
    }

    /// **Scenario**: an in-flight ReplyContext always yields a Reply effect, independent
    /// of the Reaction watermark.
    #[test]
    fn in_flight_reply_yields_reply_effect() {
        let mut state = fresh();
        state
            .replies
            .insert("m1".into(), ReplyContext::new("m1", 100, vec![]));
        let effects = effects_at(&state);
        assert_eq!(
            effects.get("reply-m1"),
            Some(&Effect::Reply { message_id: "m1".into() })
        );
    }
}
