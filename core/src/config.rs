//! Configuration recognized by [`crate::agent::Agent::open`]. All fields not listed here
//! are rejected by the loader that constructs this type from an untyped source (env,
//! TOML, ...); this struct itself is the validated, typed result.

use std::sync::Arc;
use std::time::Duration;

use crate::action::ActFn;
use crate::llm::{SpeakFn, ThinkFn};
use crate::state::ActionDefinition;

/// Persistence-specific options.
#[derive(Clone, Debug)]
pub struct PersistenceOptions {
    pub location: String,
    pub create_if_missing: bool,
    pub compression: bool,
    pub debounce_delay: Duration,
}

impl Default for PersistenceOptions {
    fn default() -> Self {
        Self {
            location: String::new(),
            create_if_missing: true,
            compression: false,
            debounce_delay: Duration::from_millis(2000),
        }
    }
}

/// Reaction-specific options: how much history the Reaction runner starts with, and how
/// much it asks for on each `more-history` iteration.
#[derive(Clone, Copy, Debug)]
pub struct ReactionOptions {
    pub initial_history_count: usize,
    pub additional_history_count: usize,
}

impl Default for ReactionOptions {
    fn default() -> Self {
        Self {
            initial_history_count: 10,
            additional_history_count: 5,
        }
    }
}

/// The full set of options accepted by `open`.
pub struct AgentOptions {
    pub system_prompt: String,
    pub action_definitions: Vec<ActionDefinition>,
    pub think: Arc<dyn ThinkFn>,
    pub speak: Arc<dyn SpeakFn>,
    pub act: Arc<dyn ActFn>,
    pub persistence: PersistenceOptions,
    pub reaction: ReactionOptions,
}

impl AgentOptions {
    pub fn builder(
        system_prompt: impl Into<String>,
        think: Arc<dyn ThinkFn>,
        speak: Arc<dyn SpeakFn>,
        act: Arc<dyn ActFn>,
    ) -> AgentOptionsBuilder {
        AgentOptionsBuilder {
            system_prompt: system_prompt.into(),
            action_definitions: Vec::new(),
            think,
            speak,
            act,
            persistence: PersistenceOptions::default(),
            reaction: ReactionOptions::default(),
        }
    }
}

/// Builder for [`AgentOptions`], mirroring the required-vs-defaulted split in the
/// configuration contract (`systemPrompt` required, everything else defaulted).
pub struct AgentOptionsBuilder {
    system_prompt: String,
    action_definitions: Vec<ActionDefinition>,
    think: Arc<dyn ThinkFn>,
    speak: Arc<dyn SpeakFn>,
    act: Arc<dyn ActFn>,
    persistence: PersistenceOptions,
    reaction: ReactionOptions,
}

impl AgentOptionsBuilder {
    pub fn action_definitions(mut self, defs: Vec<ActionDefinition>) -> Self {
        self.action_definitions = defs;
        self
    }

    pub fn persistence(mut self, persistence: PersistenceOptions) -> Self {
        self.persistence = persistence;
        self
    }

    pub fn reaction(mut self, reaction: ReactionOptions) -> Self {
        self.reaction = reaction;
        self
    }

    pub fn build(self) -> AgentOptions {
        AgentOptions {
            system_prompt: self.system_prompt,
            action_definitions: self.action_definitions,
            think: self.think,
            speak: self.speak,
            act: self.act,
            persistence: self.persistence,
            reaction: self.reaction,
        }
    }
}
