//! # agent-core
//!
//! Runtime core of a conversational assistant, built on one idea: state is a single
//! value, advanced only by a pure fold over external observations.
//!
//! - [`state`]: [`AgentState`] and its nested value types — the one thing that exists.
//! - [`signal`]: [`Signal`] — every observation the core can fold into state.
//! - [`transition`]: the pure `state × signal -> state` fold.
//! - [`effect`]: [`effect::effects_at`] — the pure query from state to desired work.
//! - [`runner`]: [`runner::EffectRunner`] and the four concrete runners (Reaction, Refine,
//!   ActRequest, Reply) that turn desired work into external calls and new signals.
//! - [`scheduler`]: [`scheduler::Scheduler`] — owns the live state, reconciles the running
//!   effect set against the planner's output, publishes notifications.
//! - [`agent`]: [`agent::Agent`] — the public, persistence-backed entry point.
//! - [`llm`], [`action`]: the external contracts (`think`, `speak`, `act`) the collaborator
//!   supplies.
//! - [`persistence`]: [`persistence::PersistenceAdapter`], the SQLite-backed content-
//!   addressed implementation, and the debounced commit scheduler.
//! - [`config`]: [`config::AgentOptions`] and its builder.
//!
//! Key types are re-exported at crate root.

pub mod action;
pub mod agent;
pub mod config;
pub mod effect;
pub mod error;
pub mod llm;
pub mod persistence;
pub mod runner;
pub mod scheduler;
pub mod signal;
pub mod state;
mod time;
pub mod transition;

pub use action::ActFn;
pub use agent::Agent;
pub use config::{AgentOptions, AgentOptionsBuilder, PersistenceOptions, ReactionOptions};
pub use error::AgentError;
pub use llm::{SpeakFn, SupplementalAction, ThinkFn};
pub use scheduler::{Scheduler, SchedulerDeps};
pub use signal::{NewActionSpec, ReactionDecision, Signal};
pub use state::AgentState;
pub use transition::transition;
