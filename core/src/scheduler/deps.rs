//! Bundles the external collaborators and reaction tuning needed to build a runner for
//! a given [`Effect`].

use std::sync::Arc;

use crate::action::ActFn;
use crate::effect::Effect;
use crate::llm::{SpeakFn, ThinkFn};
use crate::runner::{ActRequestRunner, EffectRunner, ReactionRunner, RefineRunner, ReplyRunner};

#[derive(Clone)]
pub struct SchedulerDeps {
    pub think: Arc<dyn ThinkFn>,
    pub speak: Arc<dyn SpeakFn>,
    pub act: Arc<dyn ActFn>,
    pub initial_history_count: usize,
    pub additional_history_count: usize,
}

impl SchedulerDeps {
    pub fn build(&self, effect: &Effect) -> Box<dyn EffectRunner> {
        match effect {
            Effect::Reaction => Box::new(ReactionRunner::new(
                self.think.clone(),
                self.initial_history_count,
                self.additional_history_count,
            )),
            Effect::Refine { action_id } => Box::new(RefineRunner::new(action_id.clone(), self.think.clone())),
            Effect::ActRequest { action_id } => Box::new(ActRequestRunner::new(action_id.clone(), self.act.clone())),
            Effect::Reply { message_id } => Box::new(ReplyRunner::new(message_id.clone(), self.speak.clone())),
        }
    }
}
