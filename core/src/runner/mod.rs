//! Effect runners: one execution of one effect kind against an external collaborator.
//!
//! Each runner receives an immutable state snapshot at launch and must not reach for
//! later state — the scheduler relaunches it if the input changes. Cancellation is
//! cooperative: a runner checks [`RunnerContext::is_cancelled`] at every suspension
//! point and stops dispatching once it observes cancellation, but a signal dispatched
//! before that point remains valid.

mod act_request;
mod reaction;
mod refine;
mod reply;

pub use act_request::ActRequestRunner;
pub use reaction::ReactionRunner;
pub use refine::RefineRunner;
pub use reply::ReplyRunner;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::signal::Signal;
use crate::AgentState;

/// Everything a runner needs besides its own input: a channel to dispatch signals back
/// to the scheduler, and a token to observe cancellation.
pub struct RunnerContext {
    dispatch: mpsc::UnboundedSender<Signal>,
    cancel: CancellationToken,
}

impl RunnerContext {
    pub fn new(dispatch: mpsc::UnboundedSender<Signal>, cancel: CancellationToken) -> Self {
        Self { dispatch, cancel }
    }

    /// Dispatches a signal back to the scheduler. The send only fails if the scheduler
    /// has shut down, in which case there is nothing left to do.
    pub fn dispatch(&self, signal: Signal) {
        let _ = self.dispatch.send(signal);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Suspends until either cancellation is observed or `duration` elapses — the
    /// runner's cancellation checkpoint at an await/suspension point.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// One effect kind's execution against the external collaborators (`think`, `speak`,
/// `act`). `snapshot` is the state as of launch; runners never observe a later state.
///
/// An `Err` return means the external call itself failed and becomes an `effect-failed`
/// notification; a race with cancellation that leaves the runner with nothing to do
/// (e.g. the action it was refining disappeared) is logged and returned as `Ok(())`,
/// since the state was never wrong, just stale.
#[async_trait]
pub trait EffectRunner: Send + Sync {
    async fn run(&self, snapshot: AgentState, ctx: RunnerContext) -> Result<(), AgentError>;
}
