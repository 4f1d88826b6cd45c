//! The effect scheduler: owns the single live state, reconciles the running effect set
//! against the planner's output, and serializes every transition.
//!
//! Control plane and effect execution are deliberately split: the loop below never
//! awaits a runner. It spawns one, remembers its [`CancellationToken`], and moves on —
//! suspension only ever happens at the boundary between dispatching a signal and
//! starting the next reconcile.

mod deps;

pub use deps::SchedulerDeps;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use stream_event::CoreEvent;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::effect::effects_at;
use crate::error::AgentError;
use crate::persistence::{Debouncer, PersistenceAdapter};
use crate::runner::{EffectRunner, RunnerContext};
use crate::signal::Signal;
use crate::transition::transition;
use crate::AgentState;

/// Base delay for the first retry of a failed effect; doubled per consecutive failure of
/// the same key, capped at [`MAX_BACKOFF`].
const BASE_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

enum ControlMessage {
    Signal(Signal),
    Shutdown(oneshot::Sender<()>),
}

struct RunningEffect {
    cancel: CancellationToken,
}

/// Tracks consecutive failures of one effect key so reconcile can back off instead of
/// relaunching it in a tight loop.
struct FailureInfo {
    count: u32,
    retry_after: Instant,
}

fn backoff_for(count: u32) -> Duration {
    let exponent = count.saturating_sub(1).min(6);
    (BASE_BACKOFF * 2u32.pow(exponent)).min(MAX_BACKOFF)
}

/// Handle to a running scheduler. Cloning shares the same underlying loop; the loop
/// itself is torn down by [`Scheduler::close`].
#[derive(Clone)]
pub struct Scheduler {
    control_tx: mpsc::UnboundedSender<ControlMessage>,
    events_tx: broadcast::Sender<CoreEvent>,
    state: Arc<tokio::sync::RwLock<AgentState>>,
}

impl Scheduler {
    /// Starts the scheduler loop with `initial_state` and returns a handle to it.
    pub fn start(initial_state: AgentState, deps: SchedulerDeps, persistence: Arc<dyn PersistenceAdapter>, debounce_delay: std::time::Duration) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(1024);
        let state = Arc::new(tokio::sync::RwLock::new(initial_state.clone()));

        let debouncer = Debouncer::new(persistence.clone(), debounce_delay);

        let loop_state = state.clone();
        let loop_events_tx = events_tx.clone();
        let loop_control_tx = control_tx.clone();
        tokio::spawn(async move {
            run_loop(
                initial_state,
                deps,
                persistence,
                debouncer,
                control_rx,
                loop_control_tx,
                loop_events_tx,
                loop_state,
            )
            .await;
        });

        Self {
            control_tx,
            events_tx,
            state,
        }
    }

    /// Applies `signal` to the current state and reconciles. Returns once the signal has
    /// been enqueued — not once it has been applied; ordering is still guaranteed because
    /// every enqueued signal is applied in arrival order before the next reconcile.
    pub fn dispatch(&self, signal: Signal) {
        let _ = self.control_tx.send(ControlMessage::Signal(signal));
    }

    /// The current state, as of the last applied transition.
    pub async fn state(&self) -> AgentState {
        self.state.read().await.clone()
    }

    /// Subscribes to scheduler notifications: state-updated, effect-started,
    /// effect-cancelled, effect-completed, effect-failed.
    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events_tx.subscribe()
    }

    /// Cancels every running effect, drains any signal dispatched before cancellation
    /// was observed, flushes a final commit, and stops the loop.
    pub async fn close(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.control_tx.send(ControlMessage::Shutdown(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_loop(
    mut state: AgentState,
    deps: SchedulerDeps,
    persistence: Arc<dyn PersistenceAdapter>,
    debouncer: Debouncer,
    mut control_rx: mpsc::UnboundedReceiver<ControlMessage>,
    dispatch_tx: mpsc::UnboundedSender<ControlMessage>,
    events_tx: broadcast::Sender<CoreEvent>,
    shared_state: Arc<tokio::sync::RwLock<AgentState>>,
) {
    let signal_tx = signal_forwarding_sender(dispatch_tx.clone());
    let mut running: HashMap<String, RunningEffect> = HashMap::new();
    let mut failures: HashMap<String, FailureInfo> = HashMap::new();
    let mut tasks: JoinSet<(String, Result<(), AgentError>)> = JoinSet::new();

    reconcile(&state, &mut running, &failures, &mut tasks, &deps, &signal_tx, &events_tx);

    loop {
        let next_retry = failures.values().map(|f| f.retry_after).min();

        let message = tokio::select! {
            biased;
            message = control_rx.recv() => match message {
                Some(message) => message,
                None => return,
            },
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Ok((key, outcome)) = joined {
                    running.remove(&key);
                    match outcome {
                        Ok(()) => { failures.remove(&key); }
                        Err(_) => {
                            let count = failures.get(&key).map(|f| f.count + 1).unwrap_or(1);
                            failures.insert(key, FailureInfo { count, retry_after: Instant::now() + backoff_for(count) });
                        }
                    }
                }
                reconcile(&state, &mut running, &failures, &mut tasks, &deps, &signal_tx, &events_tx);
                continue;
            },
            _ = tokio::time::sleep_until(next_retry.unwrap_or_else(|| Instant::now() + Duration::from_secs(3600))), if next_retry.is_some() => {
                reconcile(&state, &mut running, &failures, &mut tasks, &deps, &signal_tx, &events_tx);
                continue;
            },
        };

        match message {
            ControlMessage::Signal(signal) => {
                state = transition(state, signal);
                *shared_state.write().await = state.clone();
                publish_state_updated(&events_tx, &state);
                debouncer.enqueue(state.clone());
                reconcile(&state, &mut running, &failures, &mut tasks, &deps, &signal_tx, &events_tx);
            }
            ControlMessage::Shutdown(ack) => {
                for (key, effect) in running.drain() {
                    effect.cancel.cancel();
                    let _ = events_tx.send(CoreEvent::EffectCancelled { key });
                }

                loop {
                    tokio::select! {
                        Some(message) = control_rx.recv() => {
                            if let ControlMessage::Signal(signal) = message {
                                state = transition(state, signal);
                                *shared_state.write().await = state.clone();
                                publish_state_updated(&events_tx, &state);
                            }
                        }
                        joined = tasks.join_next() => {
                            if joined.is_none() {
                                break;
                            }
                        }
                        else => break,
                    }
                }

                while let Ok(message) = control_rx.try_recv() {
                    if let ControlMessage::Signal(signal) = message {
                        state = transition(state, signal);
                        *shared_state.write().await = state.clone();
                    }
                }

                if let Err(error) = persistence.commit(&state).await {
                    warn!(%error, "final commit on close failed");
                }
                debouncer.shutdown().await;

                info!("scheduler closed");
                let _ = ack.send(());
                return;
            }
        }
    }
}

fn publish_state_updated(events_tx: &broadcast::Sender<CoreEvent>, state: &AgentState) {
    match serde_json::to_value(state) {
        Ok(value) => {
            let _ = events_tx.send(CoreEvent::StateUpdated { state: value });
        }
        Err(error) => warn!(%error, "failed to serialize state for state-updated notification"),
    }
}

/// Wraps the control channel so runners can dispatch `Signal`s without knowing about
/// `ControlMessage`.
fn signal_forwarding_sender(control_tx: mpsc::UnboundedSender<ControlMessage>) -> mpsc::UnboundedSender<Signal> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Signal>();
    tokio::spawn(async move {
        while let Some(signal) = rx.recv().await {
            if control_tx.send(ControlMessage::Signal(signal)).is_err() {
                break;
            }
        }
    });
    tx
}

/// Diffs `effectsAt(state)` against `running`: cancels keys no longer desired, and
/// launches keys newly desired — skipping any key still within its failure backoff
/// window (see [`FailureInfo`]).
fn reconcile(
    state: &AgentState,
    running: &mut HashMap<String, RunningEffect>,
    failures: &HashMap<String, FailureInfo>,
    tasks: &mut JoinSet<(String, Result<(), AgentError>)>,
    deps: &SchedulerDeps,
    signal_tx: &mpsc::UnboundedSender<Signal>,
    events_tx: &broadcast::Sender<CoreEvent>,
) {
    let desired = effects_at(state);

    let removed: Vec<String> = running
        .keys()
        .filter(|key| !desired.contains_key(*key))
        .cloned()
        .collect();
    for key in removed {
        if let Some(effect) = running.remove(&key) {
            effect.cancel.cancel();
            let _ = events_tx.send(CoreEvent::EffectCancelled { key });
        }
    }

    let now = Instant::now();
    for (key, effect) in desired {
        if running.contains_key(&key) {
            continue;
        }
        if let Some(failure) = failures.get(&key) {
            if now < failure.retry_after {
                continue;
            }
        }

        let cancel = CancellationToken::new();
        let runner = deps.build(&effect);
        let ctx = RunnerContext::new(signal_tx.clone(), cancel.clone());
        let snapshot = state.clone();
        let events_tx = events_tx.clone();
        let key_for_task = key.clone();

        let _ = events_tx.send(CoreEvent::EffectStarted { key: key.clone() });
        tasks.spawn(async move {
            let outcome = runner.run(snapshot, ctx).await;
            match &outcome {
                Ok(()) => {
                    let _ = events_tx.send(CoreEvent::EffectCompleted { key: key_for_task.clone() });
                }
                Err(error) => {
                    let _ = events_tx.send(CoreEvent::EffectFailed {
                        key: key_for_task.clone(),
                        error: error.to_string(),
                    });
                }
            }
            (key_for_task, outcome)
        });
        running.insert(key, RunningEffect { cancel });
    }
}
