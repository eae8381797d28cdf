//! Readiness gate using rust-fsm.
//!
//! ```text
//! ┌─────────┐  Satisfied   ┌──────────┐  Elapsed   ┌───────┐
//! │ Waiting │ ───────────► │ Settling │ ─────────► │ Fired │ (terminal)
//! └─────────┘ ◄─────────── └──────────┘            └───────┘
//!               Unsatisfied
//! ```
//!
//! The gate leaves the bootstrap screen once the bridge session is linked,
//! contacts are fetched and the first render is no longer loading. The
//! inputs must hold for the whole settle delay. It fires at most once.

use crate::navigator::{Navigator, Route};
use rust_fsm::*;
use session_state::{
    ConnectionSnapshot, ConnectionStatus, SessionLifetime, SessionState, SyncProgress,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub readiness_machine(Waiting)

    Waiting => {
        Satisfied => Settling
    },
    Settling => {
        Unsatisfied => Waiting,
        Elapsed => Fired
    }
}

pub use readiness_machine::Input as ReadinessInput;
pub use readiness_machine::State as ReadinessState;
pub use readiness_machine::StateMachine as ReadinessMachine;

/// The navigation rule.
pub fn should_navigate(status: ConnectionStatus, contacts_fetched: bool, loading: bool) -> bool {
    status.is_linked() && contacts_fetched && !loading
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// How long the inputs must stay satisfied before firing.
    pub settle_delay: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(1),
        }
    }
}

struct GateInputs {
    connection: watch::Receiver<ConnectionSnapshot>,
    sync: watch::Receiver<SyncProgress>,
    loading: watch::Receiver<bool>,
    connection_open: bool,
    sync_open: bool,
    loading_open: bool,
}

impl GateInputs {
    fn new(state: &SessionState) -> Self {
        Self {
            connection: state.watch_connection(),
            sync: state.watch_sync(),
            loading: state.watch_loading(),
            connection_open: true,
            sync_open: true,
            loading_open: true,
        }
    }

    fn satisfied(&mut self) -> bool {
        let status = self.connection.borrow_and_update().status;
        let contacts_fetched = self.sync.borrow_and_update().contacts_fetched;
        let loading = *self.loading.borrow_and_update();
        should_navigate(status, contacts_fetched, loading)
    }

    /// Wait for any input to change. Pends forever once every input is
    /// closed.
    async fn changed(&mut self) {
        tokio::select! {
            result = self.connection.changed(), if self.connection_open => {
                self.connection_open = result.is_ok();
            }
            result = self.sync.changed(), if self.sync_open => {
                self.sync_open = result.is_ok();
            }
            result = self.loading.changed(), if self.loading_open => {
                self.loading_open = result.is_ok();
            }
            else => std::future::pending::<()>().await,
        }
    }
}

/// Handle to the running gate.
#[derive(Clone)]
pub struct GateHandle {
    fired: watch::Receiver<bool>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl GateHandle {
    pub fn has_fired(&self) -> bool {
        *self.fired.borrow()
    }

    /// Wait until the gate fires. Returns false if it stopped without
    /// firing.
    pub async fn wait_fired(&self) -> bool {
        let mut fired = self.fired.clone();
        let reached = fired.wait_for(|fired| *fired).await.is_ok();
        reached
    }

    pub async fn shutdown(&self) {
        if let Some(task) = self.task.lock().await.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl std::fmt::Debug for GateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateHandle")
            .field("fired", &self.has_fired())
            .finish_non_exhaustive()
    }
}

pub struct ReadinessGate;

impl ReadinessGate {
    /// Watch `state` and navigate to [`Route::Main`] once ready.
    pub fn spawn(
        state: &SessionState,
        navigator: Arc<dyn Navigator>,
        config: GateConfig,
    ) -> GateHandle {
        let (fired_tx, fired_rx) = watch::channel(false);
        let inputs = GateInputs::new(state);
        let lifetime = state.lifetime().clone();
        let task = tokio::spawn(run_gate(inputs, navigator, config, lifetime, fired_tx));

        GateHandle {
            fired: fired_rx,
            task: Arc::new(Mutex::new(Some(task))),
        }
    }
}

async fn run_gate(
    mut inputs: GateInputs,
    navigator: Arc<dyn Navigator>,
    config: GateConfig,
    lifetime: SessionLifetime,
    fired: watch::Sender<bool>,
) {
    let mut machine = ReadinessMachine::new();

    loop {
        match machine.state().clone() {
            ReadinessState::Waiting => {
                if inputs.satisfied() {
                    debug!("Readiness inputs satisfied, settling");
                    let _ = machine.consume(&ReadinessInput::Satisfied);
                    continue;
                }
                tokio::select! {
                    _ = lifetime.disposed() => return,
                    _ = inputs.changed() => {}
                }
            }
            ReadinessState::Settling => {
                let settle = tokio::time::sleep(config.settle_delay);
                tokio::pin!(settle);

                let held = loop {
                    tokio::select! {
                        _ = lifetime.disposed() => return,
                        _ = &mut settle => break inputs.satisfied(),
                        _ = inputs.changed() => {
                            if !inputs.satisfied() {
                                break false;
                            }
                        }
                    }
                };

                let input = if held {
                    ReadinessInput::Elapsed
                } else {
                    debug!("Readiness inputs changed while settling");
                    ReadinessInput::Unsatisfied
                };
                let _ = machine.consume(&input);
            }
            ReadinessState::Fired => {
                if lifetime.is_disposed() {
                    return;
                }
                info!("Bootstrap ready, entering main application");
                navigator.navigate(Route::Main);
                fired.send_replace(true);
                return;
            }
        }
    }
}
