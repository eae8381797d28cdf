//! Connection state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌──────────────┐  Open   ┌──────────────┐  QrIssued  ┌──────────────┐
//! │ Disconnected │ ──────► │  Connecting  │ ─────────► │      Qr      │
//! └──────────────┘         └──────┬───────┘            └──────┬───────┘
//!        ▲                        │ Linked / MarkReady        │ Linked / MarkReady
//!        │ Close                  ▼                           ▼
//!        │                 ┌──────────────┐  MarkReady ┌──────────────┐
//!        └──────────────── │Authenticated │ ─────────► │    Ready     │
//!                          └──────────────┘            └──────────────┘
//!
//!   any live state ── Fail ──► Failed ── Open ──► Connecting (retry)
//! ```
//!
//! [`ConnectionLifecycle`] wraps the machine with the published
//! [`ConnectionSnapshot`] and the retry budget. It performs no I/O; the
//! manager feeds it events and publishes the snapshot after each one.

use crate::messages::BridgeStatus;
use rust_fsm::*;
use session_state::{ConnectionSnapshot, ConnectionStatus};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub connection_machine(Disconnected)

    Disconnected => {
        Open => Connecting,
        Fail => Failed
    },
    Connecting => {
        QrIssued => Qr,
        Linked => Authenticated,
        MarkReady => Ready,
        Fail => Failed,
        Close => Disconnected
    },
    Qr => {
        QrIssued => Qr,
        Linked => Authenticated,
        MarkReady => Ready,
        Fail => Failed,
        Close => Disconnected
    },
    Authenticated => {
        QrIssued => Qr,
        Linked => Authenticated,
        MarkReady => Ready,
        Fail => Failed,
        Close => Disconnected
    },
    Ready => {
        QrIssued => Qr,
        Linked => Authenticated,
        MarkReady => Ready,
        Fail => Failed,
        Close => Disconnected
    },
    Failed => {
        Open => Connecting,
        Fail => Failed,
        Close => Disconnected
    }
}

pub use connection_machine::Input as ConnectionMachineInput;
pub use connection_machine::State as ConnectionMachineState;
pub use connection_machine::StateMachine as ConnectionMachine;

impl From<&ConnectionMachineState> for ConnectionStatus {
    fn from(state: &ConnectionMachineState) -> Self {
        match state {
            ConnectionMachineState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionMachineState::Connecting => ConnectionStatus::Connecting,
            ConnectionMachineState::Qr => ConnectionStatus::Qr,
            ConnectionMachineState::Authenticated => ConnectionStatus::Authenticated,
            ConnectionMachineState::Ready => ConnectionStatus::Ready,
            ConnectionMachineState::Failed => ConnectionStatus::Error,
        }
    }
}

/// Where a status report came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Pushed on the persistent channel.
    Live,
    /// One-shot probe issued at startup.
    Probe,
}

/// Input to [`ConnectionLifecycle::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A connection attempt is starting.
    Open,
    /// The bridge reported a session status.
    Status {
        status: BridgeStatus,
        qr_code: Option<String>,
        source: StatusSource,
    },
    /// The channel failed or the bridge reported an error.
    Failed(String),
    /// The retry budget is spent.
    Exhausted(String),
    /// The channel was closed on purpose.
    Close,
}

/// Connection state plus retry accounting.
pub struct ConnectionLifecycle {
    machine: ConnectionMachine,
    retry_budget: u32,
    snapshot: ConnectionSnapshot,
    live_event_seen: bool,
}

impl ConnectionLifecycle {
    pub fn new(retry_budget: u32) -> Self {
        Self {
            machine: ConnectionMachine::new(),
            retry_budget,
            snapshot: ConnectionSnapshot::new(retry_budget),
            live_event_seen: false,
        }
    }

    pub fn snapshot(&self) -> &ConnectionSnapshot {
        &self.snapshot
    }

    pub fn status(&self) -> ConnectionStatus {
        self.snapshot.status
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    /// Apply one event. Returns true if the snapshot changed.
    pub fn apply(&mut self, event: LifecycleEvent) -> bool {
        let before = self.snapshot.clone();

        match event {
            LifecycleEvent::Open => {
                if self.consume(ConnectionMachineInput::Open) {
                    self.snapshot.qr_code = None;
                }
            }
            LifecycleEvent::Status {
                status,
                qr_code,
                source,
            } => self.apply_status(status, qr_code, source),
            LifecycleEvent::Failed(reason) => {
                self.consume(ConnectionMachineInput::Fail);
                self.snapshot.last_error = Some(reason);
                self.snapshot.qr_code = None;
            }
            LifecycleEvent::Exhausted(reason) => {
                self.consume(ConnectionMachineInput::Fail);
                self.snapshot.retries_remaining = 0;
                self.snapshot.last_error = Some(reason);
                self.snapshot.qr_code = None;
            }
            LifecycleEvent::Close => {
                self.consume(ConnectionMachineInput::Close);
                self.snapshot.qr_code = None;
            }
        }

        self.snapshot.status = ConnectionStatus::from(self.machine.state());
        if !self.snapshot.status.is_linked() {
            self.snapshot.should_sync = false;
        }

        self.snapshot != before
    }

    fn apply_status(&mut self, status: BridgeStatus, qr_code: Option<String>, source: StatusSource) {
        if source == StatusSource::Probe && self.live_event_seen {
            return;
        }

        let input = match status {
            BridgeStatus::Qr => ConnectionMachineInput::QrIssued,
            BridgeStatus::Authenticated => ConnectionMachineInput::Linked,
            BridgeStatus::Ready => ConnectionMachineInput::MarkReady,
            // Failures are routed through LifecycleEvent::Failed by the
            // manager; the remaining statuses carry no transition.
            _ => return,
        };

        if source == StatusSource::Live {
            self.live_event_seen = true;
        }
        if !self.consume(input) {
            return;
        }

        match status {
            BridgeStatus::Qr => self.snapshot.qr_code = qr_code,
            _ => {
                self.snapshot.qr_code = None;
                if source == StatusSource::Live {
                    self.snapshot.should_sync = true;
                    self.snapshot.last_error = None;
                    self.snapshot.retries_remaining = self.retry_budget;
                }
            }
        }
    }

    /// Spend one retry. Returns false when the budget is exhausted.
    pub fn spend_retry(&mut self) -> bool {
        self.snapshot.retries_remaining = self.snapshot.retries_remaining.saturating_sub(1);
        self.snapshot.retries_remaining > 0
    }

    /// Restore the full retry budget.
    pub fn reset_budget(&mut self) {
        self.snapshot.retries_remaining = self.retry_budget;
    }

    /// A probe result arriving after this point is ignored.
    pub fn live_event_seen(&self) -> bool {
        self.live_event_seen
    }

    fn consume(&mut self, input: ConnectionMachineInput) -> bool {
        self.machine.consume(&input).is_ok()
    }
}

impl std::fmt::Debug for ConnectionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionLifecycle")
            .field("state", self.machine.state())
            .field("snapshot", &self.snapshot)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(status: BridgeStatus, qr: Option<&str>) -> LifecycleEvent {
        LifecycleEvent::Status {
            status,
            qr_code: qr.map(str::to_string),
            source: StatusSource::Live,
        }
    }

    fn probe(status: BridgeStatus) -> LifecycleEvent {
        LifecycleEvent::Status {
            status,
            qr_code: Some("probe-qr".to_string()),
            source: StatusSource::Probe,
        }
    }

    #[test]
    fn test_machine_transitions() {
        let mut machine = ConnectionMachine::new();
        assert_eq!(*machine.state(), ConnectionMachineState::Disconnected);

        machine.consume(&ConnectionMachineInput::Open).unwrap();
        machine.consume(&ConnectionMachineInput::QrIssued).unwrap();
        assert_eq!(*machine.state(), ConnectionMachineState::Qr);

        machine.consume(&ConnectionMachineInput::MarkReady).unwrap();
        assert_eq!(*machine.state(), ConnectionMachineState::Ready);

        // Cannot re-open a live connection.
        assert!(machine.consume(&ConnectionMachineInput::Open).is_err());
    }

    #[test]
    fn test_qr_then_ready_raises_should_sync_once() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(live(BridgeStatus::Qr, Some("2@abc")));

        assert_eq!(lifecycle.status(), ConnectionStatus::Qr);
        assert_eq!(lifecycle.snapshot().qr_code.as_deref(), Some("2@abc"));
        assert!(!lifecycle.snapshot().should_sync);

        lifecycle.apply(live(BridgeStatus::Ready, None));
        assert_eq!(lifecycle.status(), ConnectionStatus::Ready);
        assert_eq!(lifecycle.snapshot().qr_code, None);
        assert!(lifecycle.snapshot().should_sync);

        // A repeated ready report changes nothing.
        assert!(!lifecycle.apply(live(BridgeStatus::Ready, None)));
    }

    #[test]
    fn test_failure_clears_should_sync_and_records_error() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(live(BridgeStatus::Authenticated, None));
        assert!(lifecycle.snapshot().should_sync);

        lifecycle.apply(LifecycleEvent::Failed("socket reset".to_string()));
        assert_eq!(lifecycle.status(), ConnectionStatus::Error);
        assert!(!lifecycle.snapshot().should_sync);
        assert_eq!(lifecycle.snapshot().last_error.as_deref(), Some("socket reset"));
    }

    #[test]
    fn test_retry_budget() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        assert!(lifecycle.spend_retry());
        assert!(lifecycle.spend_retry());
        assert!(!lifecycle.spend_retry());
        assert_eq!(lifecycle.snapshot().retries_remaining, 0);
        assert!(!lifecycle.spend_retry());

        lifecycle.reset_budget();
        assert_eq!(lifecycle.snapshot().retries_remaining, 3);
    }

    #[test]
    fn test_linked_status_restores_budget() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(LifecycleEvent::Failed("boom".to_string()));
        lifecycle.spend_retry();
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(live(BridgeStatus::Ready, None));

        assert_eq!(lifecycle.snapshot().retries_remaining, 3);
        assert_eq!(lifecycle.snapshot().last_error, None);
    }

    #[test]
    fn test_probe_seeds_status_without_sync() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(probe(BridgeStatus::Ready));

        assert_eq!(lifecycle.status(), ConnectionStatus::Ready);
        assert!(!lifecycle.snapshot().should_sync);

        // The live report is what raises the flag.
        lifecycle.apply(live(BridgeStatus::Ready, None));
        assert!(lifecycle.snapshot().should_sync);
    }

    #[test]
    fn test_probe_after_live_event_is_ignored() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(live(BridgeStatus::Qr, Some("live-qr")));

        assert!(!lifecycle.apply(probe(BridgeStatus::Qr)));
        assert_eq!(lifecycle.snapshot().qr_code.as_deref(), Some("live-qr"));
    }

    #[test]
    fn test_status_while_failed_is_ignored() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(LifecycleEvent::Failed("down".to_string()));

        lifecycle.apply(probe(BridgeStatus::Qr));
        assert_eq!(lifecycle.status(), ConnectionStatus::Error);
        assert_eq!(lifecycle.snapshot().qr_code, None);
    }

    #[test]
    fn test_close_returns_to_disconnected() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(live(BridgeStatus::Qr, Some("code")));
        lifecycle.apply(LifecycleEvent::Close);

        assert_eq!(lifecycle.status(), ConnectionStatus::Disconnected);
        assert_eq!(lifecycle.snapshot().qr_code, None);
    }

    #[test]
    fn test_exhausted_is_terminal_error() {
        let mut lifecycle = ConnectionLifecycle::new(3);
        lifecycle.apply(LifecycleEvent::Open);
        lifecycle.apply(LifecycleEvent::Exhausted("gave up".to_string()));

        let snapshot = lifecycle.snapshot();
        assert_eq!(snapshot.status, ConnectionStatus::Error);
        assert_eq!(snapshot.retries_remaining, 0);
        assert_eq!(snapshot.last_error.as_deref(), Some("gave up"));
    }
}
