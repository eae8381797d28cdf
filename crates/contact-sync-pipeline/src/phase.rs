//! Pipeline phase machine using rust-fsm.
//!
//! ```text
//! Initializing → FetchingContacts → ProcessingPinned → UpdatingPins
//!              → SortingContacts → Caching → Complete
//!
//! any non-terminal phase ── Fail ──► Error
//! ```
//!
//! One machine per run; a new run starts again at `Initializing`.

use crate::{SyncError, SyncResult};
use rust_fsm::*;
use session_state::SyncPhase;

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub sync_phase_machine(Initializing)

    Initializing => {
        Advance => FetchingContacts,
        Fail => Error
    },
    FetchingContacts => {
        Advance => ProcessingPinned,
        Fail => Error
    },
    ProcessingPinned => {
        Advance => UpdatingPins,
        Fail => Error
    },
    UpdatingPins => {
        Advance => SortingContacts,
        Fail => Error
    },
    SortingContacts => {
        Advance => Caching,
        Fail => Error
    },
    Caching => {
        Advance => Complete,
        Fail => Error
    }
}

use sync_phase_machine::Input as PhaseInput;
use sync_phase_machine::State as PhaseState;
use sync_phase_machine::StateMachine as PhaseMachine;

impl From<&PhaseState> for SyncPhase {
    fn from(state: &PhaseState) -> Self {
        match state {
            PhaseState::Initializing => SyncPhase::Initializing,
            PhaseState::FetchingContacts => SyncPhase::FetchingContacts,
            PhaseState::ProcessingPinned => SyncPhase::ProcessingPinned,
            PhaseState::UpdatingPins => SyncPhase::UpdatingPins,
            PhaseState::SortingContacts => SyncPhase::SortingContacts,
            PhaseState::Caching => SyncPhase::Caching,
            PhaseState::Complete => SyncPhase::Complete,
            PhaseState::Error => SyncPhase::Error,
        }
    }
}

/// Phase of the current run, advanced one step at a time.
pub(crate) struct PhaseTracker {
    machine: PhaseMachine,
}

impl PhaseTracker {
    pub(crate) fn new() -> Self {
        Self {
            machine: PhaseMachine::new(),
        }
    }

    pub(crate) fn phase(&self) -> SyncPhase {
        SyncPhase::from(self.machine.state())
    }

    /// Move to `next`, which must be the immediate successor.
    pub(crate) fn advance_to(&mut self, next: SyncPhase) -> SyncResult<()> {
        let from = self.phase();
        let mut probe = PhaseMachine::from_state(self.machine.state().clone());
        match probe.consume(&PhaseInput::Advance) {
            Ok(_) if SyncPhase::from(probe.state()) == next => {
                self.machine = probe;
                Ok(())
            }
            _ => Err(SyncError::PhaseOrder { from, to: next }),
        }
    }

    pub(crate) fn fail(&mut self) {
        let _ = self.machine.consume(&PhaseInput::Fail);
    }
}
