//! Synchronization progress.

use serde::{Deserialize, Serialize};

/// Phase of a pipeline run. Forward-progressing within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    Initializing,
    FetchingContacts,
    ProcessingPinned,
    UpdatingPins,
    SortingContacts,
    Caching,
    Complete,
    Error,
}

impl SyncPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncPhase::Complete | SyncPhase::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncPhase::Initializing => "initializing",
            SyncPhase::FetchingContacts => "fetching_contacts",
            SyncPhase::ProcessingPinned => "processing_pinned",
            SyncPhase::UpdatingPins => "updating_pins",
            SyncPhase::SortingContacts => "sorting_contacts",
            SyncPhase::Caching => "caching",
            SyncPhase::Complete => "complete",
            SyncPhase::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Published pipeline progress plus the session-level sync flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub phase: SyncPhase,
    /// 0..=100
    pub percent: u8,
    pub contacts_fetched: bool,
    pub cache_fresh: bool,
    pub last_error: Option<String>,
}

impl Default for SyncProgress {
    fn default() -> Self {
        Self {
            phase: SyncPhase::Initializing,
            percent: 0,
            contacts_fetched: false,
            cache_fresh: false,
            last_error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_names_match_wire_format() {
        let phases = [
            (SyncPhase::Initializing, "initializing"),
            (SyncPhase::FetchingContacts, "fetching_contacts"),
            (SyncPhase::ProcessingPinned, "processing_pinned"),
            (SyncPhase::UpdatingPins, "updating_pins"),
            (SyncPhase::SortingContacts, "sorting_contacts"),
            (SyncPhase::Caching, "caching"),
            (SyncPhase::Complete, "complete"),
            (SyncPhase::Error, "error"),
        ];

        for (phase, name) in phases {
            assert_eq!(phase.as_str(), name);
            assert_eq!(serde_json::to_string(&phase).unwrap(), format!("\"{}\"", name));
        }
    }

    #[test]
    fn test_terminal_phases() {
        assert!(SyncPhase::Complete.is_terminal());
        assert!(SyncPhase::Error.is_terminal());
        assert!(!SyncPhase::Caching.is_terminal());
    }
}
