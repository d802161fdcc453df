//! Unified error system for the mortuary core
//!
//! Domain-rule violations (`InvalidTransition`, `ResourceUnavailable`,
//! `GateBlocked`, `DuplicateTransfer`) surface to the caller as typed variants.
//! Infrastructure failures from collaborators are carried through unchanged in
//! the `Storage`, `Notification` and `Time` variants; the core never retries.

use serde::{Deserialize, Serialize};

use crate::case::{CaseState, Trigger};
use crate::effects::RepositoryError;
use crate::gates::GateKind;
use crate::identifiers::{ActorId, CaseId, TrayId};
use crate::tray::TrayStatus;

/// Unified error type for all mortuary operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum MortuaryError {
    /// Trigger not permitted from the case's current state
    #[error("Invalid transition: {trigger} is not permitted from {current} (allowed: {})", format_triggers(.allowed))]
    InvalidTransition {
        /// State the case was in when the trigger was attempted
        current: CaseState,
        /// Trigger that was rejected
        trigger: Trigger,
        /// Triggers that are permitted from `current`
        allowed: Vec<Trigger>,
    },

    /// Tray was not `Available` at write time
    #[error("Tray {tray} is unavailable (status: {status})")]
    ResourceUnavailable {
        /// Tray that could not be allocated
        tray: TrayId,
        /// Status observed at write time
        status: TrayStatus,
    },

    /// An expected linked record is missing
    #[error("Data inconsistency: {message}")]
    DataInconsistency {
        /// Description of the missing link
        message: String,
    },

    /// Release denied while one or more gates block
    #[error("Release blocked by {} gate(s): {}", .blocking.len(), format_gates(.blocking))]
    GateBlocked {
        /// Gates that still block release
        blocking: Vec<GateKind>,
    },

    /// Same custodian re-scanned inside the duplicate window
    #[error("Duplicate custody transfer of case {case} to {to_actor} within {window_secs}s")]
    DuplicateTransfer {
        /// Case being transferred
        case: CaseId,
        /// Receiving actor of the rejected transfer
        to_actor: ActorId,
        /// Window length in seconds
        window_secs: u64,
    },

    /// Audit write failed (always caught and logged by the recorder)
    #[error("Audit write failure: {message}")]
    AuditWriteFailure {
        /// Underlying failure
        message: String,
    },

    /// Resource not found
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Repository operation failed; the collaborator's error is kept as-is
    #[error("Storage error: {source}")]
    Storage {
        /// Typed repository failure
        source: RepositoryError,
    },

    /// Notification delivery failed
    #[error("Notification error: {message}")]
    Notification {
        /// Error message describing the delivery failure
        message: String,
    },

    /// Clock collaborator failed
    #[error("Time error: {message}")]
    Time {
        /// Error message describing the clock failure
        message: String,
    },

    /// Configuration could not be loaded or validated
    #[error("Config error: {message}")]
    Config {
        /// Error message describing the configuration problem
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

fn format_triggers(triggers: &[Trigger]) -> String {
    if triggers.is_empty() {
        return "none".to_string();
    }
    triggers
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_gates(gates: &[GateKind]) -> String {
    gates
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl MortuaryError {
    /// Create an invalid transition error
    pub fn invalid_transition(current: CaseState, trigger: Trigger, allowed: Vec<Trigger>) -> Self {
        Self::InvalidTransition {
            current,
            trigger,
            allowed,
        }
    }

    /// Create a data inconsistency error
    pub fn data_inconsistency(message: impl Into<String>) -> Self {
        Self::DataInconsistency {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for domain-rule violations, `false` for infrastructure failures.
    pub fn is_domain_violation(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::ResourceUnavailable { .. }
                | Self::GateBlocked { .. }
                | Self::DuplicateTransfer { .. }
        )
    }
}

/// Standard Result type for mortuary operations
pub type Result<T> = std::result::Result<T, MortuaryError>;

impl From<RepositoryError> for MortuaryError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => Self::not_found(format!("{entity} {id}")),
            source => Self::Storage { source },
        }
    }
}

impl From<crate::effects::TimeError> for MortuaryError {
    fn from(err: crate::effects::TimeError) -> Self {
        Self::Time {
            message: err.to_string(),
        }
    }
}

impl From<crate::effects::NotificationError> for MortuaryError {
    fn from(err: crate::effects::NotificationError) -> Self {
        Self::Notification {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for MortuaryError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("serialization failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_message_lists_allowed() {
        let err = MortuaryError::invalid_transition(
            CaseState::OnWard,
            Trigger::AssignTray,
            vec![Trigger::RequestPickup],
        );
        assert_eq!(
            err.to_string(),
            "Invalid transition: assign_tray is not permitted from on_ward (allowed: request_pickup)"
        );
    }

    #[test]
    fn test_invalid_transition_from_terminal_state() {
        let err =
            MortuaryError::invalid_transition(CaseState::Released, Trigger::AssignTray, vec![]);
        assert!(err.to_string().ends_with("(allowed: none)"));
        assert!(err.is_domain_violation());
    }

    #[test]
    fn test_gate_blocked_message() {
        let err = MortuaryError::GateBlocked {
            blocking: vec![GateKind::BloodDebt, GateKind::LegalAuthorization],
        };
        assert_eq!(
            err.to_string(),
            "Release blocked by 2 gate(s): blood_debt, legal_authorization"
        );
    }

    #[test]
    fn test_repository_not_found_conversion() {
        let err = MortuaryError::from(RepositoryError::NotFound {
            entity: "case".to_string(),
            id: "case-1".to_string(),
        });
        assert!(matches!(err, MortuaryError::NotFound { .. }));
        assert!(!err.is_domain_violation());
    }

    #[test]
    fn test_repository_failure_keeps_its_variant() {
        let err = MortuaryError::from(RepositoryError::Transaction {
            reason: "transaction already open".to_string(),
        });
        assert_eq!(
            err,
            MortuaryError::Storage {
                source: RepositoryError::Transaction {
                    reason: "transaction already open".to_string(),
                }
            }
        );
        assert_eq!(
            err.to_string(),
            "Storage error: Transaction error: transaction already open"
        );
        assert!(std::error::Error::source(&err).is_some());

        let json = serde_json::to_value(&err).unwrap();
        let back: MortuaryError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }
}
