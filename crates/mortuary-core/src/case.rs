//! Case record, lifecycle states and triggers
//!
//! ```text
//! OnWard → PendingPickup → InTransitToMortuary → PendingTrayAssignment → InTray → PendingRelease → Released
//!                                 ↑      ↓
//!                           RejectedAtMortuary
//! ```
//!
//! The transition table itself lives in the engine; this module only names the
//! vocabulary and the per-state properties that other components rely on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifiers::{ActorId, CaseCode, CaseId, TrayId};

/// Lifecycle state of a case. Exactly one at all times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    /// Death declared, body still on the ward
    OnWard,
    /// Ward has asked for the body to be collected
    PendingPickup,
    /// Ambulance technician holds the body on the way to the mortuary
    InTransitToMortuary,
    /// Mortuary verified the body and paperwork; waiting for a tray
    PendingTrayAssignment,
    /// Mortuary refused the hand-off until a correction is applied
    RejectedAtMortuary,
    /// Body occupies a storage tray
    InTray,
    /// Release authorized; waiting for the body to leave
    PendingRelease,
    /// Body left the hospital
    Released,
}

impl CaseState {
    /// Every state, in lifecycle order.
    pub const ALL: [CaseState; 8] = [
        CaseState::OnWard,
        CaseState::PendingPickup,
        CaseState::InTransitToMortuary,
        CaseState::PendingTrayAssignment,
        CaseState::RejectedAtMortuary,
        CaseState::InTray,
        CaseState::PendingRelease,
        CaseState::Released,
    ];

    /// Initial state of every new case
    pub fn initial() -> Self {
        CaseState::OnWard
    }

    /// Whether a case in this state must reference a tray
    pub fn occupies_tray(&self) -> bool {
        matches!(self, CaseState::InTray | CaseState::PendingRelease)
    }

    /// Whether no trigger leaves this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaseState::Released)
    }

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseState::OnWard => "on_ward",
            CaseState::PendingPickup => "pending_pickup",
            CaseState::InTransitToMortuary => "in_transit_to_mortuary",
            CaseState::PendingTrayAssignment => "pending_tray_assignment",
            CaseState::RejectedAtMortuary => "rejected_at_mortuary",
            CaseState::InTray => "in_tray",
            CaseState::PendingRelease => "pending_release",
            CaseState::Released => "released",
        }
    }
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named action that may advance a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// Nursing asks for the body to be collected
    RequestPickup,
    /// Ambulance technician takes physical custody
    AcceptCustody,
    /// Mortuary guard verifies body and paperwork
    VerifyAtMortuary,
    /// Mortuary guard refuses the hand-off
    RejectVerification,
    /// The rejection cause was fixed; hand-off retried
    ApplyCorrection,
    /// A tray was allocated to the case
    AssignTray,
    /// Admissions authorizes release
    AuthorizeRelease,
    /// The body left the mortuary
    RegisterDeparture,
}

impl Trigger {
    /// Every trigger
    pub const ALL: [Trigger; 8] = [
        Trigger::RequestPickup,
        Trigger::AcceptCustody,
        Trigger::VerifyAtMortuary,
        Trigger::RejectVerification,
        Trigger::ApplyCorrection,
        Trigger::AssignTray,
        Trigger::AuthorizeRelease,
        Trigger::RegisterDeparture,
    ];

    /// Triggers that require the release gates to be clear
    pub fn is_release_adjacent(&self) -> bool {
        matches!(self, Trigger::AuthorizeRelease | Trigger::RegisterDeparture)
    }

    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::RequestPickup => "request_pickup",
            Trigger::AcceptCustody => "accept_custody",
            Trigger::VerifyAtMortuary => "verify_at_mortuary",
            Trigger::RejectVerification => "reject_verification",
            Trigger::ApplyCorrection => "apply_correction",
            Trigger::AssignTray => "assign_tray",
            Trigger::AuthorizeRelease => "authorize_release",
            Trigger::RegisterDeparture => "register_departure",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrative record of a deceased patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Case {
    /// Case identifier
    pub id: CaseId,
    /// Human-readable code
    pub code: CaseCode,
    /// Current lifecycle state
    pub state: CaseState,
    /// Tray currently occupied, if any
    pub tray_id: Option<TrayId>,
    /// Actor who declared the case
    pub created_by: ActorId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time
    pub updated_at: DateTime<Utc>,
}

impl Case {
    /// Create a case in the initial state
    pub fn open(id: CaseId, code: CaseCode, created_by: ActorId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            code,
            state: CaseState::initial(),
            tray_id: None,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Tray reference is present iff the state implies occupancy
    pub fn tray_reference_consistent(&self) -> bool {
        self.state.occupies_tray() == self.tray_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tray_occupancy_states() {
        let occupying: Vec<_> = CaseState::ALL
            .iter()
            .filter(|s| s.occupies_tray())
            .collect();
        assert_eq!(occupying, vec![&CaseState::InTray, &CaseState::PendingRelease]);
    }

    #[test]
    fn test_only_released_is_terminal() {
        for state in CaseState::ALL {
            assert_eq!(state.is_terminal(), state == CaseState::Released);
        }
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&Trigger::RegisterDeparture).unwrap();
        assert_eq!(json, "\"register_departure\"");
        let state: CaseState = serde_json::from_str("\"rejected_at_mortuary\"").unwrap();
        assert_eq!(state.to_string(), "rejected_at_mortuary");
    }
}
