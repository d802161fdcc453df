//! Case lifecycle state machine
//!
//! A pure `(state, trigger) → state` lookup over a static table. `can_fire`
//! and `permitted_triggers` never mutate; `fire` is the only mutator and it
//! touches nothing but the case itself. Tray, ledger and gate coordination is
//! the caller's job, inside the caller's transaction.
//!
//! ```text
//! OnWard ─request_pickup→ PendingPickup ─accept_custody→ InTransitToMortuary
//! InTransitToMortuary ─verify_at_mortuary→ PendingTrayAssignment
//! InTransitToMortuary ─reject_verification→ RejectedAtMortuary ─apply_correction→ InTransitToMortuary
//! PendingTrayAssignment ─assign_tray→ InTray ─authorize_release→ PendingRelease ─register_departure→ Released
//! ```

use chrono::{DateTime, Utc};
use mortuary_core::{Case, CaseId, CaseState, MortuaryError, Result, Trigger};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Every permitted transition. Anything absent is invalid.
pub const TRANSITIONS: &[(CaseState, Trigger, CaseState)] = &[
    (
        CaseState::OnWard,
        Trigger::RequestPickup,
        CaseState::PendingPickup,
    ),
    (
        CaseState::PendingPickup,
        Trigger::AcceptCustody,
        CaseState::InTransitToMortuary,
    ),
    (
        CaseState::InTransitToMortuary,
        Trigger::VerifyAtMortuary,
        CaseState::PendingTrayAssignment,
    ),
    (
        CaseState::InTransitToMortuary,
        Trigger::RejectVerification,
        CaseState::RejectedAtMortuary,
    ),
    // Bounded cycle: a rejected hand-off goes back on the road once corrected
    (
        CaseState::RejectedAtMortuary,
        Trigger::ApplyCorrection,
        CaseState::InTransitToMortuary,
    ),
    (
        CaseState::PendingTrayAssignment,
        Trigger::AssignTray,
        CaseState::InTray,
    ),
    (
        CaseState::InTray,
        Trigger::AuthorizeRelease,
        CaseState::PendingRelease,
    ),
    (
        CaseState::PendingRelease,
        Trigger::RegisterDeparture,
        CaseState::Released,
    ),
];

/// Emitted by every successful `fire`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    pub case_id: CaseId,
    pub from: CaseState,
    pub to: CaseState,
    pub trigger: Trigger,
    pub at: DateTime<Utc>,
}

/// Stateless lifecycle engine
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleEngine;

impl LifecycleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Table destination for `(state, trigger)`, if the pair is permitted
    pub fn destination(state: CaseState, trigger: Trigger) -> Option<CaseState> {
        TRANSITIONS
            .iter()
            .find(|(from, t, _)| *from == state && *t == trigger)
            .map(|(_, _, to)| *to)
    }

    /// Whether `trigger` is permitted from the case's current state
    pub fn can_fire(&self, case: &Case, trigger: Trigger) -> bool {
        Self::destination(case.state, trigger).is_some()
    }

    /// Triggers permitted from the case's current state, in table order
    pub fn permitted_triggers(&self, case: &Case) -> Vec<Trigger> {
        Self::triggers_from(case.state)
    }

    /// Triggers permitted from `state`, in table order
    pub fn triggers_from(state: CaseState) -> Vec<Trigger> {
        TRANSITIONS
            .iter()
            .filter(|(from, _, _)| *from == state)
            .map(|(_, trigger, _)| *trigger)
            .collect()
    }

    /// Fail with `InvalidTransition` unless `trigger` is permitted
    pub fn ensure_can_fire(&self, case: &Case, trigger: Trigger) -> Result<CaseState> {
        Self::destination(case.state, trigger).ok_or_else(|| {
            MortuaryError::invalid_transition(case.state, trigger, self.permitted_triggers(case))
        })
    }

    /// Move the case to the table destination for `trigger`
    ///
    /// # Errors
    /// * `MortuaryError::InvalidTransition` if the pair is absent from the table;
    ///   the case is left untouched
    pub fn fire(
        &self,
        case: &mut Case,
        trigger: Trigger,
        at: DateTime<Utc>,
    ) -> Result<TransitionEvent> {
        let to = match self.ensure_can_fire(case, trigger) {
            Ok(to) => to,
            Err(err) => {
                warn!(case = %case.id, state = %case.state, %trigger, "Rejected transition");
                return Err(err);
            }
        };

        let from = case.state;
        case.state = to;
        case.updated_at = at;

        debug!(case = %case.id, %from, %to, %trigger, "Case transitioned");

        Ok(TransitionEvent {
            case_id: case.id,
            from,
            to,
            trigger,
            at,
        })
    }
}
