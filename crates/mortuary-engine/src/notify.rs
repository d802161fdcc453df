//! Staged notification fan-out
//!
//! Components stage notifications in an `Outbox` while a command runs; the
//! caller flushes it once the transaction has committed. Flushing is
//! best-effort: a failed publish is logged and dropped.

use mortuary_core::effects::{EventCategory, Notification, NotificationEffects, StaffRole};
use mortuary_core::CaseState;
use tracing::{debug, warn};

use crate::lifecycle::TransitionEvent;

/// Roles to alert when a case enters `state`
pub fn roles_for_state(state: CaseState) -> &'static [StaffRole] {
    match state {
        CaseState::OnWard => &[StaffRole::Nursing],
        CaseState::PendingPickup => &[StaffRole::AmbulanceTechnician],
        CaseState::InTransitToMortuary => &[StaffRole::MortuaryGuard],
        CaseState::PendingTrayAssignment => &[StaffRole::MortuaryGuard],
        CaseState::RejectedAtMortuary => &[
            StaffRole::Nursing,
            StaffRole::AmbulanceTechnician,
            StaffRole::OnCallPhysician,
        ],
        CaseState::InTray => &[StaffRole::AdmissionsClerk],
        CaseState::PendingRelease => &[StaffRole::AdmissionsClerk, StaffRole::MortuaryGuard],
        CaseState::Released => &[StaffRole::AdmissionsClerk, StaffRole::Nursing],
    }
}

/// `CaseStatusChanged` notification for a transition
pub fn status_changed(event: &TransitionEvent) -> Notification {
    Notification {
        category: EventCategory::CaseStatusChanged,
        payload: serde_json::json!({
            "case_id": event.case_id,
            "from": event.from,
            "to": event.to,
            "trigger": event.trigger,
            "at": event.at,
        }),
        target_roles: roles_for_state(event.to).to_vec(),
    }
}

/// Notifications staged during one command
#[derive(Debug, Clone, Default)]
pub struct Outbox {
    pending: Vec<Notification>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a notification
    pub fn push(&mut self, notification: Notification) {
        self.pending.push(notification);
    }

    /// Staged notifications, oldest first
    pub fn pending(&self) -> &[Notification] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop everything staged (used after a rollback)
    pub fn discard(&mut self) {
        if !self.pending.is_empty() {
            debug!(count = self.pending.len(), "Discarding staged notifications");
        }
        self.pending.clear();
    }

    /// Publish every staged notification, best-effort. Returns how many were delivered.
    pub async fn flush<N>(&mut self, notifier: &N) -> usize
    where
        N: NotificationEffects + ?Sized,
    {
        let mut delivered = 0;
        for notification in self.pending.drain(..) {
            match notifier.publish(&notification).await {
                Ok(()) => delivered += 1,
                Err(err) => {
                    warn!(
                        category = %notification.category,
                        error = %err,
                        "Notification delivery failed; dropping"
                    );
                }
            }
        }
        delivered
    }
}
