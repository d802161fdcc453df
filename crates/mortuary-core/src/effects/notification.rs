//! Best-effort push notifications
//!
//! Delivery is fire-and-forget from the core's perspective: a failed publish
//! is logged by the caller and never rolled back into the domain transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Staff role a notification is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffRole {
    Nursing,
    AmbulanceTechnician,
    MortuaryGuard,
    AdmissionsClerk,
    OnCallPhysician,
    LegalAuthority,
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StaffRole::Nursing => "nursing",
            StaffRole::AmbulanceTechnician => "ambulance_technician",
            StaffRole::MortuaryGuard => "mortuary_guard",
            StaffRole::AdmissionsClerk => "admissions_clerk",
            StaffRole::OnCallPhysician => "on_call_physician",
            StaffRole::LegalAuthority => "legal_authority",
        };
        f.write_str(name)
    }
}

/// Category of a published event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// A case moved to a new lifecycle state
    CaseStatusChanged,
    /// Tray occupancy went above the alert threshold
    OccupancyAlert,
    /// Every release gate for a case is clear
    ReleaseFullyUnblocked,
    /// One gate cleared, others still block
    ReleasePartiallyUnblocked,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventCategory::CaseStatusChanged => "case_status_changed",
            EventCategory::OccupancyAlert => "occupancy_alert",
            EventCategory::ReleaseFullyUnblocked => "release_fully_unblocked",
            EventCategory::ReleasePartiallyUnblocked => "release_partially_unblocked",
        };
        f.write_str(name)
    }
}

/// One event for fan-out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub category: EventCategory,
    pub payload: serde_json::Value,
    pub target_roles: Vec<StaffRole>,
}

/// Error type for notification delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotificationError {
    #[error("Delivery failed: {reason}")]
    DeliveryFailed { reason: String },
    #[error("Notification channel unavailable")]
    Unavailable,
}

#[async_trait]
pub trait NotificationEffects: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<(), NotificationError>;
}
