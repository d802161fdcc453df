//! Storage tray records and occupancy statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifiers::{ActorId, CaseId, TrayCode, TrayId};

/// Physical status of a tray
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrayStatus {
    /// Free for allocation
    Available,
    /// Holds a case
    Occupied,
    /// Temporarily withdrawn for cleaning or repair
    Maintenance,
    /// Withdrawn until further notice
    OutOfService,
}

impl TrayStatus {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            TrayStatus::Available => "available",
            TrayStatus::Occupied => "occupied",
            TrayStatus::Maintenance => "maintenance",
            TrayStatus::OutOfService => "out_of_service",
        }
    }
}

impl fmt::Display for TrayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who touched the tray and when
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrayStamp {
    /// Acting staff member
    pub actor: ActorId,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// One slot of fixed mortuary storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tray {
    /// Tray identifier
    pub id: TrayId,
    /// Stencilled code
    pub code: TrayCode,
    /// Current status
    pub status: TrayStatus,
    /// Case occupying the tray
    pub occupied_by: Option<CaseId>,
    /// Last allocation
    pub last_assigned: Option<TrayStamp>,
    /// Last release
    pub last_released: Option<TrayStamp>,
}

impl Tray {
    /// Provision a new, available tray
    pub fn provision(id: TrayId, code: TrayCode) -> Self {
        Self {
            id,
            code,
            status: TrayStatus::Available,
            occupied_by: None,
            last_assigned: None,
            last_released: None,
        }
    }

    /// `Occupied` iff an occupying case is recorded
    pub fn occupancy_consistent(&self) -> bool {
        (self.status == TrayStatus::Occupied) == self.occupied_by.is_some()
    }
}

/// Snapshot of tray inventory, recomputed on demand
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OccupancyStats {
    /// Total trays in inventory
    pub total: usize,
    /// Trays free for allocation
    pub available: usize,
    /// Trays holding a case
    pub occupied: usize,
    /// Trays under maintenance
    pub maintenance: usize,
    /// Trays out of service
    pub out_of_service: usize,
    /// occupied / total × 100, 0 for an empty inventory
    pub occupancy_percent: f64,
    /// Threshold the percentage was compared against
    pub alert_threshold_percent: f64,
}

impl OccupancyStats {
    /// Count trays by status against the given alert threshold
    pub fn compute<'a>(trays: impl IntoIterator<Item = &'a Tray>, threshold: f64) -> Self {
        let mut stats = Self {
            total: 0,
            available: 0,
            occupied: 0,
            maintenance: 0,
            out_of_service: 0,
            occupancy_percent: 0.0,
            alert_threshold_percent: threshold,
        };
        for tray in trays {
            stats.total += 1;
            match tray.status {
                TrayStatus::Available => stats.available += 1,
                TrayStatus::Occupied => stats.occupied += 1,
                TrayStatus::Maintenance => stats.maintenance += 1,
                TrayStatus::OutOfService => stats.out_of_service += 1,
            }
        }
        if stats.total > 0 {
            stats.occupancy_percent = stats.occupied as f64 * 100.0 / stats.total as f64;
        }
        stats
    }

    /// Alert only when strictly above the threshold
    pub fn alert(&self) -> bool {
        self.occupancy_percent > self.alert_threshold_percent
    }
}
