//! Custody ledger records and derived locations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifiers::{ActorId, CaseId, TransferId, TrayCode};

/// Immutable record of one physical hand-off. Never edited or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodyTransfer {
    /// Ledger entry identifier
    pub id: TransferId,
    /// Case whose body changed hands
    pub case_id: CaseId,
    /// Actor handing over
    pub from_actor: ActorId,
    /// Actor taking custody
    pub to_actor: ActorId,
    /// Free-text origin (ward, bay, vehicle)
    pub from_location: String,
    /// Free-text destination
    pub to_location: String,
    /// When the hand-off was recorded
    pub recorded_at: DateTime<Utc>,
    /// Operator notes
    pub notes: Option<String>,
}

/// Input for a new ledger entry; the ledger assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Case whose body changes hands
    pub case_id: CaseId,
    /// Actor handing over
    pub from_actor: ActorId,
    /// Actor taking custody
    pub to_actor: ActorId,
    /// Free-text origin
    pub from_location: String,
    /// Free-text destination
    pub to_location: String,
    /// Operator notes
    pub notes: Option<String>,
}

/// Coarse physical zone a body can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationZone {
    /// On the ward where death was declared
    Ward,
    /// Being moved to the mortuary
    InTransit,
    /// At the mortuary intake, not yet stored
    MortuaryReception,
    /// In cold storage
    MortuaryStorage,
    /// Left the hospital
    Departed,
}

impl fmt::Display for LocationZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LocationZone::Ward => "ward",
            LocationZone::InTransit => "in_transit",
            LocationZone::MortuaryReception => "mortuary_reception",
            LocationZone::MortuaryStorage => "mortuary_storage",
            LocationZone::Departed => "departed",
        };
        f.write_str(name)
    }
}

/// Where a case is now, derived from state and the latest hand-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentLocation {
    /// Zone implied by the case state
    pub zone: LocationZone,
    /// Destination recorded on the latest transfer, if any
    pub detail: Option<String>,
    /// Tray code while the case occupies a tray
    pub tray: Option<TrayCode>,
}

impl fmt::Display for CurrentLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.zone)?;
        if let Some(tray) = &self.tray {
            write!(f, " [{tray}]")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}
