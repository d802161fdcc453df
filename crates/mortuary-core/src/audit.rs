//! Audit record vocabulary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::identifiers::{ActorId, AuditRecordId, CaseId};

/// Component that produced an audit record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditModule {
    /// Case state machine
    Lifecycle,
    /// Tray pool
    TrayPool,
    /// Custody ledger
    Custody,
    /// Release gates
    ReleaseGates,
}

impl fmt::Display for AuditModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditModule::Lifecycle => "lifecycle",
            AuditModule::TrayPool => "tray_pool",
            AuditModule::Custody => "custody",
            AuditModule::ReleaseGates => "release_gates",
        };
        f.write_str(name)
    }
}

/// Immutable audit trail entry. Snapshots are opaque JSON documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Record identifier
    pub id: AuditRecordId,
    /// Producing component
    pub module: AuditModule,
    /// Action name, e.g. `fire:assign_tray`
    pub action: String,
    /// Acting staff member
    pub actor: ActorId,
    /// Case the action concerned, if any
    pub case_id: Option<CaseId>,
    /// State before the action
    pub before: Option<serde_json::Value>,
    /// State after the action
    pub after: Option<serde_json::Value>,
    /// When the record was written
    pub recorded_at: DateTime<Utc>,
}
