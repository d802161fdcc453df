//! Per-entity repository collaborators
//!
//! Each repository exposes only lookups by id or foreign key plus create and
//! update. All calls run inside the caller's transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audit::AuditRecord;
use crate::case::Case;
use crate::custody::CustodyTransfer;
use crate::gates::{GateKind, Obligation};
use crate::identifiers::{CaseId, ObligationId, TrayCode, TrayId};
use crate::tray::{Tray, TrayStatus};

/// Error type for repository operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: String, id: String },
    #[error("Transaction error: {reason}")]
    Transaction { reason: String },
    #[error("Backend failure: {reason}")]
    Backend { reason: String },
}

impl RepositoryError {
    pub fn not_found(entity: &str, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &str, id: impl ToString) -> Self {
        Self::AlreadyExists {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    /// Create a backend failure
    pub fn backend(reason: impl Into<String>) -> Self {
        Self::Backend {
            reason: reason.into(),
        }
    }
}

/// Case records
#[async_trait]
pub trait CaseRepository: Send + Sync {
    async fn get_case(&self, id: CaseId) -> Result<Option<Case>, RepositoryError>;
    async fn create_case(&self, case: &Case) -> Result<(), RepositoryError>;
    async fn update_case(&self, case: &Case) -> Result<(), RepositoryError>;
}

/// Tray inventory
#[async_trait]
pub trait TrayRepository: Send + Sync {
    async fn get_tray(&self, id: TrayId) -> Result<Option<Tray>, RepositoryError>;
    async fn find_tray_by_case(&self, case_id: CaseId) -> Result<Option<Tray>, RepositoryError>;
    async fn find_tray_by_code(&self, code: &TrayCode) -> Result<Option<Tray>, RepositoryError>;
    async fn list_trays(&self) -> Result<Vec<Tray>, RepositoryError>;
    async fn create_tray(&self, tray: &Tray) -> Result<(), RepositoryError>;
    async fn update_tray(&self, tray: &Tray) -> Result<(), RepositoryError>;

    /// Compare-and-set write: persist `tray` only if the stored status still
    /// equals `expected`. Returns `false` when the stored status differs.
    async fn update_tray_if_status(
        &self,
        tray: &Tray,
        expected: TrayStatus,
    ) -> Result<bool, RepositoryError>;
}

/// Append-only custody ledger
#[async_trait]
pub trait CustodyRepository: Send + Sync {
    async fn append_transfer(&self, transfer: &CustodyTransfer) -> Result<(), RepositoryError>;

    /// All transfers for a case, oldest first
    async fn transfers_for_case(
        &self,
        case_id: CaseId,
    ) -> Result<Vec<CustodyTransfer>, RepositoryError>;
}

/// Debt, document and legal obligations behind the release gates
#[async_trait]
pub trait ObligationRepository: Send + Sync {
    async fn get_obligation(&self, id: ObligationId)
        -> Result<Option<Obligation>, RepositoryError>;
    async fn obligations_for_case(
        &self,
        case_id: CaseId,
        gate: GateKind,
    ) -> Result<Vec<Obligation>, RepositoryError>;
    async fn create_obligation(&self, obligation: &Obligation) -> Result<(), RepositoryError>;
    async fn update_obligation(&self, obligation: &Obligation) -> Result<(), RepositoryError>;
}

/// Append-only audit trail
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), RepositoryError>;
    async fn audit_for_case(&self, case_id: CaseId) -> Result<Vec<AuditRecord>, RepositoryError>;
}
