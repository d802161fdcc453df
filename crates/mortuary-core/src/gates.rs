//! Release gate vocabulary
//!
//! A gate is an independent yes/no condition that must clear before a case may
//! be released. The core only consumes `blocks_release`; how a gate reaches its
//! answer (debt accounting, document checks, prosecutor approval) belongs to
//! the gate's owner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::Result;
use crate::identifiers::{CaseId, ObligationId};

/// Kind of release gate. One instance per kind per case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Blood units owed to the blood bank
    BloodDebt,
    /// Unpaid hospital charges
    FinancialDebt,
    /// Death certificate and identity paperwork
    DocumentCompleteness,
    /// Police or prosecutor clearance for forensic cases
    LegalAuthorization,
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GateKind::BloodDebt => "blood_debt",
            GateKind::FinancialDebt => "financial_debt",
            GateKind::DocumentCompleteness => "document_completeness",
            GateKind::LegalAuthorization => "legal_authorization",
        };
        f.write_str(name)
    }
}

/// Externally owned blocking condition
#[async_trait]
pub trait ReleaseGate: Send + Sync {
    /// Which gate this is
    fn kind(&self) -> GateKind;

    /// Whether this gate currently blocks release of the case
    async fn blocks_release(&self, case_id: CaseId) -> Result<bool>;

    /// Human-readable status for display
    async fn status_label(&self, case_id: CaseId) -> Result<String>;
}

/// One gate's answer for one case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateReading {
    /// Gate kind
    pub kind: GateKind,
    /// Whether it blocks release
    pub blocks: bool,
    /// Display label
    pub status: String,
}

/// Status of a single obligation record behind a gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObligationStatus {
    /// Outstanding
    Pending,
    /// Paid, returned or supplied
    Settled,
    /// Waived by an authorized person
    Exempted,
}

impl ObligationStatus {
    /// Only outstanding obligations block
    pub fn blocks_release(&self) -> bool {
        matches!(self, ObligationStatus::Pending)
    }
}

/// A debt, document or legal requirement attached to a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Obligation {
    /// Obligation identifier
    pub id: ObligationId,
    /// Case it is attached to
    pub case_id: CaseId,
    /// Gate the obligation belongs to
    pub gate: GateKind,
    /// Current status
    pub status: ObligationStatus,
    /// Short description shown to clerks
    pub description: String,
    /// Last change
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_blocks() {
        assert!(ObligationStatus::Pending.blocks_release());
        assert!(!ObligationStatus::Settled.blocks_release());
        assert!(!ObligationStatus::Exempted.blocks_release());
    }
}
