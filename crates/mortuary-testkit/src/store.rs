//! In-memory repository handlers
//!
//! One `MemoryStore` backs every repository trait plus the transaction
//! boundary. Tables live behind an `Arc<RwLock<_>>` so clones share state;
//! `begin` takes a snapshot that `rollback` restores.

use async_lock::{Mutex, RwLock};
use async_trait::async_trait;
use mortuary_core::effects::{
    AuditRepository, CaseRepository, CustodyRepository, ObligationRepository, RepositoryError,
    TransactionEffects, TrayRepository,
};
use mortuary_core::{
    AuditRecord, Case, CaseId, CustodyTransfer, GateKind, Obligation, ObligationId, Tray,
    TrayCode, TrayId, TrayStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct Tables {
    cases: HashMap<CaseId, Case>,
    trays: HashMap<TrayId, Tray>,
    transfers: Vec<CustodyTransfer>,
    obligations: HashMap<ObligationId, Obligation>,
    audit: Vec<AuditRecord>,
}

/// Switches that make selected writes fail with a backend error
#[derive(Debug, Default)]
pub struct FailurePoints {
    pub audit_writes: AtomicBool,
    pub custody_writes: AtomicBool,
    pub case_updates: AtomicBool,
    pub tray_updates: AtomicBool,
    /// One-shot: another case occupies the tray right before the next
    /// compare-and-set tray write
    pub competing_allocation: AtomicBool,
}

impl FailurePoints {
    fn check(flag: &AtomicBool, what: &str) -> Result<(), RepositoryError> {
        if flag.load(Ordering::SeqCst) {
            Err(RepositoryError::backend(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

/// Memory-backed store for testing
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    snapshot: Arc<Mutex<Option<Tables>>>,
    failures: Arc<FailurePoints>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure injection switches
    pub fn failures(&self) -> &FailurePoints {
        &self.failures
    }

    /// Number of audit records written (for testing)
    pub async fn audit_count(&self) -> usize {
        self.tables.read().await.audit.len()
    }

    /// Every audit record, oldest first (for testing)
    pub async fn all_audit_records(&self) -> Vec<AuditRecord> {
        self.tables.read().await.audit.clone()
    }

    /// Whether a transaction is open
    pub async fn in_transaction(&self) -> bool {
        self.snapshot.lock().await.is_some()
    }
}

#[async_trait]
impl CaseRepository for MemoryStore {
    async fn get_case(&self, id: CaseId) -> Result<Option<Case>, RepositoryError> {
        Ok(self.tables.read().await.cases.get(&id).cloned())
    }

    async fn create_case(&self, case: &Case) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.cases.contains_key(&case.id) {
            return Err(RepositoryError::already_exists("case", case.id));
        }
        tables.cases.insert(case.id, case.clone());
        Ok(())
    }

    async fn update_case(&self, case: &Case) -> Result<(), RepositoryError> {
        FailurePoints::check(&self.failures.case_updates, "case update")?;
        let mut tables = self.tables.write().await;
        match tables.cases.get_mut(&case.id) {
            Some(stored) => {
                *stored = case.clone();
                Ok(())
            }
            None => Err(RepositoryError::not_found("case", case.id)),
        }
    }
}

#[async_trait]
impl TrayRepository for MemoryStore {
    async fn get_tray(&self, id: TrayId) -> Result<Option<Tray>, RepositoryError> {
        Ok(self.tables.read().await.trays.get(&id).cloned())
    }

    async fn find_tray_by_case(&self, case_id: CaseId) -> Result<Option<Tray>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .trays
            .values()
            .find(|tray| tray.occupied_by == Some(case_id))
            .cloned())
    }

    async fn find_tray_by_code(&self, code: &TrayCode) -> Result<Option<Tray>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.trays.values().find(|tray| &tray.code == code).cloned())
    }

    async fn list_trays(&self) -> Result<Vec<Tray>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut trays: Vec<Tray> = tables.trays.values().cloned().collect();
        trays.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(trays)
    }

    async fn create_tray(&self, tray: &Tray) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.trays.contains_key(&tray.id) {
            return Err(RepositoryError::already_exists("tray", tray.id));
        }
        tables.trays.insert(tray.id, tray.clone());
        Ok(())
    }

    async fn update_tray(&self, tray: &Tray) -> Result<(), RepositoryError> {
        FailurePoints::check(&self.failures.tray_updates, "tray update")?;
        let mut tables = self.tables.write().await;
        match tables.trays.get_mut(&tray.id) {
            Some(stored) => {
                *stored = tray.clone();
                Ok(())
            }
            None => Err(RepositoryError::not_found("tray", tray.id)),
        }
    }

    async fn update_tray_if_status(
        &self,
        tray: &Tray,
        expected: TrayStatus,
    ) -> Result<bool, RepositoryError> {
        FailurePoints::check(&self.failures.tray_updates, "tray update")?;
        let mut tables = self.tables.write().await;
        if self
            .failures
            .competing_allocation
            .swap(false, Ordering::SeqCst)
        {
            if let Some(stored) = tables.trays.get_mut(&tray.id) {
                stored.status = TrayStatus::Occupied;
                stored.occupied_by = Some(CaseId::new());
            }
        }
        match tables.trays.get_mut(&tray.id) {
            Some(stored) if stored.status == expected => {
                *stored = tray.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(RepositoryError::not_found("tray", tray.id)),
        }
    }
}

#[async_trait]
impl CustodyRepository for MemoryStore {
    async fn append_transfer(&self, transfer: &CustodyTransfer) -> Result<(), RepositoryError> {
        FailurePoints::check(&self.failures.custody_writes, "custody write")?;
        self.tables.write().await.transfers.push(transfer.clone());
        Ok(())
    }

    async fn transfers_for_case(
        &self,
        case_id: CaseId,
    ) -> Result<Vec<CustodyTransfer>, RepositoryError> {
        let tables = self.tables.read().await;
        let mut transfers: Vec<CustodyTransfer> = tables
            .transfers
            .iter()
            .filter(|t| t.case_id == case_id)
            .cloned()
            .collect();
        // Stable: equal timestamps keep append order
        transfers.sort_by_key(|t| t.recorded_at);
        Ok(transfers)
    }
}

#[async_trait]
impl ObligationRepository for MemoryStore {
    async fn get_obligation(
        &self,
        id: ObligationId,
    ) -> Result<Option<Obligation>, RepositoryError> {
        Ok(self.tables.read().await.obligations.get(&id).cloned())
    }

    async fn obligations_for_case(
        &self,
        case_id: CaseId,
        gate: GateKind,
    ) -> Result<Vec<Obligation>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .obligations
            .values()
            .filter(|o| o.case_id == case_id && o.gate == gate)
            .cloned()
            .collect())
    }

    async fn create_obligation(&self, obligation: &Obligation) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        if tables.obligations.contains_key(&obligation.id) {
            return Err(RepositoryError::already_exists("obligation", obligation.id));
        }
        tables.obligations.insert(obligation.id, obligation.clone());
        Ok(())
    }

    async fn update_obligation(&self, obligation: &Obligation) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write().await;
        match tables.obligations.get_mut(&obligation.id) {
            Some(stored) => {
                *stored = obligation.clone();
                Ok(())
            }
            None => Err(RepositoryError::not_found("obligation", obligation.id)),
        }
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        FailurePoints::check(&self.failures.audit_writes, "audit write")?;
        self.tables.write().await.audit.push(record.clone());
        Ok(())
    }

    async fn audit_for_case(&self, case_id: CaseId) -> Result<Vec<AuditRecord>, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables
            .audit
            .iter()
            .filter(|r| r.case_id == Some(case_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl TransactionEffects for MemoryStore {
    async fn begin(&self) -> Result<(), RepositoryError> {
        let mut snapshot = self.snapshot.lock().await;
        if snapshot.is_some() {
            return Err(RepositoryError::Transaction {
                reason: "transaction already open".to_string(),
            });
        }
        *snapshot = Some(self.tables.read().await.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<(), RepositoryError> {
        match self.snapshot.lock().await.take() {
            Some(_) => Ok(()),
            None => Err(RepositoryError::Transaction {
                reason: "commit without open transaction".to_string(),
            }),
        }
    }

    async fn rollback(&self) -> Result<(), RepositoryError> {
        match self.snapshot.lock().await.take() {
            Some(saved) => {
                *self.tables.write().await = saved;
                Ok(())
            }
            None => Err(RepositoryError::Transaction {
                reason: "rollback without open transaction".to_string(),
            }),
        }
    }
}
