//! Composite test effect system
//!
//! Bundles the memory store, manual clock, sequential id source and recording
//! notifier behind every effect trait so one value can be handed to the engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mortuary_core::effects::{
    AuditRepository, CaseRepository, CustodyRepository, Notification, NotificationEffects,
    NotificationError, ObligationRepository, PhysicalTimeEffects, RandomEffects, RepositoryError,
    TimeError, TransactionEffects, TrayRepository,
};
use mortuary_core::{
    AuditRecord, Case, CaseId, CustodyTransfer, GateKind, Obligation, ObligationId, Tray,
    TrayCode, TrayId, TrayStatus,
};

use crate::ids::SequentialIds;
use crate::notifier::RecordingNotifier;
use crate::store::MemoryStore;
use crate::time::ManualClock;

/// Shared-state test effects; clones observe the same store, clock, ids and outbox
#[derive(Debug, Clone, Default)]
pub struct TestEffects {
    pub store: MemoryStore,
    pub clock: ManualClock,
    pub ids: SequentialIds,
    pub notifier: RecordingNotifier,
}

impl TestEffects {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CaseRepository for TestEffects {
    async fn get_case(&self, id: CaseId) -> Result<Option<Case>, RepositoryError> {
        self.store.get_case(id).await
    }

    async fn create_case(&self, case: &Case) -> Result<(), RepositoryError> {
        self.store.create_case(case).await
    }

    async fn update_case(&self, case: &Case) -> Result<(), RepositoryError> {
        self.store.update_case(case).await
    }
}

#[async_trait]
impl TrayRepository for TestEffects {
    async fn get_tray(&self, id: TrayId) -> Result<Option<Tray>, RepositoryError> {
        self.store.get_tray(id).await
    }

    async fn find_tray_by_case(&self, case_id: CaseId) -> Result<Option<Tray>, RepositoryError> {
        self.store.find_tray_by_case(case_id).await
    }

    async fn find_tray_by_code(&self, code: &TrayCode) -> Result<Option<Tray>, RepositoryError> {
        self.store.find_tray_by_code(code).await
    }

    async fn list_trays(&self) -> Result<Vec<Tray>, RepositoryError> {
        self.store.list_trays().await
    }

    async fn create_tray(&self, tray: &Tray) -> Result<(), RepositoryError> {
        self.store.create_tray(tray).await
    }

    async fn update_tray(&self, tray: &Tray) -> Result<(), RepositoryError> {
        self.store.update_tray(tray).await
    }

    async fn update_tray_if_status(
        &self,
        tray: &Tray,
        expected: TrayStatus,
    ) -> Result<bool, RepositoryError> {
        self.store.update_tray_if_status(tray, expected).await
    }
}

#[async_trait]
impl CustodyRepository for TestEffects {
    async fn append_transfer(&self, transfer: &CustodyTransfer) -> Result<(), RepositoryError> {
        self.store.append_transfer(transfer).await
    }

    async fn transfers_for_case(
        &self,
        case_id: CaseId,
    ) -> Result<Vec<CustodyTransfer>, RepositoryError> {
        self.store.transfers_for_case(case_id).await
    }
}

#[async_trait]
impl ObligationRepository for TestEffects {
    async fn get_obligation(
        &self,
        id: ObligationId,
    ) -> Result<Option<Obligation>, RepositoryError> {
        self.store.get_obligation(id).await
    }

    async fn obligations_for_case(
        &self,
        case_id: CaseId,
        gate: GateKind,
    ) -> Result<Vec<Obligation>, RepositoryError> {
        self.store.obligations_for_case(case_id, gate).await
    }

    async fn create_obligation(&self, obligation: &Obligation) -> Result<(), RepositoryError> {
        self.store.create_obligation(obligation).await
    }

    async fn update_obligation(&self, obligation: &Obligation) -> Result<(), RepositoryError> {
        self.store.update_obligation(obligation).await
    }
}

#[async_trait]
impl AuditRepository for TestEffects {
    async fn append_audit(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        self.store.append_audit(record).await
    }

    async fn audit_for_case(&self, case_id: CaseId) -> Result<Vec<AuditRecord>, RepositoryError> {
        self.store.audit_for_case(case_id).await
    }
}

#[async_trait]
impl NotificationEffects for TestEffects {
    async fn publish(&self, notification: &Notification) -> Result<(), NotificationError> {
        self.notifier.publish(notification).await
    }
}

#[async_trait]
impl PhysicalTimeEffects for TestEffects {
    async fn physical_time(&self) -> Result<DateTime<Utc>, TimeError> {
        self.clock.physical_time().await
    }
}

#[async_trait]
impl RandomEffects for TestEffects {
    async fn random_uuid(&self) -> uuid::Uuid {
        self.ids.random_uuid().await
    }
}

#[async_trait]
impl TransactionEffects for TestEffects {
    async fn begin(&self) -> Result<(), RepositoryError> {
        self.store.begin().await
    }

    async fn commit(&self) -> Result<(), RepositoryError> {
        self.store.commit().await
    }

    async fn rollback(&self) -> Result<(), RepositoryError> {
        self.store.rollback().await
    }
}
