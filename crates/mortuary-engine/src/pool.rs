//! Tray resource pool
//!
//! Fixed inventory of storage trays. Status flips go through the repository's
//! compare-and-set write so that availability is re-checked at write time,
//! inside the same transaction as the flip. Occupancy is recomputed from the
//! inventory on every allocation (push model) rather than kept as a counter.

use mortuary_core::effects::{
    AuditRepository, EventCategory, Notification, PhysicalTimeEffects, RandomEffects, StaffRole,
    TrayRepository,
};
use mortuary_core::{
    ActorId, AuditModule, Case, MortuaryConfig, MortuaryError, OccupancyStats, Result, Tray,
    TrayCode, TrayId, TrayStamp, TrayStatus,
};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEntry, AuditRecorder};
use crate::notify::Outbox;

/// Result of a successful allocation
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Tray as written
    pub tray: Tray,
    /// Occupancy recomputed right after the write
    pub stats: OccupancyStats,
}

/// Stateless tray pool manager
#[derive(Debug, Clone)]
pub struct TrayPool {
    alert_threshold_percent: f64,
    audit: AuditRecorder,
}

impl Default for TrayPool {
    fn default() -> Self {
        Self::new(&MortuaryConfig::default())
    }
}

impl TrayPool {
    pub fn new(config: &MortuaryConfig) -> Self {
        Self {
            alert_threshold_percent: config.occupancy_alert_threshold_percent,
            audit: AuditRecorder::new(),
        }
    }

    async fn load<E>(effects: &E, tray_id: TrayId) -> Result<Tray>
    where
        E: TrayRepository + ?Sized,
    {
        effects
            .get_tray(tray_id)
            .await?
            .ok_or_else(|| MortuaryError::not_found(format!("Tray not found: {tray_id}")))
    }

    /// Add a tray to the inventory at provisioning time
    pub async fn provision<E>(&self, effects: &E, code: TrayCode, actor: ActorId) -> Result<Tray>
    where
        E: TrayRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        if effects.find_tray_by_code(&code).await?.is_some() {
            return Err(MortuaryError::invalid(format!(
                "Tray code already provisioned: {code}"
            )));
        }

        let tray_id = TrayId::from_uuid(effects.random_uuid().await);
        let tray = Tray::provision(tray_id, code);
        effects.create_tray(&tray).await?;
        info!(tray = %tray.id, code = %tray.code, "Tray provisioned");

        self.audit
            .record(
                effects,
                AuditEntry::new(AuditModule::TrayPool, "provision", actor).after(&tray),
            )
            .await;
        Ok(tray)
    }

    /// Allocate an available tray to a case
    ///
    /// Sets `case.tray_id` in memory; the caller persists the case in the same
    /// transaction. Stages an `OccupancyAlert` when occupancy strictly exceeds
    /// the configured threshold after the write.
    ///
    /// # Errors
    /// * `MortuaryError::ResourceUnavailable` if the tray is not `Available` at write time
    /// * `MortuaryError::Invalid` if the case already references a tray
    pub async fn allocate<E>(
        &self,
        effects: &E,
        tray_id: TrayId,
        case: &mut Case,
        actor: ActorId,
        outbox: &mut Outbox,
    ) -> Result<Allocation>
    where
        E: TrayRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        if let Some(current) = case.tray_id {
            return Err(MortuaryError::invalid(format!(
                "Case {} already occupies {current}",
                case.id
            )));
        }

        let before = Self::load(effects, tray_id).await?;
        if before.status != TrayStatus::Available {
            return Err(MortuaryError::ResourceUnavailable {
                tray: tray_id,
                status: before.status,
            });
        }

        let now = effects.physical_time().await?;
        let mut tray = before.clone();
        tray.status = TrayStatus::Occupied;
        tray.occupied_by = Some(case.id);
        tray.last_assigned = Some(TrayStamp { actor, at: now });

        // Compare-and-set: a concurrent allocation may have won since the read
        if !effects
            .update_tray_if_status(&tray, TrayStatus::Available)
            .await?
        {
            let observed = Self::load(effects, tray_id).await?.status;
            warn!(tray = %tray_id, case = %case.id, status = %observed, "Lost allocation race");
            return Err(MortuaryError::ResourceUnavailable {
                tray: tray_id,
                status: observed,
            });
        }

        case.tray_id = Some(tray.id);
        info!(tray = %tray.id, code = %tray.code, case = %case.id, "Tray allocated");

        self.audit
            .record(
                effects,
                AuditEntry::new(AuditModule::TrayPool, "allocate", actor)
                    .for_case(case.id)
                    .before(&before)
                    .after(&tray),
            )
            .await;

        let stats = self.occupancy_stats(effects).await?;
        if stats.alert() {
            warn!(
                occupied = stats.occupied,
                total = stats.total,
                percent = stats.occupancy_percent,
                "Tray occupancy above alert threshold"
            );
            outbox.push(Self::occupancy_alert(&stats));
        }

        Ok(Allocation { tray, stats })
    }

    /// Free the tray occupied by a case
    ///
    /// Clears `case.tray_id` in memory and the tray's occupant in the store.
    /// If no tray claims the case the drift is logged as a `DataInconsistency`
    /// and the release proceeds with `Ok(None)`.
    pub async fn release<E>(
        &self,
        effects: &E,
        case: &mut Case,
        actor: ActorId,
    ) -> Result<Option<Tray>>
    where
        E: TrayRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        let Some(before) = effects.find_tray_by_case(case.id).await? else {
            let drift = MortuaryError::data_inconsistency(format!(
                "no tray is occupied by case {} (case references {:?})",
                case.id, case.tray_id
            ));
            error!(case = %case.id, error = %drift, "Tray release found no occupied tray");
            case.tray_id = None;
            return Ok(None);
        };

        if case.tray_id != Some(before.id) {
            let drift = MortuaryError::data_inconsistency(format!(
                "tray {} is occupied by case {} but the case references {:?}",
                before.id, case.id, case.tray_id
            ));
            error!(case = %case.id, tray = %before.id, error = %drift, "Tray back-reference mismatch");
        }

        let now = effects.physical_time().await?;
        let mut tray = before.clone();
        tray.status = TrayStatus::Available;
        tray.occupied_by = None;
        tray.last_released = Some(TrayStamp { actor, at: now });
        effects.update_tray(&tray).await?;
        case.tray_id = None;

        info!(tray = %tray.id, code = %tray.code, case = %case.id, "Tray released");

        self.audit
            .record(
                effects,
                AuditEntry::new(AuditModule::TrayPool, "release", actor)
                    .for_case(case.id)
                    .before(&before)
                    .after(&tray),
            )
            .await;
        Ok(Some(tray))
    }

    /// Free a tray without a case-driven trigger
    ///
    /// Recovery path only. The occupying case is neither re-validated nor
    /// updated, so it may keep referencing a tray that now reports itself
    /// `Available`; this is logged and flagged in the audit record.
    pub async fn manual_release<E>(
        &self,
        effects: &E,
        tray_id: TrayId,
        actor: ActorId,
        reason: &str,
    ) -> Result<Tray>
    where
        E: TrayRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(MortuaryError::invalid("manual release requires a reason"));
        }

        let before = Self::load(effects, tray_id).await?;
        if before.status != TrayStatus::Occupied {
            return Err(MortuaryError::invalid(format!(
                "Tray {tray_id} is {} and cannot be manually released",
                before.status
            )));
        }

        let now = effects.physical_time().await?;
        let mut tray = before.clone();
        tray.status = TrayStatus::Available;
        tray.occupied_by = None;
        tray.last_released = Some(TrayStamp { actor, at: now });
        effects.update_tray(&tray).await?;

        warn!(
            tray = %tray.id,
            code = %tray.code,
            stale_case = ?before.occupied_by,
            %actor,
            reason,
            "Tray manually released; occupying case was not updated"
        );

        let mut entry = AuditEntry::new(AuditModule::TrayPool, "manual_release", actor)
            .before(&before)
            .after(&serde_json::json!({
                "tray": tray,
                "reason": reason,
                "stale_case_reference": before.occupied_by,
            }));
        if let Some(case_id) = before.occupied_by {
            entry = entry.for_case(case_id);
        }
        self.audit.record(effects, entry).await;

        Ok(tray)
    }

    /// Withdraw a tray for maintenance; only from `Available` or `OutOfService`
    pub async fn start_maintenance<E>(
        &self,
        effects: &E,
        tray_id: TrayId,
        actor: ActorId,
    ) -> Result<Tray>
    where
        E: TrayRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        self.change_status(
            effects,
            tray_id,
            actor,
            &[TrayStatus::Available, TrayStatus::OutOfService],
            TrayStatus::Maintenance,
            "start_maintenance",
            None,
        )
        .await
    }

    /// Return a tray from maintenance to `Available`
    pub async fn end_maintenance<E>(
        &self,
        effects: &E,
        tray_id: TrayId,
        actor: ActorId,
    ) -> Result<Tray>
    where
        E: TrayRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        self.change_status(
            effects,
            tray_id,
            actor,
            &[TrayStatus::Maintenance],
            TrayStatus::Available,
            "end_maintenance",
            None,
        )
        .await
    }

    /// Take a tray out of service; only from `Available` or `Maintenance`
    pub async fn mark_out_of_service<E>(
        &self,
        effects: &E,
        tray_id: TrayId,
        actor: ActorId,
        reason: &str,
    ) -> Result<Tray>
    where
        E: TrayRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(MortuaryError::invalid(
                "taking a tray out of service requires a reason",
            ));
        }
        self.change_status(
            effects,
            tray_id,
            actor,
            &[TrayStatus::Available, TrayStatus::Maintenance],
            TrayStatus::OutOfService,
            "mark_out_of_service",
            Some(reason),
        )
        .await
    }

    async fn change_status<E>(
        &self,
        effects: &E,
        tray_id: TrayId,
        actor: ActorId,
        allowed_from: &[TrayStatus],
        to: TrayStatus,
        action: &str,
        reason: Option<&str>,
    ) -> Result<Tray>
    where
        E: TrayRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        let before = Self::load(effects, tray_id).await?;
        if !allowed_from.contains(&before.status) {
            return Err(MortuaryError::invalid(format!(
                "Tray {tray_id} cannot go from {} to {to}",
                before.status
            )));
        }

        let mut tray = before.clone();
        tray.status = to;
        if !effects.update_tray_if_status(&tray, before.status).await? {
            return Err(MortuaryError::invalid(format!(
                "Tray {tray_id} changed status concurrently"
            )));
        }

        debug!(tray = %tray_id, from = %before.status, %to, "Tray status changed");

        self.audit
            .record(
                effects,
                AuditEntry::new(AuditModule::TrayPool, action, actor)
                    .before(&before)
                    .after(&serde_json::json!({ "tray": tray, "reason": reason })),
            )
            .await;
        Ok(tray)
    }

    /// Per-status counts and occupancy percentage, recomputed from inventory
    pub async fn occupancy_stats<E>(&self, effects: &E) -> Result<OccupancyStats>
    where
        E: TrayRepository + ?Sized,
    {
        let trays = effects.list_trays().await?;
        Ok(OccupancyStats::compute(&trays, self.alert_threshold_percent))
    }

    fn occupancy_alert(stats: &OccupancyStats) -> Notification {
        Notification {
            category: EventCategory::OccupancyAlert,
            payload: serde_json::json!({
                "occupied": stats.occupied,
                "total": stats.total,
                "occupancy_percent": stats.occupancy_percent,
                "threshold_percent": stats.alert_threshold_percent,
            }),
            target_roles: vec![StaffRole::MortuaryGuard, StaffRole::AdmissionsClerk],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mortuary_core::effects::TrayRepository;
    use mortuary_core::{CaseCode, CaseId, CaseState};
    use mortuary_testkit::{seed_trays, TestEffects};
    use std::sync::atomic::Ordering;

    fn pending_case() -> Case {
        let mut case = Case::open(
            CaseId::new(),
            CaseCode::new("MC-7").unwrap(),
            ActorId::new(),
            Utc::now(),
        );
        case.state = CaseState::PendingTrayAssignment;
        case
    }

    #[tokio::test]
    async fn test_allocation_lost_to_concurrent_writer() {
        let effects = TestEffects::new();
        let trays = seed_trays(&effects, 1).await.unwrap();
        let pool = TrayPool::default();
        let mut case = pending_case();
        let mut outbox = Outbox::new();
        let written = effects.store.audit_count().await;

        effects
            .store
            .failures()
            .competing_allocation
            .store(true, Ordering::SeqCst);
        let err = pool
            .allocate(&effects, trays[0].id, &mut case, ActorId::new(), &mut outbox)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            MortuaryError::ResourceUnavailable {
                tray: trays[0].id,
                status: TrayStatus::Occupied,
            }
        );
        assert_eq!(case.tray_id, None);
        assert!(outbox.is_empty());
        assert_eq!(effects.store.audit_count().await, written);
        let stored = effects.get_tray(trays[0].id).await.unwrap().unwrap();
        assert_ne!(stored.occupied_by, Some(case.id));
    }

    #[tokio::test]
    async fn test_allocate_then_release_leaves_no_dangling_reference() {
        let effects = TestEffects::new();
        let trays = seed_trays(&effects, 2).await.unwrap();
        let pool = TrayPool::default();
        let actor = ActorId::new();
        let mut case = pending_case();
        let mut outbox = Outbox::new();

        let allocation = pool
            .allocate(&effects, trays[0].id, &mut case, actor, &mut outbox)
            .await
            .unwrap();
        assert_eq!(allocation.tray.status, TrayStatus::Occupied);
        assert_eq!(allocation.tray.occupied_by, Some(case.id));
        assert_eq!(case.tray_id, Some(trays[0].id));
        assert_eq!(allocation.stats.occupancy_percent, 50.0);

        let released = pool.release(&effects, &mut case, actor).await.unwrap();
        assert!(released.is_some());
        let stored = effects.get_tray(trays[0].id).await.unwrap().unwrap();
        assert_eq!(stored.status, TrayStatus::Available);
        assert_eq!(stored.occupied_by, None);
        assert_eq!(stored.last_released.map(|s| s.actor), Some(actor));
        assert_eq!(case.tray_id, None);
    }

    #[tokio::test]
    async fn test_allocate_occupied_tray_is_unavailable() {
        let effects = TestEffects::new();
        let trays = seed_trays(&effects, 1).await.unwrap();
        let pool = TrayPool::default();
        let mut outbox = Outbox::new();
        let mut first = pending_case();
        let mut second = pending_case();

        pool.allocate(&effects, trays[0].id, &mut first, ActorId::new(), &mut outbox)
            .await
            .unwrap();
        let err = pool
            .allocate(&effects, trays[0].id, &mut second, ActorId::new(), &mut outbox)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            MortuaryError::ResourceUnavailable {
                tray: trays[0].id,
                status: TrayStatus::Occupied,
            }
        );
        assert_eq!(second.tray_id, None);
    }

    #[tokio::test]
    async fn test_release_without_tray_logs_and_proceeds() {
        mortuary_testkit::init_test_tracing();
        let effects = TestEffects::new();
        let pool = TrayPool::default();
        let mut case = pending_case();
        case.tray_id = Some(TrayId::new());

        let released = pool
            .release(&effects, &mut case, ActorId::new())
            .await
            .unwrap();
        assert!(released.is_none());
        assert_eq!(case.tray_id, None);
    }

    #[tokio::test]
    async fn test_manual_release_leaves_case_reference() {
        let effects = TestEffects::new();
        let trays = seed_trays(&effects, 1).await.unwrap();
        let pool = TrayPool::default();
        let mut case = pending_case();
        let mut outbox = Outbox::new();
        pool.allocate(&effects, trays[0].id, &mut case, ActorId::new(), &mut outbox)
            .await
            .unwrap();

        assert!(pool
            .manual_release(&effects, trays[0].id, ActorId::new(), "  ")
            .await
            .is_err());

        let tray = pool
            .manual_release(&effects, trays[0].id, ActorId::new(), "seal broken")
            .await
            .unwrap();
        assert_eq!(tray.status, TrayStatus::Available);
        assert_eq!(case.tray_id, Some(trays[0].id));

        let records = effects.store.all_audit_records().await;
        let manual = records
            .iter()
            .find(|r| r.action == "manual_release")
            .unwrap();
        assert_eq!(manual.case_id, Some(case.id));
        assert_eq!(manual.after.as_ref().unwrap()["reason"], "seal broken");
    }

    #[tokio::test]
    async fn test_maintenance_guards() {
        let effects = TestEffects::new();
        let trays = seed_trays(&effects, 1).await.unwrap();
        let pool = TrayPool::default();
        let actor = ActorId::new();
        let id = trays[0].id;

        assert!(pool.end_maintenance(&effects, id, actor).await.is_err());
        let tray = pool.start_maintenance(&effects, id, actor).await.unwrap();
        assert_eq!(tray.status, TrayStatus::Maintenance);
        assert!(pool.start_maintenance(&effects, id, actor).await.is_err());

        let tray = pool
            .mark_out_of_service(&effects, id, actor, "compressor failure")
            .await
            .unwrap();
        assert_eq!(tray.status, TrayStatus::OutOfService);
        let tray = pool.start_maintenance(&effects, id, actor).await.unwrap();
        assert_eq!(tray.status, TrayStatus::Maintenance);
        let tray = pool.end_maintenance(&effects, id, actor).await.unwrap();
        assert_eq!(tray.status, TrayStatus::Available);
    }

    #[tokio::test]
    async fn test_maintenance_cannot_start_on_occupied_tray() {
        let effects = TestEffects::new();
        let trays = seed_trays(&effects, 1).await.unwrap();
        let pool = TrayPool::default();
        let mut case = pending_case();
        let mut outbox = Outbox::new();
        pool.allocate(&effects, trays[0].id, &mut case, ActorId::new(), &mut outbox)
            .await
            .unwrap();

        let err = pool
            .start_maintenance(&effects, trays[0].id, ActorId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MortuaryError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_provision_rejects_duplicate_code() {
        let effects = TestEffects::new();
        let pool = TrayPool::default();
        let code = TrayCode::new("B4").unwrap();
        pool.provision(&effects, code.clone(), ActorId::new())
            .await
            .unwrap();
        assert!(pool.provision(&effects, code, ActorId::new()).await.is_err());
        assert_eq!(pool.occupancy_stats(&effects).await.unwrap().total, 1);
    }
}
