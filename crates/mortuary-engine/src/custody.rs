//! Append-only custody ledger
//!
//! Records who physically holds a body. Current custodian and current
//! location are always derived from the ledger and the case state; neither is
//! stored on its own.

use chrono::Duration;
use mortuary_core::effects::{
    AuditRepository, CustodyRepository, PhysicalTimeEffects, RandomEffects, TrayRepository,
};
use mortuary_core::{
    ActorId, AuditModule, Case, CaseId, CaseState, CurrentLocation, CustodyTransfer,
    LocationZone, MortuaryConfig, MortuaryError, Result, TransferId, TransferRequest,
    MAX_DUPLICATE_TRANSFER_WINDOW_SECS,
};
use tracing::{error, info, warn};

use crate::audit::{AuditEntry, AuditRecorder};

/// Zone implied by each case state
const ZONE_BY_STATE: [(CaseState, LocationZone); 8] = [
    (CaseState::OnWard, LocationZone::Ward),
    (CaseState::PendingPickup, LocationZone::Ward),
    (CaseState::InTransitToMortuary, LocationZone::InTransit),
    (CaseState::PendingTrayAssignment, LocationZone::MortuaryReception),
    (CaseState::RejectedAtMortuary, LocationZone::MortuaryReception),
    (CaseState::InTray, LocationZone::MortuaryStorage),
    (CaseState::PendingRelease, LocationZone::MortuaryStorage),
    (CaseState::Released, LocationZone::Departed),
];

/// Zone for a case state
pub fn zone_for(state: CaseState) -> LocationZone {
    ZONE_BY_STATE
        .iter()
        .find(|(s, _)| *s == state)
        .map(|(_, zone)| *zone)
        .unwrap_or(LocationZone::Ward)
}

/// Map `(case state, latest transfer destination)` to a location
pub fn derive_location(state: CaseState, latest_to_location: Option<&str>) -> CurrentLocation {
    CurrentLocation {
        zone: zone_for(state),
        detail: latest_to_location.map(str::to_string),
        tray: None,
    }
}

/// Stateless custody ledger
#[derive(Debug, Clone)]
pub struct CustodyLedger {
    duplicate_window: Duration,
    audit: AuditRecorder,
}

impl Default for CustodyLedger {
    fn default() -> Self {
        Self::new(&MortuaryConfig::default())
    }
}

impl CustodyLedger {
    /// Windows beyond one day are clamped so an unvalidated config cannot overflow
    pub fn new(config: &MortuaryConfig) -> Self {
        let secs = config
            .duplicate_transfer_window_secs
            .min(MAX_DUPLICATE_TRANSFER_WINDOW_SECS);
        Self {
            duplicate_window: Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX)),
            audit: AuditRecorder::new(),
        }
    }

    /// Re-scan window for the duplicate transfer guard
    pub fn duplicate_window(&self) -> Duration {
        self.duplicate_window
    }

    /// Append one immutable hand-off stamped with the current time
    ///
    /// # Errors
    /// * `MortuaryError::DuplicateTransfer` if the same receiver took custody of
    ///   this case less than the duplicate window ago
    /// * `MortuaryError::Invalid` if giver and receiver are the same actor
    pub async fn record_transfer<E>(
        &self,
        effects: &E,
        request: TransferRequest,
    ) -> Result<CustodyTransfer>
    where
        E: CustodyRepository + AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        if request.from_actor == request.to_actor {
            return Err(MortuaryError::invalid(format!(
                "{} cannot hand custody of case {} to themselves",
                request.to_actor, request.case_id
            )));
        }

        let now = effects.physical_time().await?;
        let history = effects.transfers_for_case(request.case_id).await?;

        // Racy under true parallelism; one operator per scanner serializes it
        if let Some(previous) = history.iter().rev().find(|t| t.to_actor == request.to_actor) {
            if now - previous.recorded_at < self.duplicate_window {
                warn!(
                    case = %request.case_id,
                    to_actor = %request.to_actor,
                    previous = %previous.id,
                    "Rejected duplicate custody transfer"
                );
                return Err(MortuaryError::DuplicateTransfer {
                    case: request.case_id,
                    to_actor: request.to_actor,
                    window_secs: u64::try_from(self.duplicate_window.num_seconds()).unwrap_or(0),
                });
            }
        }

        let transfer = CustodyTransfer {
            id: TransferId::from_uuid(effects.random_uuid().await),
            case_id: request.case_id,
            from_actor: request.from_actor,
            to_actor: request.to_actor,
            from_location: request.from_location,
            to_location: request.to_location,
            recorded_at: now,
            notes: request.notes,
        };
        effects.append_transfer(&transfer).await?;

        info!(
            case = %transfer.case_id,
            from = %transfer.from_actor,
            to = %transfer.to_actor,
            to_location = %transfer.to_location,
            "Custody transferred"
        );

        self.audit
            .record(
                effects,
                AuditEntry::new(AuditModule::Custody, "record_transfer", transfer.to_actor)
                    .for_case(transfer.case_id)
                    .after(&transfer),
            )
            .await;

        Ok(transfer)
    }

    /// Full ledger for a case, oldest first
    pub async fn history<E>(&self, effects: &E, case_id: CaseId) -> Result<Vec<CustodyTransfer>>
    where
        E: CustodyRepository + ?Sized,
    {
        Ok(effects.transfers_for_case(case_id).await?)
    }

    /// Most recent hand-off, if any
    pub async fn latest_transfer<E>(
        &self,
        effects: &E,
        case_id: CaseId,
    ) -> Result<Option<CustodyTransfer>>
    where
        E: CustodyRepository + ?Sized,
    {
        Ok(effects.transfers_for_case(case_id).await?.pop())
    }

    /// Latest receiver, or the case creator when nothing was handed over yet
    pub async fn current_custodian<E>(&self, effects: &E, case: &Case) -> Result<ActorId>
    where
        E: CustodyRepository + ?Sized,
    {
        Ok(self
            .latest_transfer(effects, case.id)
            .await?
            .map_or(case.created_by, |t| t.to_actor))
    }

    /// Location derived from the case state and the latest hand-off
    ///
    /// The tray code is attached while the state implies occupancy; a missing
    /// tray is logged as a data inconsistency and left out.
    pub async fn current_location<E>(&self, effects: &E, case: &Case) -> Result<CurrentLocation>
    where
        E: CustodyRepository + TrayRepository + ?Sized,
    {
        let latest = self.latest_transfer(effects, case.id).await?;
        let mut location = derive_location(case.state, latest.as_ref().map(|t| t.to_location.as_str()));

        if case.state.occupies_tray() {
            let tray = match case.tray_id {
                Some(tray_id) => effects.get_tray(tray_id).await?,
                None => None,
            };
            match tray {
                Some(tray) => location.tray = Some(tray.code),
                None => {
                    let drift = MortuaryError::data_inconsistency(format!(
                        "case {} is {} but its tray {:?} cannot be found",
                        case.id, case.state, case.tray_id
                    ));
                    error!(case = %case.id, error = %drift, "Location lookup found no tray");
                }
            }
        }

        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mortuary_testkit::{seed_case, TestEffects};

    fn request(case: &Case, from: ActorId, to: ActorId) -> TransferRequest {
        TransferRequest {
            case_id: case.id,
            from_actor: from,
            to_actor: to,
            from_location: "Ward 4B".to_string(),
            to_location: "Ambulance 2".to_string(),
            notes: None,
        }
    }

    #[test]
    fn test_every_state_has_a_zone() {
        for state in CaseState::ALL {
            assert!(ZONE_BY_STATE.iter().any(|(s, _)| *s == state));
        }
        assert_eq!(zone_for(CaseState::InTray), LocationZone::MortuaryStorage);
        assert_eq!(
            derive_location(CaseState::Released, Some("Family vehicle")).detail.as_deref(),
            Some("Family vehicle")
        );
    }

    #[tokio::test]
    async fn test_custodian_defaults_to_creator() {
        let effects = TestEffects::new();
        let nurse = ActorId::new();
        let case = seed_case(&effects, nurse).await.unwrap();
        let ledger = CustodyLedger::default();

        assert_eq!(ledger.current_custodian(&effects, &case).await.unwrap(), nurse);

        let technician = ActorId::new();
        ledger
            .record_transfer(&effects, request(&case, nurse, technician))
            .await
            .unwrap();
        assert_eq!(
            ledger.current_custodian(&effects, &case).await.unwrap(),
            technician
        );
    }

    #[tokio::test]
    async fn test_duplicate_window_boundaries() {
        let effects = TestEffects::new();
        let nurse = ActorId::new();
        let technician = ActorId::new();
        let case = seed_case(&effects, nurse).await.unwrap();
        let ledger = CustodyLedger::default();

        ledger
            .record_transfer(&effects, request(&case, nurse, technician))
            .await
            .unwrap();

        effects.clock.advance_secs(299);
        let err = ledger
            .record_transfer(&effects, request(&case, nurse, technician))
            .await
            .unwrap_err();
        assert!(matches!(err, MortuaryError::DuplicateTransfer { window_secs: 300, .. }));

        effects.clock.advance_secs(2);
        ledger
            .record_transfer(&effects, request(&case, nurse, technician))
            .await
            .unwrap();
        assert_eq!(ledger.history(&effects, case.id).await.unwrap().len(), 2);
    }

    #[test]
    fn test_oversized_window_is_clamped() {
        let config = MortuaryConfig {
            duplicate_transfer_window_secs: u64::MAX,
            ..MortuaryConfig::default()
        };
        let ledger = CustodyLedger::new(&config);
        assert_eq!(ledger.duplicate_window(), Duration::days(1));
    }

    #[tokio::test]
    async fn test_different_receiver_is_not_a_duplicate() {
        let effects = TestEffects::new();
        let nurse = ActorId::new();
        let case = seed_case(&effects, nurse).await.unwrap();
        let ledger = CustodyLedger::default();
        let technician = ActorId::new();
        let guard = ActorId::new();

        ledger
            .record_transfer(&effects, request(&case, nurse, technician))
            .await
            .unwrap();
        ledger
            .record_transfer(&effects, request(&case, technician, guard))
            .await
            .unwrap();
        assert_eq!(ledger.current_custodian(&effects, &case).await.unwrap(), guard);
    }

    #[tokio::test]
    async fn test_self_transfer_rejected() {
        let effects = TestEffects::new();
        let nurse = ActorId::new();
        let case = seed_case(&effects, nurse).await.unwrap();
        let err = CustodyLedger::default()
            .record_transfer(&effects, request(&case, nurse, nurse))
            .await
            .unwrap_err();
        assert!(matches!(err, MortuaryError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_location_follows_state_and_latest_transfer() {
        let effects = TestEffects::new();
        let nurse = ActorId::new();
        let mut case = seed_case(&effects, nurse).await.unwrap();
        let ledger = CustodyLedger::default();

        let location = ledger.current_location(&effects, &case).await.unwrap();
        assert_eq!(location.zone, LocationZone::Ward);
        assert_eq!(location.detail, None);

        ledger
            .record_transfer(&effects, request(&case, nurse, ActorId::new()))
            .await
            .unwrap();
        case.state = CaseState::InTransitToMortuary;
        let location = ledger.current_location(&effects, &case).await.unwrap();
        assert_eq!(location.zone, LocationZone::InTransit);
        assert_eq!(location.detail.as_deref(), Some("Ambulance 2"));
    }
}
