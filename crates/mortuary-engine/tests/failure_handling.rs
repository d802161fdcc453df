//! Failure Handling Tests
//!
//! Rollback on failed side effects, best-effort audit and notification
//! delivery, and push-model occupancy alerts.

use assert_matches::assert_matches;
use chrono::Utc;
use mortuary_core::effects::{CaseRepository, EventCategory, StaffRole, TrayRepository};
use mortuary_core::{
    ActorId, AuditModule, Case, CaseId, CaseState, MortuaryConfig, MortuaryError, TrayStatus,
};
use mortuary_engine::{CaseCommand, CaseWorkflow, Outbox, ReleaseGateAggregator, TrayPool};
use mortuary_testkit::{case_code, init_test_tracing, seed_trays, TestEffects};
use std::sync::atomic::Ordering;

fn workflow() -> CaseWorkflow {
    CaseWorkflow::new(MortuaryConfig::default(), ReleaseGateAggregator::new())
}

/// Open a case and walk it to `PendingTrayAssignment`
async fn awaiting_tray(workflow: &CaseWorkflow, effects: &TestEffects) -> CaseId {
    let nurse = ActorId::new();
    let technician = ActorId::new();
    let case = workflow
        .open_case(effects, case_code(3), nurse)
        .await
        .unwrap();
    for command in [
        CaseCommand::RequestPickup {
            case_id: case.id,
            actor: nurse,
        },
        CaseCommand::AcceptCustody {
            case_id: case.id,
            technician,
            from_location: "Ward 2".to_string(),
            to_location: "Ambulance 1".to_string(),
            notes: None,
        },
        CaseCommand::VerifyAtMortuary {
            case_id: case.id,
            guard: ActorId::new(),
            notes: None,
        },
    ] {
        workflow
            .execute_in_transaction(effects, command)
            .await
            .unwrap();
    }
    case.id
}

fn case_awaiting_tray() -> Case {
    let mut case = Case::open(CaseId::new(), case_code(9), ActorId::new(), Utc::now());
    case.state = CaseState::PendingTrayAssignment;
    case
}

#[tokio::test]
async fn failed_case_write_rolls_back_tray_allocation() {
    init_test_tracing();
    let effects = TestEffects::new();
    let trays = seed_trays(&effects, 1).await.unwrap();
    let workflow = workflow();
    let case_id = awaiting_tray(&workflow, &effects).await;
    effects.notifier.clear();

    effects
        .store
        .failures()
        .case_updates
        .store(true, Ordering::SeqCst);
    let err = workflow
        .execute_in_transaction(
            &effects,
            CaseCommand::AssignTray {
                case_id,
                tray_id: trays[0].id,
                actor: ActorId::new(),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, MortuaryError::Storage { .. });

    let tray = effects.get_tray(trays[0].id).await.unwrap().unwrap();
    assert_eq!(tray.status, TrayStatus::Available);
    assert_eq!(tray.occupied_by, None);
    let case = effects.get_case(case_id).await.unwrap().unwrap();
    assert_eq!(case.state, CaseState::PendingTrayAssignment);
    assert_eq!(case.tray_id, None);
    assert!(effects.notifier.published().is_empty());
    assert!(!effects.store.in_transaction().await);
}

#[tokio::test]
async fn failed_ledger_write_rolls_back_transition() {
    let effects = TestEffects::new();
    let workflow = workflow();
    let nurse = ActorId::new();
    let case = workflow
        .open_case(&effects, case_code(4), nurse)
        .await
        .unwrap();
    workflow
        .execute_in_transaction(
            &effects,
            CaseCommand::RequestPickup {
                case_id: case.id,
                actor: nurse,
            },
        )
        .await
        .unwrap();

    effects
        .store
        .failures()
        .custody_writes
        .store(true, Ordering::SeqCst);
    workflow
        .execute_in_transaction(
            &effects,
            CaseCommand::AcceptCustody {
                case_id: case.id,
                technician: ActorId::new(),
                from_location: "Ward 2".to_string(),
                to_location: "Ambulance 1".to_string(),
                notes: None,
            },
        )
        .await
        .unwrap_err();

    let stored = effects.get_case(case.id).await.unwrap().unwrap();
    assert_eq!(stored.state, CaseState::PendingPickup);
    assert!(workflow
        .ledger()
        .history(&effects, case.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn failed_case_write_after_transfer_can_be_retried() {
    let effects = TestEffects::new();
    let workflow = workflow();
    let nurse = ActorId::new();
    let technician = ActorId::new();
    let case = workflow
        .open_case(&effects, case_code(10), nurse)
        .await
        .unwrap();
    workflow
        .execute_in_transaction(
            &effects,
            CaseCommand::RequestPickup {
                case_id: case.id,
                actor: nurse,
            },
        )
        .await
        .unwrap();

    let accept = CaseCommand::AcceptCustody {
        case_id: case.id,
        technician,
        from_location: "Ward 2".to_string(),
        to_location: "Ambulance 1".to_string(),
        notes: None,
    };
    effects
        .store
        .failures()
        .case_updates
        .store(true, Ordering::SeqCst);
    let err = workflow
        .execute_in_transaction(&effects, accept.clone())
        .await
        .unwrap_err();
    assert_matches!(err, MortuaryError::Storage { .. });
    assert!(workflow
        .ledger()
        .history(&effects, case.id)
        .await
        .unwrap()
        .is_empty());

    // Same hand-off inside the duplicate window must not be refused
    effects
        .store
        .failures()
        .case_updates
        .store(false, Ordering::SeqCst);
    workflow
        .execute_in_transaction(&effects, accept)
        .await
        .unwrap();

    let stored = effects.get_case(case.id).await.unwrap().unwrap();
    assert_eq!(stored.state, CaseState::InTransitToMortuary);
    let history = workflow.ledger().history(&effects, case.id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].to_actor, technician);
}

#[tokio::test]
async fn notification_failure_does_not_fail_transition() {
    let effects = TestEffects::new();
    let workflow = workflow();
    let nurse = ActorId::new();
    let case = workflow
        .open_case(&effects, case_code(5), nurse)
        .await
        .unwrap();

    effects.notifier.set_failing(true);
    workflow
        .execute_in_transaction(
            &effects,
            CaseCommand::RequestPickup {
                case_id: case.id,
                actor: nurse,
            },
        )
        .await
        .unwrap();

    let stored = effects.get_case(case.id).await.unwrap().unwrap();
    assert_eq!(stored.state, CaseState::PendingPickup);
    assert!(effects.notifier.published().is_empty());
}

#[tokio::test]
async fn audit_failure_does_not_fail_transition() {
    let effects = TestEffects::new();
    let workflow = workflow();
    let nurse = ActorId::new();
    let case = workflow
        .open_case(&effects, case_code(6), nurse)
        .await
        .unwrap();
    let written = effects.store.audit_count().await;

    effects
        .store
        .failures()
        .audit_writes
        .store(true, Ordering::SeqCst);
    workflow
        .execute_in_transaction(
            &effects,
            CaseCommand::RequestPickup {
                case_id: case.id,
                actor: nurse,
            },
        )
        .await
        .unwrap();

    let stored = effects.get_case(case.id).await.unwrap().unwrap();
    assert_eq!(stored.state, CaseState::PendingPickup);
    assert_eq!(effects.store.audit_count().await, written);
}

#[tokio::test]
async fn lifecycle_transitions_are_audited() {
    let effects = TestEffects::new();
    let workflow = workflow();
    let nurse = ActorId::new();
    let case = workflow
        .open_case(&effects, case_code(8), nurse)
        .await
        .unwrap();
    workflow
        .execute_in_transaction(
            &effects,
            CaseCommand::RequestPickup {
                case_id: case.id,
                actor: nurse,
            },
        )
        .await
        .unwrap();

    let records = effects.store.all_audit_records().await;
    let actions: Vec<_> = records.iter().map(|r| r.action.as_str()).collect();
    assert_eq!(actions, vec!["open_case", "fire:request_pickup"]);
    assert!(records.iter().all(|r| r.module == AuditModule::Lifecycle));
    assert_eq!(records[1].before.as_ref().unwrap()["state"], "on_ward");
    assert_eq!(records[1].after.as_ref().unwrap()["state"], "pending_pickup");
}

#[tokio::test]
async fn occupancy_alert_only_above_threshold() {
    let effects = TestEffects::new();
    let trays = seed_trays(&effects, 10).await.unwrap();
    let pool = TrayPool::default();
    let actor = ActorId::new();

    let mut outbox = Outbox::new();
    for tray in &trays[..7] {
        let mut case = case_awaiting_tray();
        let allocation = pool
            .allocate(&effects, tray.id, &mut case, actor, &mut outbox)
            .await
            .unwrap();
        assert!(!allocation.stats.alert());
    }
    assert!(outbox.is_empty());
    let stats = pool.occupancy_stats(&effects).await.unwrap();
    assert!((stats.occupancy_percent - 70.0).abs() < f64::EPSILON);

    let mut case = case_awaiting_tray();
    let allocation = pool
        .allocate(&effects, trays[7].id, &mut case, actor, &mut outbox)
        .await
        .unwrap();
    assert!(allocation.stats.alert());
    assert_eq!(allocation.stats.occupied, 8);

    let delivered = outbox.flush(&effects.notifier).await;
    assert_eq!(delivered, 1);
    let alerts = effects.notifier.of_category(EventCategory::OccupancyAlert);
    assert_eq!(alerts.len(), 1);
    assert_eq!(
        alerts[0].target_roles,
        vec![StaffRole::MortuaryGuard, StaffRole::AdmissionsClerk]
    );
}

#[tokio::test]
async fn manual_release_frees_tray_but_not_case() {
    let effects = TestEffects::new();
    let trays = seed_trays(&effects, 1).await.unwrap();
    let workflow = workflow();
    let case_id = awaiting_tray(&workflow, &effects).await;
    workflow
        .execute_in_transaction(
            &effects,
            CaseCommand::AssignTray {
                case_id,
                tray_id: trays[0].id,
                actor: ActorId::new(),
            },
        )
        .await
        .unwrap();

    let tray = workflow
        .pool()
        .manual_release(&effects, trays[0].id, ActorId::new(), "Door sensor fault")
        .await
        .unwrap();
    assert_eq!(tray.status, TrayStatus::Available);

    let case = effects.get_case(case_id).await.unwrap().unwrap();
    assert_eq!(case.state, CaseState::InTray);
    assert_eq!(case.tray_id, Some(trays[0].id));
}
