//! Case Workflow - one method per human action
//!
//! Composes the lifecycle engine, tray pool, custody ledger, gate aggregator
//! and audit recorder. Every action runs validate → gate check → side effects
//! → persist → audit, staging its notifications in an [`Outbox`].
//!
//! The workflow is stateless and takes effect references per call. It never
//! opens a transaction itself except in
//! [`execute_in_transaction`](CaseWorkflow::execute_in_transaction); callers
//! that own their own boundary use the per-action methods and flush the
//! outbox after they commit.
//!
//! # Example
//!
//! ```ignore
//! let workflow = CaseWorkflow::new(config, aggregator);
//! let outcome = workflow
//!     .execute_in_transaction(&effects, CaseCommand::RequestPickup { case_id, actor })
//!     .await?;
//! ```

use mortuary_core::effects::{
    CaseRepository, CustodyRepository, MortuaryEffects, NotificationEffects, TransactionEffects,
    TrayRepository,
};
use mortuary_core::{
    ActorId, AuditModule, Case, CaseCode, CaseId, CurrentLocation, CustodyTransfer, GateKind,
    MortuaryConfig, MortuaryError, Result, TransferRequest, Tray, TrayId, Trigger,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::audit::{AuditEntry, AuditRecorder};
use crate::custody::CustodyLedger;
use crate::lifecycle::{LifecycleEngine, TransitionEvent};
use crate::notify::{self, Outbox};
use crate::pool::TrayPool;
use crate::release::{ReleaseAssessment, ReleaseGateAggregator, UnblockSignal};

/// Free-text location recorded when the mortuary takes a body in
pub const MORTUARY_RECEPTION: &str = "Mortuary reception";

/// Free-text origin used when no earlier hand-off names one
const UNKNOWN_LOCATION: &str = "Unrecorded";

/// One human action against a case
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CaseCommand {
    OpenCase {
        code: CaseCode,
        creator: ActorId,
    },
    RequestPickup {
        case_id: CaseId,
        actor: ActorId,
    },
    AcceptCustody {
        case_id: CaseId,
        technician: ActorId,
        from_location: String,
        to_location: String,
        notes: Option<String>,
    },
    VerifyAtMortuary {
        case_id: CaseId,
        guard: ActorId,
        notes: Option<String>,
    },
    RejectAtMortuary {
        case_id: CaseId,
        guard: ActorId,
        reason: String,
    },
    ApplyCorrection {
        case_id: CaseId,
        actor: ActorId,
        notes: Option<String>,
    },
    AssignTray {
        case_id: CaseId,
        tray_id: TrayId,
        actor: ActorId,
    },
    AuthorizeRelease {
        case_id: CaseId,
        actor: ActorId,
    },
    RegisterDeparture {
        case_id: CaseId,
        actor: ActorId,
        recipient: ActorId,
        destination: String,
        notes: Option<String>,
    },
    ResolveGate {
        case_id: CaseId,
        gate: GateKind,
        actor: ActorId,
    },
}

impl CaseCommand {
    /// Stable snake_case name for logs
    pub fn name(&self) -> &'static str {
        match self {
            CaseCommand::OpenCase { .. } => "open_case",
            CaseCommand::RequestPickup { .. } => "request_pickup",
            CaseCommand::AcceptCustody { .. } => "accept_custody",
            CaseCommand::VerifyAtMortuary { .. } => "verify_at_mortuary",
            CaseCommand::RejectAtMortuary { .. } => "reject_at_mortuary",
            CaseCommand::ApplyCorrection { .. } => "apply_correction",
            CaseCommand::AssignTray { .. } => "assign_tray",
            CaseCommand::AuthorizeRelease { .. } => "authorize_release",
            CaseCommand::RegisterDeparture { .. } => "register_departure",
            CaseCommand::ResolveGate { .. } => "resolve_gate",
        }
    }
}

/// What a successful transition produced
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionOutcome {
    /// Case as persisted
    pub case: Case,
    pub event: TransitionEvent,
    /// Ledger entry appended by this step, if any
    pub transfer: Option<CustodyTransfer>,
    /// Tray allocated or released by this step, if any
    pub tray: Option<Tray>,
}

impl TransitionOutcome {
    fn new(case: Case, event: TransitionEvent) -> Self {
        Self {
            case,
            event,
            transfer: None,
            tray: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Opened(Case),
    Transitioned(TransitionOutcome),
    GateResolved(UnblockSignal),
}

impl CommandOutcome {
    /// Case after the command, when the command produced one
    pub fn case(&self) -> Option<&Case> {
        match self {
            CommandOutcome::Opened(case) => Some(case),
            CommandOutcome::Transitioned(outcome) => Some(&outcome.case),
            CommandOutcome::GateResolved(_) => None,
        }
    }
}

/// Stateless coordinator over the five components
#[derive(Debug, Clone)]
pub struct CaseWorkflow {
    config: MortuaryConfig,
    lifecycle: LifecycleEngine,
    pool: TrayPool,
    ledger: CustodyLedger,
    gates: ReleaseGateAggregator,
    audit: AuditRecorder,
}

impl CaseWorkflow {
    pub fn new(config: MortuaryConfig, gates: ReleaseGateAggregator) -> Self {
        Self {
            lifecycle: LifecycleEngine::new(),
            pool: TrayPool::new(&config),
            ledger: CustodyLedger::new(&config),
            gates,
            audit: AuditRecorder::new(),
            config,
        }
    }

    pub fn config(&self) -> &MortuaryConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &LifecycleEngine {
        &self.lifecycle
    }

    /// Tray pool, for provisioning, maintenance and manual release
    pub fn pool(&self) -> &TrayPool {
        &self.pool
    }

    pub fn ledger(&self) -> &CustodyLedger {
        &self.ledger
    }

    pub fn gates(&self) -> &ReleaseGateAggregator {
        &self.gates
    }

    /// Load a case, logging a tray reference that disagrees with its state
    pub async fn load_case<E>(&self, effects: &E, case_id: CaseId) -> Result<Case>
    where
        E: CaseRepository + ?Sized,
    {
        let case = effects
            .get_case(case_id)
            .await?
            .ok_or_else(|| MortuaryError::not_found(format!("Case not found: {case_id}")))?;
        if !case.tray_reference_consistent() {
            let drift = MortuaryError::data_inconsistency(format!(
                "case {} is {} with tray reference {:?}",
                case.id, case.state, case.tray_id
            ));
            error!(case = %case.id, error = %drift, "Case tray reference disagrees with state");
        }
        Ok(case)
    }

    /// Triggers the case may fire next
    pub async fn permitted_triggers<E>(&self, effects: &E, case_id: CaseId) -> Result<Vec<Trigger>>
    where
        E: CaseRepository + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        Ok(self.lifecycle.permitted_triggers(&case))
    }

    pub async fn current_custodian<E>(&self, effects: &E, case_id: CaseId) -> Result<ActorId>
    where
        E: CaseRepository + CustodyRepository + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        self.ledger.current_custodian(effects, &case).await
    }

    pub async fn current_location<E>(&self, effects: &E, case_id: CaseId) -> Result<CurrentLocation>
    where
        E: CaseRepository + CustodyRepository + TrayRepository + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        self.ledger.current_location(effects, &case).await
    }

    /// Per-gate release readings for display
    pub async fn assess_release(&self, case_id: CaseId) -> Result<ReleaseAssessment> {
        self.gates.assess(case_id).await
    }

    /// Create a case in its initial state
    pub async fn open_case<E>(&self, effects: &E, code: CaseCode, creator: ActorId) -> Result<Case>
    where
        E: MortuaryEffects + ?Sized,
    {
        let now = effects.physical_time().await?;
        let case_id = CaseId::from_uuid(effects.random_uuid().await);
        let case = Case::open(case_id, code, creator, now);
        effects.create_case(&case).await?;

        info!(case = %case.id, code = %case.code, %creator, "Case opened");

        self.audit
            .record(
                effects,
                AuditEntry::new(AuditModule::Lifecycle, "open_case", creator)
                    .for_case(case.id)
                    .after(&case),
            )
            .await;
        Ok(case)
    }

    pub async fn request_pickup<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        actor: ActorId,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        self.lifecycle.ensure_can_fire(&case, Trigger::RequestPickup)?;
        let (case, event) = self
            .commit_transition(effects, case, Trigger::RequestPickup, actor, None, outbox)
            .await?;
        Ok(TransitionOutcome::new(case, event))
    }

    /// Technician takes the body from its current custodian
    pub async fn accept_custody<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        technician: ActorId,
        from_location: String,
        to_location: String,
        notes: Option<String>,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        self.lifecycle.ensure_can_fire(&case, Trigger::AcceptCustody)?;

        let from_actor = self.ledger.current_custodian(effects, &case).await?;
        let transfer = self
            .ledger
            .record_transfer(
                effects,
                TransferRequest {
                    case_id,
                    from_actor,
                    to_actor: technician,
                    from_location,
                    to_location,
                    notes,
                },
            )
            .await?;

        let (case, event) = self
            .commit_transition(effects, case, Trigger::AcceptCustody, technician, None, outbox)
            .await?;
        Ok(TransitionOutcome {
            transfer: Some(transfer),
            ..TransitionOutcome::new(case, event)
        })
    }

    /// Guard verifies the body and takes custody at reception
    pub async fn verify_at_mortuary<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        guard: ActorId,
        notes: Option<String>,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        self.lifecycle
            .ensure_can_fire(&case, Trigger::VerifyAtMortuary)?;

        let latest = self.ledger.latest_transfer(effects, case_id).await?;
        let (from_actor, from_location) = match latest {
            Some(t) => (t.to_actor, t.to_location),
            None => (case.created_by, UNKNOWN_LOCATION.to_string()),
        };
        let transfer = self
            .ledger
            .record_transfer(
                effects,
                TransferRequest {
                    case_id,
                    from_actor,
                    to_actor: guard,
                    from_location,
                    to_location: MORTUARY_RECEPTION.to_string(),
                    notes,
                },
            )
            .await?;

        let (case, event) = self
            .commit_transition(effects, case, Trigger::VerifyAtMortuary, guard, None, outbox)
            .await?;
        Ok(TransitionOutcome {
            transfer: Some(transfer),
            ..TransitionOutcome::new(case, event)
        })
    }

    /// Guard refuses the hand-off; custody stays with the technician
    pub async fn reject_at_mortuary<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        guard: ActorId,
        reason: &str,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(MortuaryError::invalid("rejection requires a reason"));
        }
        let case = self.load_case(effects, case_id).await?;
        self.lifecycle
            .ensure_can_fire(&case, Trigger::RejectVerification)?;

        let (case, event) = self
            .commit_transition(
                effects,
                case,
                Trigger::RejectVerification,
                guard,
                Some(reason),
                outbox,
            )
            .await?;
        Ok(TransitionOutcome::new(case, event))
    }

    pub async fn apply_correction<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        actor: ActorId,
        notes: Option<&str>,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        self.lifecycle
            .ensure_can_fire(&case, Trigger::ApplyCorrection)?;
        let (case, event) = self
            .commit_transition(effects, case, Trigger::ApplyCorrection, actor, notes, outbox)
            .await?;
        Ok(TransitionOutcome::new(case, event))
    }

    /// Allocate a tray, then fire
    pub async fn assign_tray<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        tray_id: TrayId,
        actor: ActorId,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let mut case = self.load_case(effects, case_id).await?;
        self.lifecycle.ensure_can_fire(&case, Trigger::AssignTray)?;

        let allocation = self
            .pool
            .allocate(effects, tray_id, &mut case, actor, outbox)
            .await?;

        let (case, event) = self
            .commit_transition(effects, case, Trigger::AssignTray, actor, None, outbox)
            .await?;
        Ok(TransitionOutcome {
            tray: Some(allocation.tray),
            ..TransitionOutcome::new(case, event)
        })
    }

    /// # Errors
    /// * `MortuaryError::GateBlocked` while any release gate blocks
    pub async fn authorize_release<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        actor: ActorId,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        self.lifecycle
            .ensure_can_fire(&case, Trigger::AuthorizeRelease)?;
        self.gates.ensure_releasable(case_id).await?;

        let (case, event) = self
            .commit_transition(effects, case, Trigger::AuthorizeRelease, actor, None, outbox)
            .await?;
        Ok(TransitionOutcome::new(case, event))
    }

    /// Hand the body to its recipient, free the tray and close the case
    ///
    /// Gates are re-checked here even though `authorize_release` already
    /// passed them; an obligation may have reopened in between.
    pub async fn register_departure<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        actor: ActorId,
        recipient: ActorId,
        destination: String,
        notes: Option<String>,
        outbox: &mut Outbox,
    ) -> Result<TransitionOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let mut case = self.load_case(effects, case_id).await?;
        self.lifecycle
            .ensure_can_fire(&case, Trigger::RegisterDeparture)?;
        self.gates.ensure_releasable(case_id).await?;

        let from_actor = self.ledger.current_custodian(effects, &case).await?;
        let from_location = self
            .ledger
            .current_location(effects, &case)
            .await?
            .to_string();
        let transfer = self
            .ledger
            .record_transfer(
                effects,
                TransferRequest {
                    case_id,
                    from_actor,
                    to_actor: recipient,
                    from_location,
                    to_location: destination,
                    notes,
                },
            )
            .await?;

        let tray = self.pool.release(effects, &mut case, actor).await?;

        let (case, event) = self
            .commit_transition(effects, case, Trigger::RegisterDeparture, actor, None, outbox)
            .await?;
        Ok(TransitionOutcome {
            case,
            event,
            transfer: Some(transfer),
            tray,
        })
    }

    /// Recompute every gate after `gate` cleared for the case
    pub async fn resolve_gate<E>(
        &self,
        effects: &E,
        case_id: CaseId,
        gate: GateKind,
        actor: ActorId,
        outbox: &mut Outbox,
    ) -> Result<UnblockSignal>
    where
        E: MortuaryEffects + ?Sized,
    {
        let case = self.load_case(effects, case_id).await?;
        let signal = self.gates.on_gate_resolved(case.id, gate, outbox).await?;

        self.audit
            .record(
                effects,
                AuditEntry::new(AuditModule::ReleaseGates, "resolve_gate", actor)
                    .for_case(case.id)
                    .after(&signal),
            )
            .await;
        Ok(signal)
    }

    /// Fire, persist, audit and stage the status notification
    async fn commit_transition<E>(
        &self,
        effects: &E,
        mut case: Case,
        trigger: Trigger,
        actor: ActorId,
        note: Option<&str>,
        outbox: &mut Outbox,
    ) -> Result<(Case, TransitionEvent)>
    where
        E: MortuaryEffects + ?Sized,
    {
        let before = case.clone();
        let now = effects.physical_time().await?;
        let event = self.lifecycle.fire(&mut case, trigger, now)?;
        effects.update_case(&case).await?;

        info!(
            case = %case.id,
            from = %event.from,
            to = %event.to,
            %trigger,
            %actor,
            "Case transition committed"
        );

        let entry = AuditEntry::new(AuditModule::Lifecycle, format!("fire:{trigger}"), actor)
            .for_case(case.id)
            .before(&before);
        let entry = match note {
            Some(note) => entry.after(&serde_json::json!({ "case": case, "note": note })),
            None => entry.after(&case),
        };
        self.audit.record(effects, entry).await;

        outbox.push(notify::status_changed(&event));
        Ok((case, event))
    }

    async fn dispatch<E>(
        &self,
        effects: &E,
        command: CaseCommand,
        outbox: &mut Outbox,
    ) -> Result<CommandOutcome>
    where
        E: MortuaryEffects + ?Sized,
    {
        let outcome = match command {
            CaseCommand::OpenCase { code, creator } => {
                CommandOutcome::Opened(self.open_case(effects, code, creator).await?)
            }
            CaseCommand::RequestPickup { case_id, actor } => CommandOutcome::Transitioned(
                self.request_pickup(effects, case_id, actor, outbox).await?,
            ),
            CaseCommand::AcceptCustody {
                case_id,
                technician,
                from_location,
                to_location,
                notes,
            } => CommandOutcome::Transitioned(
                self.accept_custody(
                    effects,
                    case_id,
                    technician,
                    from_location,
                    to_location,
                    notes,
                    outbox,
                )
                .await?,
            ),
            CaseCommand::VerifyAtMortuary {
                case_id,
                guard,
                notes,
            } => CommandOutcome::Transitioned(
                self.verify_at_mortuary(effects, case_id, guard, notes, outbox)
                    .await?,
            ),
            CaseCommand::RejectAtMortuary {
                case_id,
                guard,
                reason,
            } => CommandOutcome::Transitioned(
                self.reject_at_mortuary(effects, case_id, guard, &reason, outbox)
                    .await?,
            ),
            CaseCommand::ApplyCorrection {
                case_id,
                actor,
                notes,
            } => CommandOutcome::Transitioned(
                self.apply_correction(effects, case_id, actor, notes.as_deref(), outbox)
                    .await?,
            ),
            CaseCommand::AssignTray {
                case_id,
                tray_id,
                actor,
            } => CommandOutcome::Transitioned(
                self.assign_tray(effects, case_id, tray_id, actor, outbox)
                    .await?,
            ),
            CaseCommand::AuthorizeRelease { case_id, actor } => CommandOutcome::Transitioned(
                self.authorize_release(effects, case_id, actor, outbox)
                    .await?,
            ),
            CaseCommand::RegisterDeparture {
                case_id,
                actor,
                recipient,
                destination,
                notes,
            } => CommandOutcome::Transitioned(
                self.register_departure(
                    effects,
                    case_id,
                    actor,
                    recipient,
                    destination,
                    notes,
                    outbox,
                )
                .await?,
            ),
            CaseCommand::ResolveGate {
                case_id,
                gate,
                actor,
            } => CommandOutcome::GateResolved(
                self.resolve_gate(effects, case_id, gate, actor, outbox)
                    .await?,
            ),
        };
        Ok(outcome)
    }

    /// Publish staged notifications, or drop them when notifications are off
    pub async fn publish<N>(&self, notifier: &N, outbox: &mut Outbox) -> usize
    where
        N: NotificationEffects + ?Sized,
    {
        if self.config.notifications_enabled {
            outbox.flush(notifier).await
        } else {
            outbox.discard();
            0
        }
    }

    /// Run one command inside `begin` / `commit`, publishing only after commit
    ///
    /// Any failure rolls the transaction back and drops the staged
    /// notifications; the original error is returned. A failed rollback is
    /// logged, not surfaced.
    pub async fn execute_in_transaction<E>(
        &self,
        effects: &E,
        command: CaseCommand,
    ) -> Result<CommandOutcome>
    where
        E: MortuaryEffects + TransactionEffects + ?Sized,
    {
        let name = command.name();
        effects.begin().await?;
        debug!(command = name, "Transaction started");

        let mut outbox = Outbox::new();
        let result = match self.dispatch(effects, command, &mut outbox).await {
            Ok(outcome) => effects
                .commit()
                .await
                .map(|()| outcome)
                .map_err(MortuaryError::from),
            Err(err) => Err(err),
        };

        match result {
            Ok(outcome) => {
                debug!(command = name, "Transaction committed");
                self.publish(effects, &mut outbox).await;
                Ok(outcome)
            }
            Err(err) => {
                outbox.discard();
                if let Err(rollback_err) = effects.rollback().await {
                    error!(
                        command = name,
                        error = %rollback_err,
                        original = %err,
                        "Rollback failed"
                    );
                }
                warn!(command = name, error = %err, "Command rolled back");
                Err(err)
            }
        }
    }
}
