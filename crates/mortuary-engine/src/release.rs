//! Release gate aggregation
//!
//! Combines independently owned blocking conditions into one release
//! decision. Every question is answered by re-reading all gates; nothing is
//! cached between calls.

use async_trait::async_trait;
use mortuary_core::effects::{EventCategory, Notification, ObligationRepository, StaffRole};
use mortuary_core::{
    CaseId, GateKind, GateReading, MortuaryError, ObligationStatus, ReleaseGate, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::notify::Outbox;

/// Per-gate readings for one case, in registration order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseAssessment {
    pub case_id: CaseId,
    pub readings: Vec<GateReading>,
}

impl ReleaseAssessment {
    /// True when no registered gate blocks
    pub fn can_release(&self) -> bool {
        self.readings.iter().all(|r| !r.blocks)
    }

    /// Kinds that still block, in registration order
    pub fn blocking(&self) -> Vec<GateKind> {
        self.readings
            .iter()
            .filter(|r| r.blocks)
            .map(|r| r.kind)
            .collect()
    }
}

/// Outcome of recomputing every gate after one of them cleared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum UnblockSignal {
    /// Nothing blocks release any more
    FullyUnblocked { case_id: CaseId },
    /// `resolved` cleared but `remaining` gates still block
    PartiallyUnblocked {
        case_id: CaseId,
        resolved: GateKind,
        remaining: usize,
        still_blocking: Vec<GateKind>,
    },
}

impl UnblockSignal {
    pub fn is_full(&self) -> bool {
        matches!(self, UnblockSignal::FullyUnblocked { .. })
    }

    fn notification(&self) -> Notification {
        let category = match self {
            UnblockSignal::FullyUnblocked { .. } => EventCategory::ReleaseFullyUnblocked,
            UnblockSignal::PartiallyUnblocked { .. } => EventCategory::ReleasePartiallyUnblocked,
        };
        Notification {
            category,
            payload: serde_json::to_value(self).unwrap_or(serde_json::Value::Null),
            target_roles: vec![StaffRole::AdmissionsClerk],
        }
    }
}

/// AND over every registered gate
#[derive(Clone, Default)]
pub struct ReleaseGateAggregator {
    gates: Vec<Arc<dyn ReleaseGate>>,
}

impl fmt::Debug for ReleaseGateAggregator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseGateAggregator")
            .field("gates", &self.gate_kinds())
            .finish()
    }
}

impl ReleaseGateAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gate; one gate per kind
    ///
    /// # Errors
    /// * `MortuaryError::Invalid` if a gate of the same kind is already registered
    pub fn register(&mut self, gate: Arc<dyn ReleaseGate>) -> Result<()> {
        let kind = gate.kind();
        if self.gates.iter().any(|g| g.kind() == kind) {
            return Err(MortuaryError::invalid(format!(
                "Release gate {kind} is already registered"
            )));
        }
        debug!(gate = %kind, "Release gate registered");
        self.gates.push(gate);
        Ok(())
    }

    /// Builder form of [`register`](Self::register)
    pub fn with_gate(mut self, gate: Arc<dyn ReleaseGate>) -> Result<Self> {
        self.register(gate)?;
        Ok(self)
    }

    pub fn gate_kinds(&self) -> Vec<GateKind> {
        self.gates.iter().map(|g| g.kind()).collect()
    }

    /// Read every gate for a case
    pub async fn assess(&self, case_id: CaseId) -> Result<ReleaseAssessment> {
        let mut readings = Vec::with_capacity(self.gates.len());
        for gate in &self.gates {
            readings.push(GateReading {
                kind: gate.kind(),
                blocks: gate.blocks_release(case_id).await?,
                status: gate.status_label(case_id).await?,
            });
        }
        Ok(ReleaseAssessment { case_id, readings })
    }

    /// Whether no registered gate blocks. Stops at the first blocker.
    pub async fn can_release(&self, case_id: CaseId) -> Result<bool> {
        for gate in &self.gates {
            if gate.blocks_release(case_id).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Kinds that currently block release
    pub async fn blocking_gates(&self, case_id: CaseId) -> Result<Vec<GateKind>> {
        let mut blocking = Vec::new();
        for gate in &self.gates {
            if gate.blocks_release(case_id).await? {
                blocking.push(gate.kind());
            }
        }
        Ok(blocking)
    }

    /// # Errors
    /// * `MortuaryError::GateBlocked` listing every gate that still blocks
    pub async fn ensure_releasable(&self, case_id: CaseId) -> Result<()> {
        let blocking = self.blocking_gates(case_id).await?;
        if blocking.is_empty() {
            Ok(())
        } else {
            info!(case = %case_id, blocking = ?blocking, "Release blocked");
            Err(MortuaryError::GateBlocked { blocking })
        }
    }

    /// Recompute all gates after `resolved` went from blocked to clear
    ///
    /// Stages a `ReleaseFullyUnblocked` or `ReleasePartiallyUnblocked`
    /// notification for the admissions desk.
    ///
    /// # Errors
    /// * `MortuaryError::NotFound` if no gate of that kind is registered
    /// * `MortuaryError::Invalid` if the named gate still blocks
    pub async fn on_gate_resolved(
        &self,
        case_id: CaseId,
        resolved: GateKind,
        outbox: &mut Outbox,
    ) -> Result<UnblockSignal> {
        if !self.gates.iter().any(|g| g.kind() == resolved) {
            return Err(MortuaryError::not_found(format!(
                "release gate {resolved}"
            )));
        }

        let still_blocking = self.blocking_gates(case_id).await?;
        if still_blocking.contains(&resolved) {
            return Err(MortuaryError::invalid(format!(
                "Gate {resolved} still blocks release of case {case_id}"
            )));
        }

        let signal = if still_blocking.is_empty() {
            info!(case = %case_id, gate = %resolved, "Release fully unblocked");
            UnblockSignal::FullyUnblocked { case_id }
        } else {
            info!(
                case = %case_id,
                gate = %resolved,
                remaining = still_blocking.len(),
                "Release partially unblocked"
            );
            UnblockSignal::PartiallyUnblocked {
                case_id,
                resolved,
                remaining: still_blocking.len(),
                still_blocking,
            }
        };

        outbox.push(signal.notification());
        Ok(signal)
    }
}

/// Gate backed by obligation records of one kind
///
/// Blocks while any obligation for the case is `Pending`.
pub struct ObligationGate<R> {
    kind: GateKind,
    repo: Arc<R>,
}

impl<R> ObligationGate<R>
where
    R: ObligationRepository,
{
    pub fn new(kind: GateKind, repo: Arc<R>) -> Self {
        Self { kind, repo }
    }

    async fn counts(&self, case_id: CaseId) -> Result<(usize, usize, usize)> {
        let obligations = self.repo.obligations_for_case(case_id, self.kind).await?;
        let mut counts = (0, 0, 0);
        for obligation in obligations {
            match obligation.status {
                status if status.blocks_release() => counts.0 += 1,
                ObligationStatus::Settled => counts.1 += 1,
                _ => counts.2 += 1,
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl<R> ReleaseGate for ObligationGate<R>
where
    R: ObligationRepository + 'static,
{
    fn kind(&self) -> GateKind {
        self.kind
    }

    async fn blocks_release(&self, case_id: CaseId) -> Result<bool> {
        let obligations = self.repo.obligations_for_case(case_id, self.kind).await?;
        Ok(obligations.iter().any(|o| o.status.blocks_release()))
    }

    async fn status_label(&self, case_id: CaseId) -> Result<String> {
        let (pending, settled, exempted) = self.counts(case_id).await?;
        Ok(if pending + settled + exempted == 0 {
            "no obligations".to_string()
        } else {
            format!("{pending} pending, {settled} settled, {exempted} exempted")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mortuary_core::{Obligation, ObligationId};
    use mortuary_testkit::{MemoryStore, ToggleGate};

    fn aggregator(gates: &[&ToggleGate]) -> ReleaseGateAggregator {
        let mut aggregator = ReleaseGateAggregator::new();
        for gate in gates {
            aggregator.register(Arc::new((*gate).clone())).unwrap();
        }
        aggregator
    }

    #[tokio::test]
    async fn test_no_gates_means_releasable() {
        let aggregator = ReleaseGateAggregator::new();
        assert!(aggregator.can_release(CaseId::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_any_blocking_gate_blocks() {
        let blood = ToggleGate::clear(GateKind::BloodDebt);
        let legal = ToggleGate::blocked(GateKind::LegalAuthorization);
        let aggregator = aggregator(&[&blood, &legal]);
        let case_id = CaseId::new();

        assert!(!aggregator.can_release(case_id).await.unwrap());
        let err = aggregator.ensure_releasable(case_id).await.unwrap_err();
        assert_eq!(
            err,
            MortuaryError::GateBlocked {
                blocking: vec![GateKind::LegalAuthorization]
            }
        );

        let assessment = aggregator.assess(case_id).await.unwrap();
        assert_eq!(assessment.readings.len(), 2);
        assert_eq!(assessment.readings[1].status, "pending");
        assert!(!assessment.can_release());
    }

    #[tokio::test]
    async fn test_partial_then_full_unblock() {
        let blood = ToggleGate::blocked(GateKind::BloodDebt);
        let money = ToggleGate::blocked(GateKind::FinancialDebt);
        let aggregator = aggregator(&[&blood, &money]);
        let case_id = CaseId::new();
        let mut outbox = Outbox::new();

        blood.resolve();
        let signal = aggregator
            .on_gate_resolved(case_id, GateKind::BloodDebt, &mut outbox)
            .await
            .unwrap();
        assert_eq!(
            signal,
            UnblockSignal::PartiallyUnblocked {
                case_id,
                resolved: GateKind::BloodDebt,
                remaining: 1,
                still_blocking: vec![GateKind::FinancialDebt],
            }
        );

        money.resolve();
        let signal = aggregator
            .on_gate_resolved(case_id, GateKind::FinancialDebt, &mut outbox)
            .await
            .unwrap();
        assert!(signal.is_full());

        let categories: Vec<_> = outbox.pending().iter().map(|n| n.category).collect();
        assert_eq!(
            categories,
            vec![
                EventCategory::ReleasePartiallyUnblocked,
                EventCategory::ReleaseFullyUnblocked
            ]
        );
    }

    #[tokio::test]
    async fn test_resolving_a_still_blocked_gate_is_rejected() {
        let blood = ToggleGate::blocked(GateKind::BloodDebt);
        let aggregator = aggregator(&[&blood]);
        let mut outbox = Outbox::new();

        let err = aggregator
            .on_gate_resolved(CaseId::new(), GateKind::BloodDebt, &mut outbox)
            .await
            .unwrap_err();
        assert!(matches!(err, MortuaryError::Invalid { .. }));

        let err = aggregator
            .on_gate_resolved(CaseId::new(), GateKind::LegalAuthorization, &mut outbox)
            .await
            .unwrap_err();
        assert!(matches!(err, MortuaryError::NotFound { .. }));
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_duplicate_kind_rejected() {
        let mut aggregator = ReleaseGateAggregator::new();
        aggregator
            .register(Arc::new(ToggleGate::clear(GateKind::BloodDebt)))
            .unwrap();
        assert!(aggregator
            .register(Arc::new(ToggleGate::blocked(GateKind::BloodDebt)))
            .is_err());
        assert_eq!(aggregator.gate_kinds(), vec![GateKind::BloodDebt]);
    }

    #[tokio::test]
    async fn test_obligation_gate_blocks_only_on_pending() {
        let store = Arc::new(MemoryStore::new());
        let gate = ObligationGate::new(GateKind::DocumentCompleteness, store.clone());
        let case_id = CaseId::new();
        assert!(!gate.blocks_release(case_id).await.unwrap());
        assert_eq!(gate.status_label(case_id).await.unwrap(), "no obligations");

        let mut certificate = Obligation {
            id: ObligationId::new(),
            case_id,
            gate: GateKind::DocumentCompleteness,
            status: ObligationStatus::Pending,
            description: "Death certificate".to_string(),
            updated_at: Utc::now(),
        };
        store.create_obligation(&certificate).await.unwrap();
        assert!(gate.blocks_release(case_id).await.unwrap());

        // A settled obligation alongside a pending one still blocks
        let autopsy = Obligation {
            id: ObligationId::new(),
            status: ObligationStatus::Settled,
            description: "Autopsy report".to_string(),
            ..certificate.clone()
        };
        store.create_obligation(&autopsy).await.unwrap();
        assert!(gate.blocks_release(case_id).await.unwrap());
        assert_eq!(
            gate.status_label(case_id).await.unwrap(),
            "1 pending, 1 settled, 0 exempted"
        );

        certificate.status = ObligationStatus::Exempted;
        store.update_obligation(&certificate).await.unwrap();
        assert!(!gate.blocks_release(case_id).await.unwrap());
        assert_eq!(
            gate.status_label(case_id).await.unwrap(),
            "0 pending, 1 settled, 1 exempted"
        );
    }
}
