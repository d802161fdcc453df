//! Mortuary Engine - guarded lifecycle for deceased-patient custody
//!
//! Five stateless components plus the workflow that composes them:
//!
//! - [`LifecycleEngine`]: static `(state, trigger) → state` table; `fire` is the sole mutator
//! - [`TrayPool`]: fixed tray inventory with compare-and-set allocation and push-model occupancy alerts
//! - [`CustodyLedger`]: append-only hand-offs; custodian and location are always derived
//! - [`ReleaseGateAggregator`]: AND over externally owned release gates, recomputed on every question
//! - [`AuditRecorder`]: best-effort, append-only audit trail
//! - [`CaseWorkflow`]: one method per human action, plus `execute_in_transaction`
//!
//! No component holds a store, a clock or a notifier. Handlers from
//! `mortuary-core::effects` are passed in per call, and notifications are
//! staged in an [`Outbox`] that is only flushed after the caller commits.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

pub mod audit;
pub mod custody;
pub mod lifecycle;
pub mod notify;
pub mod pool;
pub mod release;
pub mod workflow;

pub use audit::{AuditEntry, AuditRecorder};
pub use custody::{derive_location, zone_for, CustodyLedger};
pub use lifecycle::{LifecycleEngine, TransitionEvent, TRANSITIONS};
pub use notify::{roles_for_state, status_changed, Outbox};
pub use pool::{Allocation, TrayPool};
pub use release::{ObligationGate, ReleaseAssessment, ReleaseGateAggregator, UnblockSignal};
pub use workflow::{
    CaseCommand, CaseWorkflow, CommandOutcome, TransitionOutcome, MORTUARY_RECEPTION,
};
