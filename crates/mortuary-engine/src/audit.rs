//! Best-effort audit recorder
//!
//! Every component reports its mutations here. A failed write is logged as an
//! `AuditWriteFailure` and swallowed: auditing never blocks or rolls back the
//! operation that triggered it.

use mortuary_core::effects::{AuditRepository, PhysicalTimeEffects, RandomEffects};
use mortuary_core::{ActorId, AuditModule, AuditRecord, AuditRecordId, CaseId, MortuaryError};
use serde::Serialize;
use tracing::{trace, warn};

/// Serialize a value into an opaque snapshot, logging instead of failing
pub fn snapshot<T: Serialize + ?Sized>(value: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(value) => Some(value),
        Err(err) => {
            warn!(error = %err, "Audit snapshot serialization failed");
            None
        }
    }
}

/// One audit entry before id and timestamp are assigned
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub module: AuditModule,
    pub action: String,
    pub actor: ActorId,
    pub case_id: Option<CaseId>,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

impl AuditEntry {
    pub fn new(module: AuditModule, action: impl Into<String>, actor: ActorId) -> Self {
        Self {
            module,
            action: action.into(),
            actor,
            case_id: None,
            before: None,
            after: None,
        }
    }

    pub fn for_case(mut self, case_id: CaseId) -> Self {
        self.case_id = Some(case_id);
        self
    }

    pub fn before<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.before = snapshot(value);
        self
    }

    pub fn after<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        self.after = snapshot(value);
        self
    }
}

/// Stateless audit recorder
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditRecorder;

impl AuditRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Append one immutable audit record
    ///
    /// Returns the new record id, or `None` when the write failed and was
    /// discarded.
    pub async fn record<E>(&self, effects: &E, entry: AuditEntry) -> Option<AuditRecordId>
    where
        E: AuditRepository + PhysicalTimeEffects + RandomEffects + ?Sized,
    {
        let recorded_at = match effects.physical_time().await {
            Ok(now) => now,
            Err(err) => {
                Self::log_failure(&entry, &MortuaryError::from(err));
                return None;
            }
        };

        let record = AuditRecord {
            id: AuditRecordId::from_uuid(effects.random_uuid().await),
            module: entry.module,
            action: entry.action,
            actor: entry.actor,
            case_id: entry.case_id,
            before: entry.before,
            after: entry.after,
            recorded_at,
        };

        match effects.append_audit(&record).await {
            Ok(()) => {
                trace!(
                    module = %record.module,
                    action = %record.action,
                    audit = %record.id,
                    "Audit record written"
                );
                Some(record.id)
            }
            Err(err) => {
                let failure = MortuaryError::AuditWriteFailure {
                    message: err.to_string(),
                };
                warn!(
                    module = %record.module,
                    action = %record.action,
                    case = ?record.case_id,
                    error = %failure,
                    "Discarding audit record"
                );
                None
            }
        }
    }

    fn log_failure(entry: &AuditEntry, err: &MortuaryError) {
        warn!(
            module = %entry.module,
            action = %entry.action,
            case = ?entry.case_id,
            error = %err,
            "Discarding audit record"
        );
    }
}
