//! Release gates whose answer a test flips by hand

use async_trait::async_trait;
use mortuary_core::{CaseId, GateKind, ReleaseGate, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Gate that blocks every case until cleared. Clones share state.
#[derive(Debug, Clone)]
pub struct ToggleGate {
    kind: GateKind,
    blocked: Arc<AtomicBool>,
}

impl ToggleGate {
    /// Start blocked
    pub fn blocked(kind: GateKind) -> Self {
        Self {
            kind,
            blocked: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Start clear
    pub fn clear(kind: GateKind) -> Self {
        Self {
            kind,
            blocked: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Clear the gate
    pub fn resolve(&self) {
        self.set_blocked(false);
    }
}

#[async_trait]
impl ReleaseGate for ToggleGate {
    fn kind(&self) -> GateKind {
        self.kind
    }

    async fn blocks_release(&self, _case_id: CaseId) -> Result<bool> {
        Ok(self.blocked.load(Ordering::SeqCst))
    }

    async fn status_label(&self, _case_id: CaseId) -> Result<String> {
        Ok(if self.blocked.load(Ordering::SeqCst) {
            "pending".to_string()
        } else {
            "cleared".to_string()
        })
    }
}
