//! Deterministic identifier source

use async_trait::async_trait;
use mortuary_core::effects::RandomEffects;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Hands out `00000000-…-000000000001`, `…002`, … in call order
#[derive(Debug, Clone, Default)]
pub struct SequentialIds {
    issued: Arc<AtomicU64>,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many ids have been handed out
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RandomEffects for SequentialIds {
    async fn random_uuid(&self) -> Uuid {
        let next = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Uuid::from_u128(u128::from(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_the_sequence() {
        let ids = SequentialIds::new();
        let other = ids.clone();
        assert_eq!(ids.random_uuid().await, Uuid::from_u128(1));
        assert_eq!(other.random_uuid().await, Uuid::from_u128(2));
        assert_eq!(ids.issued(), 2);
    }
}
