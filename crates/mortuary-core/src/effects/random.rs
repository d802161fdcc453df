//! Identifier randomness effect

use async_trait::async_trait;
use uuid::Uuid;

/// Source of fresh identifiers for cases, trays, transfers and audit records
///
/// Handlers decide how ids are drawn; tests plug in a deterministic sequence.
#[async_trait]
pub trait RandomEffects: Send + Sync {
    async fn random_uuid(&self) -> Uuid;
}

/// Blanket implementation for Arc<T> where T: RandomEffects
#[async_trait]
impl<T: RandomEffects + ?Sized> RandomEffects for std::sync::Arc<T> {
    async fn random_uuid(&self) -> Uuid {
        (**self).random_uuid().await
    }
}
