//! Wall-clock time effect

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Error type for time operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeError {
    #[error("Time service unavailable")]
    ServiceUnavailable,
    #[error("Operation failed: {reason}")]
    OperationFailed { reason: String },
}

/// Wall-clock time for ledger, tray and audit timestamps
#[async_trait]
pub trait PhysicalTimeEffects: Send + Sync {
    async fn physical_time(&self) -> Result<DateTime<Utc>, TimeError>;
}

/// Blanket implementation for Arc<T> where T: PhysicalTimeEffects
#[async_trait]
impl<T: PhysicalTimeEffects + ?Sized> PhysicalTimeEffects for std::sync::Arc<T> {
    async fn physical_time(&self) -> Result<DateTime<Utc>, TimeError> {
        (**self).physical_time().await
    }
}
