//! Caller-owned transaction boundary
//!
//! The engine performs no locking of its own. An adapter opens one transaction
//! per inbound action, runs the transition together with its tray and ledger
//! side effects, and commits or rolls back as a unit.

use async_trait::async_trait;

use super::RepositoryError;

#[async_trait]
pub trait TransactionEffects: Send + Sync {
    async fn begin(&self) -> Result<(), RepositoryError>;
    async fn commit(&self) -> Result<(), RepositoryError>;
    async fn rollback(&self) -> Result<(), RepositoryError>;
}
