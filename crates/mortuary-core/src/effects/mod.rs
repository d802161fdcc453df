//! Effect interfaces for the mortuary core
//!
//! Pure trait signatures for every collaborator the engine talks to. The
//! engine never owns a store, a clock or a notification channel; handlers are
//! passed in per call and implemented outside the core (production adapters,
//! or `mortuary-testkit` for tests).
//!
//! - **Repositories**: per-entity `get` / `find_by_*` / `create` / `update`
//! - **Notifications**: best-effort `publish`
//! - **Time**: `physical_time`
//! - **Randomness**: `random_uuid` for every minted identifier
//! - **Transactions**: caller-owned `begin` / `commit` / `rollback`

pub mod notification;
pub mod random;
pub mod repository;
pub mod supertraits;
pub mod time;
pub mod transaction;

pub use notification::{EventCategory, Notification, NotificationEffects, NotificationError, StaffRole};
pub use random::RandomEffects;
pub use repository::{
    AuditRepository, CaseRepository, CustodyRepository, ObligationRepository, RepositoryError,
    TrayRepository,
};
pub use supertraits::MortuaryEffects;
pub use time::{PhysicalTimeEffects, TimeError};
pub use transaction::TransactionEffects;
