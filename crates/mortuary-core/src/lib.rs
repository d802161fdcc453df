//! Mortuary Core - interface layer for the case custody engine
//!
//! This crate holds the vocabulary shared by every component: identifiers,
//! the case/tray/custody/audit records, the release gate contract, the unified
//! error type, configuration, and the effect traits through which the engine
//! reaches its collaborators. It contains no component logic.
//!
//! # Data model
//! - `Case`: exactly one `CaseState`; tray reference present iff the state occupies a tray
//! - `Tray`: `Occupied` iff an occupying case is recorded
//! - `CustodyTransfer`, `AuditRecord`: create-only
//!
//! # Effect interfaces
//! - `CaseRepository`, `TrayRepository`, `CustodyRepository`, `ObligationRepository`, `AuditRepository`
//! - `NotificationEffects`: best-effort fan-out
//! - `PhysicalTimeEffects`: wall clock
//! - `RandomEffects`: identifier source
//! - `TransactionEffects`: caller-owned unit of work

#![allow(missing_docs)]
#![forbid(unsafe_code)]

/// Audit record vocabulary
pub mod audit;

/// Case record, states and triggers
pub mod case;

/// Engine configuration
pub mod config;

/// Custody ledger records and derived locations
pub mod custody;

/// Pure effect interfaces (no implementations)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Release gate contract and obligation records
pub mod gates;

/// Entity identifiers and codes
pub mod identifiers;

/// Tray records and occupancy statistics
pub mod tray;

pub use audit::{AuditModule, AuditRecord};
pub use case::{Case, CaseState, Trigger};
pub use config::{
    ConfigMerge, ConfigValidation, MortuaryConfig, MAX_DUPLICATE_TRANSFER_WINDOW_SECS,
};
pub use custody::{CurrentLocation, CustodyTransfer, LocationZone, TransferRequest};
pub use effects::{
    AuditRepository, CaseRepository, CustodyRepository, EventCategory, MortuaryEffects,
    Notification, NotificationEffects, NotificationError, ObligationRepository,
    PhysicalTimeEffects, RandomEffects, RepositoryError, StaffRole, TimeError,
    TransactionEffects, TrayRepository,
};
pub use errors::{MortuaryError, Result};
pub use gates::{GateKind, GateReading, Obligation, ObligationStatus, ReleaseGate};
pub use identifiers::{
    ActorId, AuditRecordId, CaseCode, CaseId, ObligationId, TransferId, TrayCode, TrayId,
};
pub use tray::{OccupancyStats, Tray, TrayStamp, TrayStatus};
