//! Supertraits for common effect combinations

use super::{
    AuditRepository, CaseRepository, CustodyRepository, NotificationEffects, PhysicalTimeEffects,
    RandomEffects, TrayRepository,
};

/// Everything a case workflow step touches
///
/// Combines the case, tray, custody and audit repositories with the
/// notification channel, the clock and the identifier source.
pub trait MortuaryEffects:
    CaseRepository
    + TrayRepository
    + CustodyRepository
    + AuditRepository
    + NotificationEffects
    + PhysicalTimeEffects
    + RandomEffects
{
}

/// Automatic implementation for types that satisfy the required bounds
impl<T> MortuaryEffects for T where
    T: CaseRepository
        + TrayRepository
        + CustodyRepository
        + AuditRepository
        + NotificationEffects
        + PhysicalTimeEffects
        + RandomEffects
{
}
