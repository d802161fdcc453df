//! Common fixtures

use mortuary_core::effects::{CaseRepository, RandomEffects, RepositoryError, TrayRepository};
use mortuary_core::{ActorId, Case, CaseCode, CaseId, Tray, TrayCode, TrayId};

use crate::effects::TestEffects;

/// Case code `MC-<n>`
pub fn case_code(n: u32) -> CaseCode {
    CaseCode::new(format!("MC-{n:04}")).unwrap()
}

/// Tray code `T<n>`
pub fn tray_code(n: u32) -> TrayCode {
    TrayCode::new(format!("T{n}")).unwrap()
}

/// Insert a fresh `OnWard` case straight into the store
pub async fn seed_case(effects: &TestEffects, creator: ActorId) -> Result<Case, RepositoryError> {
    let case = Case::open(
        CaseId::from_uuid(effects.random_uuid().await),
        case_code(1),
        creator,
        effects.clock.now(),
    );
    effects.create_case(&case).await?;
    Ok(case)
}

/// Insert `count` available trays `T1..=Tcount`
pub async fn seed_trays(effects: &TestEffects, count: u32) -> Result<Vec<Tray>, RepositoryError> {
    let mut trays = Vec::with_capacity(count as usize);
    for n in 1..=count {
        let tray = Tray::provision(TrayId::from_uuid(effects.random_uuid().await), tray_code(n));
        effects.create_tray(&tray).await?;
        trays.push(tray);
    }
    Ok(trays)
}
