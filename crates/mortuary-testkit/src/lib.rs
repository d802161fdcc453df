//! Mortuary testing infrastructure
//!
//! In-memory handlers for every effect trait in `mortuary-core`, a manual
//! clock, a sequential id source, a recording notifier and hand-toggled
//! release gates.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! mortuary-testkit = { path = "../mortuary-testkit" }
//! ```
//!
//! ```rust,ignore
//! let effects = TestEffects::new();
//! let trays = seed_trays(&effects, 3).await?;
//! effects.clock.advance_secs(301);
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(missing_docs)]

pub mod effects;
pub mod fixtures;
pub mod gates;
pub mod ids;
pub mod notifier;
pub mod store;
pub mod time;

pub use effects::TestEffects;
pub use fixtures::*;
pub use gates::ToggleGate;
pub use ids::SequentialIds;
pub use notifier::RecordingNotifier;
pub use store::{FailurePoints, MemoryStore};
pub use time::ManualClock;

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber for tests; safe to call more than once.
///
/// Honours `RUST_LOG`, defaulting to `warn`.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
