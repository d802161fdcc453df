//! Controllable clock for deterministic tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use mortuary_core::effects::{PhysicalTimeEffects, TimeError};
use std::sync::{Arc, Mutex};

/// Clock that only moves when told to
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Frozen at 2024-01-01T08:00:00Z
    pub fn new() -> Self {
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 8, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::starting_at(start)
    }

    /// Frozen at the given instant
    pub fn starting_at(at: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(at)),
        }
    }

    /// Current frozen instant
    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    /// Move the clock forward
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    /// Move the clock forward by whole seconds
    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    /// Jump to an instant
    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

#[async_trait]
impl PhysicalTimeEffects for ManualClock {
    async fn physical_time(&self) -> Result<DateTime<Utc>, TimeError> {
        Ok(self.now())
    }
}
