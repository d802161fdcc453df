//! Notification handler that records what was published

use async_trait::async_trait;
use mortuary_core::effects::{EventCategory, Notification, NotificationEffects, NotificationError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Captures published notifications; can be told to fail delivery
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    published: Arc<Mutex<Vec<Notification>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent publish fail
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Everything published so far
    pub fn published(&self) -> Vec<Notification> {
        self.published.lock().unwrap().clone()
    }

    /// Published notifications of one category
    pub fn of_category(&self, category: EventCategory) -> Vec<Notification> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.category == category)
            .cloned()
            .collect()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

#[async_trait]
impl NotificationEffects for RecordingNotifier {
    async fn publish(&self, notification: &Notification) -> Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError::Unavailable);
        }
        self.published.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
