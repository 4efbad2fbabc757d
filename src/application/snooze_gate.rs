use crate::domain::models::snooze_duration;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::snooze_store::SnoozeRepository;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Global "do not disturb" switch shared by the run loop and the dispatcher.
pub struct SnoozeGate {
    repository: Arc<dyn SnoozeRepository>,
}

impl SnoozeGate {
    pub fn new(repository: Arc<dyn SnoozeRepository>) -> Self {
        Self { repository }
    }

    /// Returns the active deadline, if any. Missing or corrupt state is "not snoozed".
    pub fn snoozed_until(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.repository.load().filter(|until| now < *until)
    }

    pub fn is_snoozed(&self, now: DateTime<Utc>) -> bool {
        self.snoozed_until(now).is_some()
    }

    pub fn snooze(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, InfraError> {
        let until = now + snooze_duration();
        self.repository.save(until)?;
        tracing::info!(until = %until, "alerts snoozed");
        Ok(until)
    }
}
