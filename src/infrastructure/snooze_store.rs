use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::write_atomic;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

pub trait SnoozeRepository: Send + Sync {
    /// Missing or unparsable state reads as `None`.
    fn load(&self) -> Option<DateTime<Utc>>;
    fn save(&self, snooze_until: DateTime<Utc>) -> Result<(), InfraError>;
}

/// Snooze marker stored as decimal epoch milliseconds.
#[derive(Debug, Clone)]
pub struct FileSnoozeRepository {
    path: PathBuf,
}

impl FileSnoozeRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SnoozeRepository for FileSnoozeRepository {
    fn load(&self) -> Option<DateTime<Utc>> {
        let raw = fs::read_to_string(&self.path).ok()?;
        let parsed = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::from_timestamp_millis);
        if parsed.is_none() {
            tracing::debug!(path = %self.path.display(), "ignoring unparsable snooze marker");
        }
        parsed
    }

    fn save(&self, snooze_until: DateTime<Utc>) -> Result<(), InfraError> {
        write_atomic(&self.path, snooze_until.timestamp_millis().to_string().as_bytes())
    }
}

#[derive(Debug, Default)]
pub struct InMemorySnoozeRepository {
    snooze_until: Mutex<Option<DateTime<Utc>>>,
    saves: AtomicUsize,
}

impl InMemorySnoozeRepository {
    pub fn with_snooze_until(snooze_until: DateTime<Utc>) -> Self {
        Self {
            snooze_until: Mutex::new(Some(snooze_until)),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl SnoozeRepository for InMemorySnoozeRepository {
    fn load(&self) -> Option<DateTime<Utc>> {
        self.snooze_until.lock().ok().and_then(|guard| *guard)
    }

    fn save(&self, snooze_until: DateTime<Utc>) -> Result<(), InfraError> {
        let mut guard = self
            .snooze_until
            .lock()
            .map_err(|error| InfraError::Lock(format!("snooze lock poisoned: {error}")))?;
        *guard = Some(snooze_until);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
