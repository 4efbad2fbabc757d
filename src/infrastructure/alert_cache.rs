use crate::domain::models::OccurrenceKey;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::write_json_atomic;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Occurrences that have already been alerted, keyed by occurrence with the
/// epoch-millisecond time the alert was recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertCache {
    entries: BTreeMap<String, i64>,
}

impl AlertCache {
    pub fn from_entries(entries: BTreeMap<String, i64>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<String, i64> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has(&self, key: &OccurrenceKey) -> bool {
        self.entries.contains_key(key.as_str())
    }

    pub fn record(&mut self, key: &OccurrenceKey, now: DateTime<Utc>) {
        self.entries
            .insert(key.as_str().to_string(), now.timestamp_millis());
    }

    pub fn recorded_at(&self, key: &OccurrenceKey) -> Option<DateTime<Utc>> {
        self.entries
            .get(key.as_str())
            .and_then(|millis| DateTime::from_timestamp_millis(*millis))
    }

    /// Drops entries recorded before `now - retention`; returns how many were removed.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: Duration) -> usize {
        let cutoff = (now - retention).timestamp_millis();
        let before = self.entries.len();
        self.entries.retain(|_, recorded_at| *recorded_at >= cutoff);
        before - self.entries.len()
    }
}

pub trait AlertCacheRepository: Send + Sync {
    /// Missing or unreadable state loads as an empty cache.
    fn load(&self) -> AlertCache;
    /// Replaces the persisted cache with `cache`.
    fn save(&self, cache: &AlertCache) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct JsonFileAlertCacheRepository {
    path: PathBuf,
}

impl JsonFileAlertCacheRepository {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn read(&self) -> Result<AlertCache, InfraError> {
        let raw = fs::read_to_string(&self.path)?;
        let parsed: BTreeMap<String, serde_json::Value> = serde_json::from_str(&raw)?;
        let entries = parsed
            .into_iter()
            .filter_map(|(key, value)| {
                let millis = value
                    .as_i64()
                    .or_else(|| value.as_f64().map(|float| float as i64))?;
                Some((key, millis))
            })
            .collect();
        Ok(AlertCache::from_entries(entries))
    }
}

impl AlertCacheRepository for JsonFileAlertCacheRepository {
    fn load(&self) -> AlertCache {
        match self.read() {
            Ok(cache) => cache,
            Err(InfraError::Io(error)) if error.kind() == std::io::ErrorKind::NotFound => {
                AlertCache::default()
            }
            Err(error) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %error,
                    "alert cache unreadable, starting empty"
                );
                AlertCache::default()
            }
        }
    }

    fn save(&self, cache: &AlertCache) -> Result<(), InfraError> {
        write_json_atomic(&self.path, cache.entries())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryAlertCacheRepository {
    cache: Mutex<AlertCache>,
    saves: AtomicUsize,
}

impl InMemoryAlertCacheRepository {
    pub fn with_cache(cache: AlertCache) -> Self {
        Self {
            cache: Mutex::new(cache),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl AlertCacheRepository for InMemoryAlertCacheRepository {
    fn load(&self) -> AlertCache {
        self.cache
            .lock()
            .map(|cache| cache.clone())
            .unwrap_or_default()
    }

    fn save(&self, cache: &AlertCache) -> Result<(), InfraError> {
        let mut guard = self
            .cache
            .lock()
            .map_err(|error| InfraError::Lock(format!("alert cache lock poisoned: {error}")))?;
        *guard = cache.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
