use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const KEY_SEPARATOR: &str = "@@";

/// How long an alerted occurrence is remembered before it is pruned.
pub const ALERT_RETENTION_HOURS: i64 = 6;
/// Fixed snooze length applied when the user picks "snooze".
pub const SNOOZE_MINUTES: i64 = 5;
/// Extra minutes fetched past the lead window so a run sees events just before they become due.
pub const FETCH_BUFFER_MINUTES: i64 = 3;

pub fn alert_retention() -> Duration {
    Duration::hours(ALERT_RETENTION_HOURS)
}

pub fn snooze_duration() -> Duration {
    Duration::minutes(SNOOZE_MINUTES)
}

/// A calendar event reduced to what the alerting pipeline needs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AlertEvent {
    pub calendar_id: String,
    pub event_id: String,
    pub start_instant: DateTime<Utc>,
    pub is_all_day: bool,
    pub is_cancelled: bool,
    pub title: String,
    pub join_url: Option<String>,
}

impl AlertEvent {
    pub fn is_alertable(&self) -> bool {
        !self.is_all_day && !self.is_cancelled
    }

    pub fn occurrence_key(&self) -> OccurrenceKey {
        OccurrenceKey::new(&self.calendar_id, &self.event_id, self.start_instant)
    }
}

/// Dedup identity of one (calendar, event, start) occurrence.
///
/// A rescheduled event keeps its id but gets a new key, so it is alerted again.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OccurrenceKey(String);

impl OccurrenceKey {
    pub fn new(calendar_id: &str, event_id: &str, start_instant: DateTime<Utc>) -> Self {
        let start = start_instant.to_rfc3339_opts(SecondsFormat::Millis, true);
        Self(format!(
            "{calendar_id}{KEY_SEPARATOR}{event_id}{KEY_SEPARATOR}{start}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for OccurrenceKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for OccurrenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertOutcome {
    Dismissed,
    Snoozed,
    LinkOpened,
    TimedOut,
}

impl AlertOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dismissed => "dismissed",
            Self::Snoozed => "snoozed",
            Self::LinkOpened => "link_opened",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for AlertOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub scope: Option<String>,
}

impl OAuthToken {
    pub fn is_valid_at(&self, now: DateTime<Utc>, leeway_seconds: i64) -> bool {
        self.expires_at > now + Duration::seconds(leeway_seconds)
            && !self.access_token.trim().is_empty()
    }
}
