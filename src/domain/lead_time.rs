use crate::domain::models::AlertEvent;
use chrono::{DateTime, Duration, Utc};

/// How far past its start an event may be and still count as due.
pub const DUE_TOLERANCE_MS: i64 = 1_000;

/// An event is due once it starts within `lead_minutes`, until shortly after it started.
pub fn is_due(event: &AlertEvent, now: DateTime<Utc>, lead_minutes: u32) -> bool {
    let until_start = (event.start_instant - now).num_milliseconds();
    let lead_ms = i64::from(lead_minutes) * 60_000;
    (-DUE_TOLERANCE_MS..=lead_ms).contains(&until_start)
}

/// Fetch window covering the lead time plus a buffer so events are seen before they are due.
pub fn fetch_window(
    now: DateTime<Utc>,
    lead_minutes: u32,
    buffer_minutes: i64,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let max = now + Duration::minutes(i64::from(lead_minutes) + buffer_minutes);
    (now, max)
}
