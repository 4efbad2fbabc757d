use crate::domain::models::AlertEvent;
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, Utc};
use std::collections::HashMap;

const BUSY_PLACEHOLDER: &str = "busy";
const DAY_VIEW_BASE: &str = "https://calendar.google.com/calendar/r/day";
const PRIMARY_CALENDAR_ID: &str = "primary";
const PRIMARY_LABEL: &str = "Personal";
const FALLBACK_LABEL: &str = "Other";

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct CalendarEventDateTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct ConferenceEntryPoint {
    #[serde(rename = "entryPointType", default, skip_serializing_if = "Option::is_none")]
    pub entry_point_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct ConferenceData {
    #[serde(rename = "entryPoints", default, skip_serializing_if = "Vec::is_empty")]
    pub entry_points: Vec<ConferenceEntryPoint>,
}

/// Event record as returned by the Google Calendar events.list endpoint.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq, Default)]
pub struct GoogleCalendarEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<CalendarEventDateTime>,
    #[serde(rename = "hangoutLink", default, skip_serializing_if = "Option::is_none")]
    pub hangout_link: Option<String>,
    #[serde(rename = "conferenceData", default, skip_serializing_if = "Option::is_none")]
    pub conference_data: Option<ConferenceData>,
}

/// Calendar id to display label lookup used for synthesized titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarLabels {
    overrides: HashMap<String, String>,
}

impl CalendarLabels {
    pub fn new(overrides: HashMap<String, String>) -> Self {
        Self { overrides }
    }

    pub fn label_for(&self, calendar_id: &str) -> &str {
        if let Some(label) = self
            .overrides
            .get(calendar_id)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
        {
            return label;
        }
        if calendar_id == PRIMARY_CALENDAR_ID {
            PRIMARY_LABEL
        } else {
            FALLBACK_LABEL
        }
    }
}

impl Default for CalendarLabels {
    fn default() -> Self {
        Self::new(HashMap::new())
    }
}

/// Maps a raw record to an [`AlertEvent`] whether or not it can be alerted on.
///
/// Returns `None` only when the record has no id or no resolvable start.
pub fn decode_event(
    calendar_id: &str,
    event: &GoogleCalendarEvent,
    labels: &CalendarLabels,
) -> Option<AlertEvent> {
    let event_id = event
        .id
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())?;
    let start = event.start.as_ref()?;
    let resolved = resolve_start(start)?;

    let is_cancelled = event
        .status
        .as_deref()
        .map(|status| status.trim().eq_ignore_ascii_case("cancelled"))
        .unwrap_or(false);

    Some(AlertEvent {
        calendar_id: calendar_id.to_string(),
        event_id: event_id.to_string(),
        start_instant: resolved.instant,
        is_all_day: resolved.is_all_day,
        is_cancelled,
        title: resolve_title(event.summary.as_deref(), calendar_id, labels),
        join_url: Some(resolve_link(event, resolved.local_date)),
    })
}

/// Maps a raw record to an alert candidate, dropping cancelled and all-day events.
pub fn normalize_event(
    calendar_id: &str,
    event: &GoogleCalendarEvent,
    labels: &CalendarLabels,
) -> Option<AlertEvent> {
    decode_event(calendar_id, event, labels).filter(AlertEvent::is_alertable)
}

struct ResolvedStart {
    instant: DateTime<Utc>,
    local_date: NaiveDate,
    is_all_day: bool,
}

fn resolve_start(start: &CalendarEventDateTime) -> Option<ResolvedStart> {
    if let Some(parsed) = start
        .date_time
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| DateTime::<FixedOffset>::parse_from_rfc3339(value).ok())
    {
        return Some(ResolvedStart {
            instant: parsed.with_timezone(&Utc),
            local_date: parsed.date_naive(),
            is_all_day: false,
        });
    }

    let date = start
        .date
        .as_deref()
        .map(str::trim)
        .and_then(|value| NaiveDate::parse_from_str(value, "%Y-%m-%d").ok())?;
    Some(ResolvedStart {
        instant: date.and_hms_opt(0, 0, 0)?.and_utc(),
        local_date: date,
        is_all_day: true,
    })
}

fn resolve_title(summary: Option<&str>, calendar_id: &str, labels: &CalendarLabels) -> String {
    match summary.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) if !value.eq_ignore_ascii_case(BUSY_PLACEHOLDER) => value.to_string(),
        _ => format!("Busy block ({})", labels.label_for(calendar_id)),
    }
}

fn resolve_link(event: &GoogleCalendarEvent, local_date: NaiveDate) -> String {
    let explicit = event
        .hangout_link
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let entry_point = || {
        event
            .conference_data
            .as_ref()?
            .entry_points
            .iter()
            .filter_map(|entry| entry.uri.as_deref().map(str::trim))
            .find(|uri| !uri.is_empty())
    };

    explicit
        .or_else(entry_point)
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| day_view_url(local_date))
}

pub fn day_view_url(date: NaiveDate) -> String {
    format!(
        "{DAY_VIEW_BASE}/{}/{:02}/{:02}",
        date.year(),
        date.month(),
        date.day()
    )
}
