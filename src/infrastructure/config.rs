use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::CalendarLabels;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ALERTS_JSON: &str = "alerts.json";
const SUPPORTED_SCHEMA: u64 = 1;
const DEFAULT_LEAD_MINUTES: u32 = 2;
const DEFAULT_ALERT_DURATION_SECONDS: u64 = 120;
const DEFAULT_CALENDAR_ID: &str = "primary";

/// Settings for one alerting run. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertConfig {
    pub lead_minutes: u32,
    pub alert_duration_seconds: u64,
    pub calendar_ids: Vec<String>,
    pub calendar_labels: HashMap<String, String>,
    pub timezone: Option<Tz>,
    pub isolate_calendar_failures: bool,
    pub dialog_icon: Option<PathBuf>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            lead_minutes: DEFAULT_LEAD_MINUTES,
            alert_duration_seconds: DEFAULT_ALERT_DURATION_SECONDS,
            calendar_ids: vec![DEFAULT_CALENDAR_ID.to_string()],
            calendar_labels: HashMap::from([(
                DEFAULT_CALENDAR_ID.to_string(),
                "Personal".to_string(),
            )]),
            timezone: None,
            isolate_calendar_failures: false,
            dialog_icon: None,
        }
    }
}

impl AlertConfig {
    pub fn labels(&self) -> CalendarLabels {
        CalendarLabels::new(self.calendar_labels.clone())
    }

    pub fn alert_duration(&self) -> Duration {
        Duration::from_secs(self.alert_duration_seconds)
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        if self.lead_minutes == 0 {
            return Err(InfraError::InvalidConfig(
                "leadMinutes must be > 0".to_string(),
            ));
        }
        if self.alert_duration_seconds == 0 {
            return Err(InfraError::InvalidConfig(
                "alertDurationSeconds must be > 0".to_string(),
            ));
        }
        if self.calendar_ids.is_empty() {
            return Err(InfraError::InvalidConfig(
                "calendarIds must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies command-line / environment overrides on top of the file config.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Result<Self, InfraError> {
        if let Some(lead_minutes) = overrides.lead_minutes {
            self.lead_minutes = lead_minutes;
        }
        if let Some(seconds) = overrides.alert_duration_seconds {
            self.alert_duration_seconds = seconds;
        }
        if let Some(calendar_ids) = overrides.calendar_ids {
            self.calendar_ids = normalize_calendar_ids(calendar_ids);
        }
        self.validate()?;
        Ok(self)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub lead_minutes: Option<u32>,
    pub alert_duration_seconds: Option<u64>,
    pub calendar_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertConfigFile {
    lead_minutes: Option<u32>,
    alert_duration_seconds: Option<u64>,
    calendar_ids: Option<Vec<String>>,
    #[serde(default)]
    calendar_labels: HashMap<String, String>,
    timezone: Option<String>,
    #[serde(default)]
    isolate_calendar_failures: bool,
    dialog_icon: Option<String>,
}

fn default_file() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "leadMinutes": DEFAULT_LEAD_MINUTES,
        "alertDurationSeconds": DEFAULT_ALERT_DURATION_SECONDS,
        "calendarIds": [DEFAULT_CALENDAR_ID],
        "calendarLabels": { "primary": "Personal" },
        "timezone": null,
        "isolateCalendarFailures": false,
        "dialogIcon": null
    })
}

pub fn ensure_default_config(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(ALERTS_JSON);
    if !path.exists() {
        fs::create_dir_all(config_dir)?;
        let formatted = serde_json::to_string_pretty(&default_file())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

pub fn load_config(config_dir: &Path) -> Result<AlertConfig, InfraError> {
    let path = config_dir.join(ALERTS_JSON);
    let file: AlertConfigFile = serde_json::from_value(read_config(&path)?)?;
    let defaults = AlertConfig::default();

    let timezone = file
        .timezone
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value.parse::<Tz>().map_err(|error| {
                InfraError::InvalidConfig(format!("invalid timezone '{value}': {error}"))
            })
        })
        .transpose()?;

    let config = AlertConfig {
        lead_minutes: file.lead_minutes.unwrap_or(defaults.lead_minutes),
        alert_duration_seconds: file
            .alert_duration_seconds
            .unwrap_or(defaults.alert_duration_seconds),
        calendar_ids: file
            .calendar_ids
            .map(normalize_calendar_ids)
            .unwrap_or(defaults.calendar_ids),
        calendar_labels: file
            .calendar_labels
            .into_iter()
            .map(|(id, label)| (id.trim().to_string(), label.trim().to_string()))
            .filter(|(id, label)| !id.is_empty() && !label.is_empty())
            .collect(),
        timezone,
        isolate_calendar_failures: file.isolate_calendar_failures,
        dialog_icon: file
            .dialog_icon
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from),
    };
    config.validate()?;
    Ok(config)
}

fn normalize_calendar_ids(calendar_ids: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(calendar_ids.len());
    for id in calendar_ids {
        let id = id.trim();
        if !id.is_empty() && !normalized.iter().any(|existing| existing == id) {
            normalized.push(id.to_string());
        }
    }
    normalized
}
