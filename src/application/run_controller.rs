use crate::application::dispatcher::AlertDispatcher;
use crate::application::snooze_gate::SnoozeGate;
use crate::domain::lead_time::{fetch_window, is_due};
use crate::domain::models::{
    AlertEvent, AlertOutcome, FETCH_BUFFER_MINUTES, OccurrenceKey, alert_retention,
};
use crate::infrastructure::alert_cache::AlertCacheRepository;
use crate::infrastructure::config::AlertConfig;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::{GoogleCalendarEvent, decode_event};
use crate::infrastructure::google_calendar_client::CalendarSource;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::{Duration as TokioDuration, sleep};

const FETCH_CONCURRENCY: usize = 4;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;
type FetchOutcome = (usize, String, Result<Vec<GoogleCalendarEvent>, InfraError>);

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    fn should_retry(&self, error: &InfraError) -> bool {
        match error {
            InfraError::Calendar(message) | InfraError::OAuth(message) => {
                let message = message.to_ascii_lowercase();
                message.contains("network error")
                    || message.contains("timeout")
                    || message.contains("timed out")
                    || message.contains("http 429")
                    || message.contains("http 500")
                    || message.contains("http 502")
                    || message.contains("http 503")
                    || message.contains("http 504")
            }
            _ => false,
        }
    }

    fn delay(&self, attempt: u8) -> TokioDuration {
        TokioDuration::from_millis(
            self.base_delay_ms
                .saturating_mul(2u64.saturating_pow(u32::from(attempt))),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertedOccurrence {
    pub key: OccurrenceKey,
    pub title: String,
    pub outcome: AlertOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Set when the run stopped at the snooze gate.
    pub snoozed_until: Option<DateTime<Utc>>,
    pub fetched: usize,
    pub candidates: usize,
    pub already_alerted: usize,
    pub pruned: usize,
    pub failed_calendars: Vec<String>,
    pub alerted: Vec<AlertedOccurrence>,
}

/// One pass of the alerting pipeline: gate, fetch, normalize, dedup, alert, persist.
pub struct RunController<C, R>
where
    C: CalendarSource + 'static,
    R: AlertCacheRepository,
{
    calendar_source: Arc<C>,
    cache_repository: Arc<R>,
    snooze_gate: Arc<SnoozeGate>,
    dispatcher: AlertDispatcher,
    config: AlertConfig,
    retry_policy: RetryPolicy,
    now_provider: NowProvider,
}

impl<C, R> RunController<C, R>
where
    C: CalendarSource + 'static,
    R: AlertCacheRepository,
{
    pub fn new(
        calendar_source: Arc<C>,
        cache_repository: Arc<R>,
        snooze_gate: Arc<SnoozeGate>,
        dispatcher: AlertDispatcher,
        config: AlertConfig,
    ) -> Self {
        Self {
            calendar_source,
            cache_repository,
            snooze_gate,
            dispatcher,
            config,
            retry_policy: RetryPolicy::default(),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn run(&self) -> Result<RunReport, InfraError> {
        let started = (self.now_provider)();
        if let Some(until) = self.snooze_gate.snoozed_until(started) {
            tracing::info!(until = %until, "alerts snoozed, skipping run");
            return Ok(RunReport {
                snoozed_until: Some(until),
                ..RunReport::default()
            });
        }

        let (time_min, time_max) =
            fetch_window(started, self.config.lead_minutes, FETCH_BUFFER_MINUTES);
        let (fetched, failed_calendars) = self.fetch_all(time_min, time_max).await?;

        let mut report = RunReport {
            fetched: fetched.iter().map(|(_, events)| events.len()).sum(),
            failed_calendars,
            ..RunReport::default()
        };

        let candidates = self.candidates(&fetched, started);
        report.candidates = candidates.len();

        let mut cache = self.cache_repository.load();
        report.pruned = cache.prune(started, alert_retention());
        if report.pruned > 0 {
            tracing::debug!(pruned = report.pruned, "pruned stale alert records");
        }

        for event in candidates {
            // Alerts block, so re-read the clock for every candidate.
            let now = (self.now_provider)();
            if !is_due(&event, now, self.config.lead_minutes) {
                continue;
            }
            let key = event.occurrence_key();
            if cache.has(&key) {
                report.already_alerted += 1;
                tracing::debug!(key = %key, "already alerted");
                continue;
            }

            let outcome = self.dispatcher.present(&event).await?;
            cache.record(&key, (self.now_provider)());
            report.alerted.push(AlertedOccurrence {
                key,
                title: event.title.clone(),
                outcome,
            });
        }

        self.cache_repository.save(&cache)?;
        Ok(report)
    }

    /// Decodes every fetched record, logs it, and keeps the alertable ones sorted by start.
    fn candidates(
        &self,
        fetched: &[(String, Vec<GoogleCalendarEvent>)],
        now: DateTime<Utc>,
    ) -> Vec<AlertEvent> {
        let labels = self.config.labels();
        let mut candidates = Vec::new();
        for (calendar_id, events) in fetched {
            for raw in events {
                let Some(event) = decode_event(calendar_id, raw, &labels) else {
                    tracing::debug!(calendar_id = %calendar_id, id = ?raw.id, "skipping undecodable event");
                    continue;
                };
                tracing::debug!(
                    calendar_id = %calendar_id,
                    title = %event.title,
                    start = %event.start_instant,
                    minutes_until_start = (event.start_instant - now).num_minutes(),
                    all_day = event.is_all_day,
                    cancelled = event.is_cancelled,
                    "upcoming event"
                );
                if event.is_alertable() {
                    candidates.push(event);
                }
            }
        }
        candidates.sort_by_key(|event| event.start_instant);
        candidates
    }

    /// Fetches all configured calendars concurrently, preserving configuration order.
    async fn fetch_all(
        &self,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<(Vec<(String, Vec<GoogleCalendarEvent>)>, Vec<String>), InfraError> {
        let calendar_ids = &self.config.calendar_ids;
        let mut tasks: JoinSet<FetchOutcome> = JoinSet::new();
        let mut slots: Vec<Option<Result<Vec<GoogleCalendarEvent>, InfraError>>> =
            (0..calendar_ids.len()).map(|_| None).collect();

        for (index, calendar_id) in calendar_ids.iter().enumerate() {
            let source = Arc::clone(&self.calendar_source);
            let retry_policy = self.retry_policy.clone();
            let calendar_id = calendar_id.clone();
            tasks.spawn(async move {
                let result =
                    list_events_with_retry(&*source, &retry_policy, &calendar_id, time_min, time_max)
                        .await;
                (index, calendar_id, result)
            });

            if tasks.len() >= FETCH_CONCURRENCY {
                collect_fetch(&mut tasks, &mut slots).await?;
            }
        }
        while !tasks.is_empty() {
            collect_fetch(&mut tasks, &mut slots).await?;
        }

        let mut fetched = Vec::with_capacity(calendar_ids.len());
        let mut failed = Vec::new();
        for (calendar_id, slot) in calendar_ids.iter().zip(slots) {
            match slot {
                Some(Ok(events)) => fetched.push((calendar_id.clone(), events)),
                Some(Err(error)) if self.config.isolate_calendar_failures => {
                    tracing::warn!(calendar_id = %calendar_id, %error, "calendar fetch failed, continuing");
                    failed.push(calendar_id.clone());
                }
                Some(Err(error)) => return Err(error),
                None => {
                    return Err(InfraError::TaskJoin(format!(
                        "no fetch result for calendar {calendar_id}"
                    )));
                }
            }
        }
        Ok((fetched, failed))
    }
}

async fn collect_fetch(
    tasks: &mut JoinSet<FetchOutcome>,
    slots: &mut [Option<Result<Vec<GoogleCalendarEvent>, InfraError>>],
) -> Result<(), InfraError> {
    let Some(joined) = tasks.join_next().await else {
        return Ok(());
    };
    let (index, _calendar_id, result) = joined
        .map_err(|error| InfraError::TaskJoin(format!("calendar fetch task failed: {error}")))?;
    if let Some(slot) = slots.get_mut(index) {
        *slot = Some(result);
    }
    Ok(())
}

async fn list_events_with_retry<C>(
    source: &C,
    retry_policy: &RetryPolicy,
    calendar_id: &str,
    time_min: DateTime<Utc>,
    time_max: DateTime<Utc>,
) -> Result<Vec<GoogleCalendarEvent>, InfraError>
where
    C: CalendarSource + ?Sized,
{
    let max_attempts = retry_policy.max_attempts.max(1);
    let mut attempt: u8 = 0;

    loop {
        match source.list_events(calendar_id, time_min, time_max).await {
            Ok(events) => return Ok(events),
            Err(error) if retry_policy.should_retry(&error) && attempt + 1 < max_attempts => {
                tracing::debug!(calendar_id, attempt, %error, "retrying calendar fetch");
                sleep(retry_policy.delay(attempt)).await;
                attempt = attempt.saturating_add(1);
            }
            Err(error) => return Err(error),
        }
    }
}
