use crate::application::snooze_gate::SnoozeGate;
use crate::domain::models::{AlertEvent, AlertOutcome};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::link_opener::LinkOpener;
use crate::infrastructure::presenter::{AlertRequest, Presenter};
use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration;

pub const ALERT_TITLE: &str = "You have a meeting!";
const START_TIME_FORMAT: &str = "%-I:%M %p";

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Shows one alert and carries out whatever the user picked.
pub struct AlertDispatcher {
    presenter: Arc<dyn Presenter>,
    link_opener: Arc<dyn LinkOpener>,
    snooze_gate: Arc<SnoozeGate>,
    alert_duration: Duration,
    timezone: Option<Tz>,
    now_provider: NowProvider,
}

impl AlertDispatcher {
    pub fn new(
        presenter: Arc<dyn Presenter>,
        link_opener: Arc<dyn LinkOpener>,
        snooze_gate: Arc<SnoozeGate>,
        alert_duration: Duration,
    ) -> Self {
        Self {
            presenter,
            link_opener,
            snooze_gate,
            alert_duration,
            timezone: None,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_timezone(mut self, timezone: Option<Tz>) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn alert_request(&self, event: &AlertEvent) -> AlertRequest {
        let starts_at = match self.timezone {
            Some(tz) => event
                .start_instant
                .with_timezone(&tz)
                .format(START_TIME_FORMAT)
                .to_string(),
            None => event
                .start_instant
                .with_timezone(&Local)
                .format(START_TIME_FORMAT)
                .to_string(),
        };
        AlertRequest {
            title: ALERT_TITLE.to_string(),
            event_title: event.title.clone(),
            starts_at,
            url: event.join_url.clone(),
            timeout: self.alert_duration,
        }
    }

    /// Blocks until the alert is answered or times out.
    ///
    /// Only a failure to show the alert is an error. Once the user has
    /// answered, problems opening the link or persisting the snooze are
    /// logged and the outcome is still returned.
    pub async fn present(&self, event: &AlertEvent) -> Result<AlertOutcome, InfraError> {
        let request = self.alert_request(event);
        tracing::info!(
            presenter = self.presenter.name(),
            event = %event.title,
            calendar_id = %event.calendar_id,
            "presenting alert"
        );
        let outcome = self.presenter.show(&request).await?;
        tracing::info!(event = %event.title, outcome = %outcome, "alert answered");

        match outcome {
            AlertOutcome::LinkOpened => {
                if let Some(url) = request.url.as_deref() {
                    if let Err(error) = self.link_opener.open(url).await {
                        tracing::warn!(%error, url, "could not open meeting link");
                    }
                }
            }
            AlertOutcome::Snoozed => {
                if let Err(error) = self.snooze_gate.snooze((self.now_provider)()) {
                    tracing::error!(%error, "could not persist snooze");
                }
            }
            AlertOutcome::Dismissed | AlertOutcome::TimedOut => {}
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::link_opener::RecordingLinkOpener;
    use crate::infrastructure::snooze_store::{InMemorySnoozeRepository, SnoozeRepository};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedPresenter {
        outcome: Result<AlertOutcome, String>,
        shown: Mutex<Vec<AlertRequest>>,
    }

    impl ScriptedPresenter {
        fn answering(outcome: AlertOutcome) -> Self {
            Self {
                outcome: Ok(outcome),
                shown: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                outcome: Err("no display".to_string()),
                shown: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Presenter for ScriptedPresenter {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn show(&self, request: &AlertRequest) -> Result<AlertOutcome, InfraError> {
            self.shown.lock().expect("shown mutex").push(request.clone());
            self.outcome.clone().map_err(InfraError::Presentation)
        }
    }

    fn fixed_time() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-16T14:05:00Z")
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn event(join_url: Option<&str>) -> AlertEvent {
        AlertEvent {
            calendar_id: "primary".to_string(),
            event_id: "e1".to_string(),
            start_instant: fixed_time(),
            is_all_day: false,
            is_cancelled: false,
            title: "Standup".to_string(),
            join_url: join_url.map(ToOwned::to_owned),
        }
    }

    struct Harness {
        presenter: Arc<ScriptedPresenter>,
        opener: Arc<RecordingLinkOpener>,
        snooze: Arc<InMemorySnoozeRepository>,
        dispatcher: AlertDispatcher,
    }

    fn harness(presenter: ScriptedPresenter) -> Harness {
        let presenter = Arc::new(presenter);
        let opener = Arc::new(RecordingLinkOpener::default());
        let snooze = Arc::new(InMemorySnoozeRepository::default());
        let gate = Arc::new(SnoozeGate::new(snooze.clone()));
        let dispatcher = AlertDispatcher::new(
            presenter.clone(),
            opener.clone(),
            gate,
            Duration::from_secs(120),
        )
        .with_timezone(Some(chrono_tz::America::New_York))
        .with_now_provider(Arc::new(fixed_time));
        Harness {
            presenter,
            opener,
            snooze,
            dispatcher,
        }
    }

    #[test]
    fn request_formats_start_in_configured_zone() {
        let h = harness(ScriptedPresenter::answering(AlertOutcome::Dismissed));
        let request = h.dispatcher.alert_request(&event(Some("https://meet.google.com/x")));

        assert_eq!(request.title, "You have a meeting!");
        assert_eq!(request.body(), "Standup\nStarts: 9:05 AM");
        assert_eq!(request.url.as_deref(), Some("https://meet.google.com/x"));
        assert_eq!(request.timeout, Duration::from_secs(120));
    }

    #[tokio::test]
    async fn link_choice_opens_url() {
        let h = harness(ScriptedPresenter::answering(AlertOutcome::LinkOpened));
        let outcome = h
            .dispatcher
            .present(&event(Some("https://zoom.us/j/1")))
            .await
            .expect("dispatch");

        assert_eq!(outcome, AlertOutcome::LinkOpened);
        assert_eq!(h.opener.opened(), vec!["https://zoom.us/j/1"]);
        assert_eq!(h.snooze.save_count(), 0);
    }

    #[tokio::test]
    async fn snooze_choice_writes_deadline() {
        let h = harness(ScriptedPresenter::answering(AlertOutcome::Snoozed));
        let outcome = h.dispatcher.present(&event(None)).await.expect("dispatch");

        assert_eq!(outcome, AlertOutcome::Snoozed);
        assert_eq!(h.snooze.save_count(), 1);
        assert_eq!(
            h.snooze.load(),
            Some(fixed_time() + chrono::Duration::minutes(5))
        );
        assert!(h.opener.opened().is_empty());
    }

    #[tokio::test]
    async fn dismiss_and_timeout_have_no_side_effects() {
        for answer in [AlertOutcome::Dismissed, AlertOutcome::TimedOut] {
            let h = harness(ScriptedPresenter::answering(answer));
            let outcome = h
                .dispatcher
                .present(&event(Some("https://zoom.us/j/1")))
                .await
                .expect("dispatch");

            assert_eq!(outcome, answer);
            assert!(h.opener.opened().is_empty());
            assert_eq!(h.snooze.save_count(), 0);
        }
    }

    #[tokio::test]
    async fn presenter_failure_is_an_error() {
        let h = harness(ScriptedPresenter::failing());
        let error = h
            .dispatcher
            .present(&event(None))
            .await
            .expect_err("presentation fails");

        assert!(matches!(error, InfraError::Presentation(_)));
        assert_eq!(h.presenter.shown.lock().expect("shown").len(), 1);
    }
}
