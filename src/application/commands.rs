use crate::application::bootstrap::{Workspace, bootstrap_workspace};
use crate::application::dispatcher::AlertDispatcher;
use crate::application::oauth::{OAuthConfig, OAuthManager};
use crate::application::run_controller::{RunController, RunReport};
use crate::application::snooze_gate::SnoozeGate;
use crate::infrastructure::alert_cache::JsonFileAlertCacheRepository;
use crate::infrastructure::config::{ConfigOverrides, load_config};
use crate::infrastructure::credential_store::{TokenFileStore, load_client_credentials};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::{
    AccessTokenProvider, CALENDAR_API_BASE, ReqwestGoogleCalendarClient, StaticAccessToken,
};
use crate::infrastructure::link_opener::{LinkOpener, SystemLinkOpener};
use crate::infrastructure::oauth_client::ReqwestOAuthClient;
use crate::infrastructure::presenter::{Presenter, detect_presenter};
use crate::infrastructure::run_lock::RunLock;
use crate::infrastructure::snooze_store::FileSnoozeRepository;
use chrono::Utc;
use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const HTTP_TIMEOUT_SECONDS: u64 = 30;

/// Inputs for one invocation, already resolved from flags and environment.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub root: PathBuf,
    pub overrides: ConfigOverrides,
    pub access_token: Option<String>,
    pub calendar_api_base: String,
}

impl RunOptions {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            overrides: ConfigOverrides::default(),
            access_token: None,
            calendar_api_base: CALENDAR_API_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed(RunReport),
    /// Another invocation holds the run lock.
    AlreadyRunning,
}

pub async fn run_alerts_impl(options: RunOptions) -> Result<RunStatus, InfraError> {
    let workspace = bootstrap_workspace(&options.root)?;
    let config = load_config(&workspace.config_dir)?.with_overrides(options.overrides.clone())?;

    let snooze_gate = Arc::new(SnoozeGate::new(Arc::new(FileSnoozeRepository::new(
        &workspace.snooze_path,
    ))));
    if let Some(until) = snooze_gate.snoozed_until(Utc::now()) {
        tracing::info!(until = %until, "alerts snoozed, skipping run");
        return Ok(RunStatus::Completed(RunReport {
            snoozed_until: Some(until),
            ..RunReport::default()
        }));
    }

    let Some(_lock) = RunLock::try_acquire(&workspace.lock_path)? else {
        tracing::info!(path = %workspace.lock_path.display(), "another run is in progress");
        return Ok(RunStatus::AlreadyRunning);
    };

    let http = Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECONDS))
        .build()
        .map_err(|error| InfraError::Calendar(format!("failed to build http client: {error}")))?;
    let tokens = access_token_provider(&workspace, options.access_token.as_deref(), http.clone())?;
    let calendar_client = Arc::new(
        ReqwestGoogleCalendarClient::new(http, tokens).with_api_base(options.calendar_api_base),
    );

    let presenter: Arc<dyn Presenter> = Arc::from(detect_presenter(config.dialog_icon.clone()));
    let link_opener: Arc<dyn LinkOpener> = Arc::new(SystemLinkOpener);
    let dispatcher = AlertDispatcher::new(
        presenter,
        link_opener,
        Arc::clone(&snooze_gate),
        config.alert_duration(),
    )
    .with_timezone(config.timezone);

    tracing::debug!(
        lead_minutes = config.lead_minutes,
        calendars = ?config.calendar_ids,
        root = %workspace.root.display(),
        "starting alert run"
    );
    let controller = RunController::new(
        calendar_client,
        Arc::new(JsonFileAlertCacheRepository::new(&workspace.alert_cache_path)),
        snooze_gate,
        dispatcher,
        config,
    );
    let report = controller.run().await?;
    Ok(RunStatus::Completed(report))
}

fn access_token_provider(
    workspace: &Workspace,
    access_token: Option<&str>,
    http: Client,
) -> Result<Arc<dyn AccessTokenProvider>, InfraError> {
    if let Some(token) = access_token.map(str::trim).filter(|value| !value.is_empty()) {
        return Ok(Arc::new(StaticAccessToken::new(token)));
    }

    let credentials = load_client_credentials(&workspace.credentials_path)?;
    let manager = OAuthManager::new(
        OAuthConfig::new(credentials),
        Arc::new(TokenFileStore::new(&workspace.token_path)),
        Arc::new(ReqwestOAuthClient::new(http)),
    );
    Ok(Arc::new(manager))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AlertOutcome;
    use chrono::{Duration as ChronoDuration, SecondsFormat};
    use std::fs;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(root: &std::path::Path, server: &MockServer) -> RunOptions {
        RunOptions {
            access_token: Some("env-token".to_string()),
            calendar_api_base: format!("{}/calendar/v3/", server.uri()),
            overrides: ConfigOverrides {
                alert_duration_seconds: Some(1),
                ..ConfigOverrides::default()
            },
            ..RunOptions::new(root.to_path_buf())
        }
    }

    #[tokio::test]
    async fn run_bootstraps_workspace_and_records_alert() {
        if cfg!(target_os = "macos") {
            // Would pop a real dialog.
            return;
        }
        let dir = tempfile::tempdir().expect("temp dir");
        let server = MockServer::start().await;
        let start = (Utc::now() + ChronoDuration::seconds(60))
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(header("authorization", "Bearer env-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    { "id": "e1", "summary": "Standup", "start": { "dateTime": start } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let status = run_alerts_impl(options(dir.path(), &server))
            .await
            .expect("run");

        let report = match status {
            RunStatus::Completed(report) => report,
            other => panic!("expected completed run, got {other:?}"),
        };
        assert_eq!(report.alerted.len(), 1);
        assert_eq!(report.alerted[0].outcome, AlertOutcome::TimedOut);
        let cache = fs::read_to_string(dir.path().join("state/alerted.json")).expect("cache");
        assert!(cache.contains("primary@@e1@@"));
        assert!(dir.path().join("config/alerts.json").is_file());
    }

    #[tokio::test]
    async fn active_snooze_skips_calendar_requests() {
        let dir = tempfile::tempdir().expect("temp dir");
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
            .expect(0)
            .mount(&server)
            .await;
        fs::create_dir_all(dir.path().join("state")).expect("state dir");
        let until = (Utc::now() + ChronoDuration::minutes(3)).timestamp_millis();
        fs::write(dir.path().join("state/snooze"), until.to_string()).expect("snooze marker");

        let status = run_alerts_impl(options(dir.path(), &server))
            .await
            .expect("run");

        match status {
            RunStatus::Completed(report) => assert!(report.snoozed_until.is_some()),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[tokio::test]
    async fn active_snooze_succeeds_without_any_credentials() {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir_all(dir.path().join("state")).expect("state dir");
        let until = Utc::now() + ChronoDuration::minutes(3);
        fs::write(
            dir.path().join("state/snooze"),
            until.timestamp_millis().to_string(),
        )
        .expect("snooze marker");
        assert!(!dir.path().join("credentials.json").exists());

        let status = run_alerts_impl(RunOptions::new(dir.path().to_path_buf()))
            .await
            .expect("snoozed run succeeds");

        match status {
            RunStatus::Completed(report) => {
                assert_eq!(
                    report.snoozed_until.map(|value| value.timestamp_millis()),
                    Some(until.timestamp_millis())
                );
                assert!(report.alerted.is_empty());
            }
            other => panic!("unexpected status: {other:?}"),
        }
        assert!(!dir.path().join("state/alerted.json").exists());
    }

    #[tokio::test]
    async fn held_lock_short_circuits_run() {
        let dir = tempfile::tempdir().expect("temp dir");
        let server = MockServer::start().await;
        let _held = RunLock::try_acquire(&dir.path().join("state/run.lock"))
            .expect("acquire")
            .expect("lock is free");

        let status = run_alerts_impl(options(dir.path(), &server))
            .await
            .expect("run");

        assert_eq!(status, RunStatus::AlreadyRunning);
    }

    #[tokio::test]
    async fn missing_credentials_without_env_token_is_an_oauth_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let server = MockServer::start().await;
        let options = RunOptions {
            access_token: None,
            ..options(dir.path(), &server)
        };

        let error = run_alerts_impl(options).await.expect_err("no credentials");
        assert!(matches!(error, InfraError::OAuth(_)));
    }
}
