use anyhow::Context;
use clap::{Parser, ValueEnum};
use meeting_alert::application::commands::{RunOptions, RunStatus, run_alerts_impl};
use meeting_alert::infrastructure::config::ConfigOverrides;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const APP_DIR: &str = "meeting-alert";

#[derive(Parser, Debug)]
#[command(
    name = "meeting-alert",
    version,
    about = "Shows a blocking alert shortly before Google Calendar meetings start"
)]
struct Cli {
    /// Directory holding config/, state/, token.json and credentials.json.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Alert this many minutes before a meeting starts.
    #[arg(long, env = "LEAD_MINUTES")]
    lead_minutes: Option<u32>,

    /// Seconds the alert stays up before it times out.
    #[arg(long, env = "ALERT_DURATION_SEC")]
    alert_duration_seconds: Option<u64>,

    /// Calendars to watch, comma separated.
    #[arg(long = "calendar-id", env = "CALENDAR_ID", value_delimiter = ',')]
    calendar_ids: Vec<String>,

    /// Bearer token used instead of token.json.
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

impl Cli {
    fn root(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map(|dir| dir.join(APP_DIR))
                .unwrap_or_else(|| PathBuf::from("."))
        })
    }

    fn run_options(&self) -> RunOptions {
        let calendar_ids: Vec<String> = self
            .calendar_ids
            .iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        RunOptions {
            overrides: ConfigOverrides {
                lead_minutes: self.lead_minutes,
                alert_duration_seconds: self.alert_duration_seconds,
                calendar_ids: (!calendar_ids.is_empty()).then_some(calendar_ids),
            },
            access_token: self.access_token.clone(),
            ..RunOptions::new(self.root())
        }
    }
}

fn init_tracing(format: LogFormat, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "meeting_alert=debug,info" } else { "info" }));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init(),
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let status = runtime
        .block_on(run_alerts_impl(cli.run_options()))
        .context("alert run failed")?;

    match status {
        RunStatus::AlreadyRunning => {}
        RunStatus::Completed(report) if report.snoozed_until.is_some() => {}
        RunStatus::Completed(report) => {
            for alerted in &report.alerted {
                tracing::info!(key = %alerted.key, title = %alerted.title, outcome = %alerted.outcome, "alerted");
            }
            tracing::info!(
                fetched = report.fetched,
                candidates = report.candidates,
                alerted = report.alerted.len(),
                already_alerted = report.already_alerted,
                pruned = report.pruned,
                failed_calendars = report.failed_calendars.len(),
                "run complete"
            );
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format, cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %format!("{error:#}"), "meeting-alert failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calendar_ids_split_on_commas() {
        let cli = Cli::parse_from([
            "meeting-alert",
            "--root",
            "/tmp/alerts",
            "--calendar-id",
            "primary, team@group.calendar.google.com",
            "--lead-minutes",
            "5",
        ]);
        let options = cli.run_options();

        assert_eq!(options.root, PathBuf::from("/tmp/alerts"));
        assert_eq!(options.overrides.lead_minutes, Some(5));
        assert_eq!(
            options.overrides.calendar_ids,
            Some(vec![
                "primary".to_string(),
                "team@group.calendar.google.com".to_string()
            ])
        );
    }

    #[test]
    fn log_format_accepts_json() {
        let cli = Cli::parse_from(["meeting-alert", "--log-format", "json", "-v"]);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert!(cli.verbose);
    }

    #[test]
    fn default_root_lives_under_data_dir() {
        let cli = Cli::parse_from(["meeting-alert"]);
        if let Some(data_dir) = dirs::data_dir() {
            assert_eq!(cli.root(), data_dir.join("meeting-alert"));
        }
    }
}
