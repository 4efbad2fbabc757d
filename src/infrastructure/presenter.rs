//! Modal alert backends.
//!
//! Every backend answers with one of the four [`AlertOutcome`]s. Which backend
//! is used is decided once at startup by [`detect_presenter`].

use crate::domain::models::AlertOutcome;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

const SWIFT_DIALOG_BINARY: &str = "dialog";
const SWIFT_DIALOG_HOMEBREW_PATH: &str = "/opt/homebrew/bin/dialog";

// swiftDialog exit codes
const EXIT_BUTTON1: i32 = 0;
const EXIT_BUTTON2: i32 = 2;
const EXIT_INFO_BUTTON: i32 = 3;
const EXIT_TIMER: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertRequest {
    pub title: String,
    pub event_title: String,
    pub starts_at: String,
    pub url: Option<String>,
    pub timeout: Duration,
}

impl AlertRequest {
    pub fn body(&self) -> String {
        format!("{}\nStarts: {}", self.event_title, self.starts_at)
    }
}

#[async_trait]
pub trait Presenter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Shows the alert and waits until the user answers or the timeout elapses.
    async fn show(&self, request: &AlertRequest) -> Result<AlertOutcome, InfraError>;
}

/// Picks the richest backend available on this machine.
pub fn detect_presenter(dialog_icon: Option<PathBuf>) -> Box<dyn Presenter> {
    if cfg!(target_os = "macos") {
        if let Some(binary) = find_swift_dialog() {
            return Box::new(SwiftDialogPresenter::new(binary, dialog_icon));
        }
        return Box::new(AppleScriptPresenter);
    }
    Box::new(ConsolePresenter)
}

fn find_swift_dialog() -> Option<PathBuf> {
    find_in_path(SWIFT_DIALOG_BINARY).or_else(|| {
        let fallback = Path::new(SWIFT_DIALOG_HOMEBREW_PATH);
        fallback.is_file().then(|| fallback.to_path_buf())
    })
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

async fn run_command(command: &mut Command, backend: &str) -> Result<Output, InfraError> {
    command
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|error| InfraError::Presentation(format!("failed to launch {backend}: {error}")))
}

#[derive(Debug, Clone)]
pub struct SwiftDialogPresenter {
    binary: PathBuf,
    icon: Option<PathBuf>,
}

impl SwiftDialogPresenter {
    pub fn new(binary: PathBuf, icon: Option<PathBuf>) -> Self {
        Self { binary, icon }
    }

    fn args(&self, request: &AlertRequest) -> Vec<String> {
        let message = format!(
            "## 📅 {}\n_Starts: {}_\n\n🏃 Go to the meeting!",
            request.event_title, request.starts_at
        );
        let mut args = vec![
            "--title".to_string(),
            request.title.clone(),
            "--message".to_string(),
            message,
            "--ontop".to_string(),
            "--blurscreen".to_string(),
            "--timer".to_string(),
            request.timeout.as_secs().to_string(),
            "--quitkey".to_string(),
            "ESC".to_string(),
            "--button1text".to_string(),
            "🚀 I'm joining".to_string(),
            "--button2text".to_string(),
            "😴 Snooze 5 min".to_string(),
        ];
        if let Some(icon) = &self.icon {
            args.push("--icon".to_string());
            args.push(icon.display().to_string());
        }
        if request.url.is_some() {
            args.push("--infobuttontext".to_string());
            args.push("🔗 Open link".to_string());
        }
        args
    }
}

pub(crate) fn swift_dialog_outcome(exit_code: Option<i32>) -> AlertOutcome {
    match exit_code {
        Some(EXIT_BUTTON2) => AlertOutcome::Snoozed,
        Some(EXIT_INFO_BUTTON) => AlertOutcome::LinkOpened,
        Some(EXIT_TIMER) => AlertOutcome::TimedOut,
        Some(EXIT_BUTTON1) | Some(_) | None => AlertOutcome::Dismissed,
    }
}

#[async_trait]
impl Presenter for SwiftDialogPresenter {
    fn name(&self) -> &'static str {
        "swiftDialog"
    }

    async fn show(&self, request: &AlertRequest) -> Result<AlertOutcome, InfraError> {
        let output = run_command(
            Command::new(&self.binary).args(self.args(request)),
            self.name(),
        )
        .await?;
        Ok(swift_dialog_outcome(output.status.code()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AppleScriptPresenter;

fn escape_applescript(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

impl AppleScriptPresenter {
    fn script(request: &AlertRequest) -> String {
        let text = format!("{}\nStarts: {}", request.event_title, request.starts_at);
        let buttons = if request.url.is_some() {
            r#"buttons {"Snooze 5 min","Open link","I joined the meeting"} default button 3"#
        } else {
            r#"buttons {"Snooze 5 min","I joined the meeting"} default button 2"#
        };
        format!(
            r#"set theTitle to "{title}"
set theText to "{text}"
display dialog theText with title theTitle with icon caution {buttons} giving up after {timeout}
if gave up of the result then
  return "timeout"
else
  set btn to button returned of the result
  if btn is "Open link" then return "open"
  if btn is "Snooze 5 min" then return "snooze"
  return "dismiss"
end if"#,
            title = escape_applescript(&request.title),
            text = escape_applescript(&text),
            timeout = request.timeout.as_secs(),
        )
    }
}

pub(crate) fn applescript_outcome(stdout: &str) -> AlertOutcome {
    match stdout.trim() {
        "timeout" => AlertOutcome::TimedOut,
        "open" => AlertOutcome::LinkOpened,
        "snooze" => AlertOutcome::Snoozed,
        _ => AlertOutcome::Dismissed,
    }
}

#[async_trait]
impl Presenter for AppleScriptPresenter {
    fn name(&self) -> &'static str {
        "osascript"
    }

    async fn show(&self, request: &AlertRequest) -> Result<AlertOutcome, InfraError> {
        let output = run_command(
            Command::new("osascript").arg("-e").arg(Self::script(request)),
            self.name(),
        )
        .await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InfraError::Presentation(format!(
                "osascript exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(applescript_outcome(&String::from_utf8_lossy(&output.stdout)))
    }
}

fn console_text(request: &AlertRequest) -> String {
    let mut text = format!("{}\n{}", request.title, request.body());
    if let Some(url) = &request.url {
        text.push_str(&format!("\nLink: {url}"));
    }
    text
}

/// Text-only fallback for machines without a dialog backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter;

#[async_trait]
impl Presenter for ConsolePresenter {
    fn name(&self) -> &'static str {
        "console"
    }

    async fn show(&self, request: &AlertRequest) -> Result<AlertOutcome, InfraError> {
        tracing::info!(event = %request.event_title, "showing console alert");
        println!("{}", console_text(request));

        tokio::time::sleep(request.timeout).await;
        Ok(AlertOutcome::TimedOut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: Option<&str>) -> AlertRequest {
        AlertRequest {
            title: "You have a meeting!".to_string(),
            event_title: "Design \"v2\" review".to_string(),
            starts_at: "9:05 AM".to_string(),
            url: url.map(ToOwned::to_owned),
            timeout: Duration::from_secs(120),
        }
    }

    #[test]
    fn body_joins_title_and_start() {
        assert_eq!(request(None).body(), "Design \"v2\" review\nStarts: 9:05 AM");
    }

    #[test]
    fn swift_dialog_exit_codes_map_to_outcomes() {
        assert_eq!(swift_dialog_outcome(Some(0)), AlertOutcome::Dismissed);
        assert_eq!(swift_dialog_outcome(Some(2)), AlertOutcome::Snoozed);
        assert_eq!(swift_dialog_outcome(Some(3)), AlertOutcome::LinkOpened);
        assert_eq!(swift_dialog_outcome(Some(4)), AlertOutcome::TimedOut);
        assert_eq!(swift_dialog_outcome(Some(10)), AlertOutcome::Dismissed);
        assert_eq!(swift_dialog_outcome(None), AlertOutcome::Dismissed);
    }

    #[test]
    fn swift_dialog_offers_link_button_only_with_url() {
        let presenter = SwiftDialogPresenter::new(PathBuf::from("/usr/local/bin/dialog"), None);

        let without = presenter.args(&request(None));
        assert!(!without.iter().any(|arg| arg == "--infobuttontext"));
        assert!(without.windows(2).any(|pair| pair[0] == "--timer" && pair[1] == "120"));

        let with = presenter.args(&request(Some("https://meet.google.com/abc")));
        assert!(with.iter().any(|arg| arg == "--infobuttontext"));
    }

    #[test]
    fn swift_dialog_passes_icon_when_configured() {
        let presenter = SwiftDialogPresenter::new(
            PathBuf::from("/usr/local/bin/dialog"),
            Some(PathBuf::from("/tmp/alert.png")),
        );
        let args = presenter.args(&request(None));
        assert!(args.windows(2).any(|pair| pair[0] == "--icon" && pair[1] == "/tmp/alert.png"));
    }

    #[test]
    fn applescript_output_maps_to_outcomes() {
        assert_eq!(applescript_outcome("timeout\n"), AlertOutcome::TimedOut);
        assert_eq!(applescript_outcome("open"), AlertOutcome::LinkOpened);
        assert_eq!(applescript_outcome("snooze"), AlertOutcome::Snoozed);
        assert_eq!(applescript_outcome("dismiss"), AlertOutcome::Dismissed);
        assert_eq!(applescript_outcome(""), AlertOutcome::Dismissed);
    }

    #[test]
    fn applescript_escapes_quotes_and_lists_link_button() {
        let script = AppleScriptPresenter::script(&request(Some("https://zoom.us/j/1")));
        assert!(script.contains(r#"Design \"v2\" review"#));
        assert!(script.contains("\"Open link\""));
        assert!(script.contains("giving up after 120"));

        let script = AppleScriptPresenter::script(&request(None));
        assert!(!script.contains("\"Open link\""));
    }

    #[tokio::test(start_paused = true)]
    async fn console_presenter_waits_out_the_timeout() {
        let started = tokio::time::Instant::now();
        let outcome = ConsolePresenter
            .show(&request(None))
            .await
            .expect("console presenter never fails");

        assert_eq!(outcome, AlertOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_secs(120));
    }

    #[test]
    fn console_text_carries_title_body_and_link() {
        assert_eq!(
            console_text(&request(Some("https://meet.google.com/x"))),
            "You have a meeting!\nDesign \"v2\" review\nStarts: 9:05 AM\nLink: https://meet.google.com/x"
        );
        assert!(!console_text(&request(None)).contains("Link:"));
    }

    #[test]
    fn detection_falls_back_to_console_off_macos() {
        let presenter = detect_presenter(None);
        if cfg!(target_os = "macos") {
            assert_ne!(presenter.name(), "console");
        } else {
            assert_eq!(presenter.name(), "console");
        }
    }
}
