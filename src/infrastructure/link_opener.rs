use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use std::sync::Mutex;
use tokio::process::Command;

#[async_trait]
pub trait LinkOpener: Send + Sync {
    async fn open(&self, url: &str) -> Result<(), InfraError>;
}

/// Hands the URL to the desktop's default handler without waiting for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLinkOpener;

impl SystemLinkOpener {
    fn command(url: &str) -> Command {
        if cfg!(target_os = "macos") {
            let mut command = Command::new("open");
            command.arg(url);
            command
        } else if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", "", url]);
            command
        } else {
            let mut command = Command::new("xdg-open");
            command.arg(url);
            command
        }
    }
}

#[async_trait]
impl LinkOpener for SystemLinkOpener {
    async fn open(&self, url: &str) -> Result<(), InfraError> {
        Self::command(url)
            .spawn()
            .map(|_| ())
            .map_err(|error| InfraError::Presentation(format!("failed to open {url}: {error}")))
    }
}

/// Records opened links instead of launching anything.
#[derive(Debug, Default)]
pub struct RecordingLinkOpener {
    opened: Mutex<Vec<String>>,
}

impl RecordingLinkOpener {
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LinkOpener for RecordingLinkOpener {
    async fn open(&self, url: &str) -> Result<(), InfraError> {
        let mut guard = self
            .opened
            .lock()
            .map_err(|error| InfraError::Presentation(format!("opener lock poisoned: {error}")))?;
        guard.push(url.to_string());
        Ok(())
    }
}
