use crate::infrastructure::config::ensure_default_config;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};

/// Where everything a run reads or writes lives, relative to one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub state_dir: PathBuf,
    pub alert_cache_path: PathBuf,
    pub snooze_path: PathBuf,
    pub lock_path: PathBuf,
    pub token_path: PathBuf,
    pub credentials_path: PathBuf,
}

impl Workspace {
    pub fn at(root: &Path) -> Self {
        let config_dir = root.join("config");
        let state_dir = root.join("state");
        Self {
            root: root.to_path_buf(),
            alert_cache_path: state_dir.join("alerted.json"),
            snooze_path: state_dir.join("snooze"),
            lock_path: state_dir.join("run.lock"),
            token_path: root.join("token.json"),
            credentials_path: root.join("credentials.json"),
            config_dir,
            state_dir,
        }
    }
}

pub fn bootstrap_workspace(root: &Path) -> Result<Workspace, InfraError> {
    let workspace = Workspace::at(root);
    fs::create_dir_all(&workspace.config_dir)?;
    fs::create_dir_all(&workspace.state_dir)?;
    ensure_default_config(&workspace.config_dir)?;
    Ok(workspace)
}
