use crate::domain::models::OAuthToken;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::write_json_atomic;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, serde::Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Debug, serde::Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

/// Reads the OAuth client id/secret from a Google "installed app" credentials file.
pub fn load_client_credentials(path: &Path) -> Result<ClientCredentials, InfraError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        InfraError::OAuth(format!("cannot read client credentials {}: {error}", path.display()))
    })?;
    let parsed: CredentialsFile = serde_json::from_str(&raw)?;
    let section = parsed.installed.or(parsed.web).ok_or_else(|| {
        InfraError::OAuth(format!(
            "client credentials {} have neither an 'installed' nor a 'web' section",
            path.display()
        ))
    })?;
    Ok(ClientCredentials {
        client_id: section.client_id,
        client_secret: section.client_secret,
    })
}

/// Token file in the layout written by Google's client libraries
/// (`expiry_date` in epoch milliseconds).
#[derive(Debug, Clone)]
pub struct TokenFileStore {
    path: PathBuf,
}

#[derive(Debug, serde::Deserialize)]
struct TokenFile {
    access_token: Option<String>,
    refresh_token: Option<String>,
    scope: Option<String>,
    token_type: Option<String>,
    expiry_date: Option<i64>,
}

impl TokenFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CredentialStore for TokenFileStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        // Keep fields we do not model (e.g. redirect_uri) intact.
        let mut document = fs::read_to_string(&self.path)
            .ok()
            .and_then(|raw| serde_json::from_str::<serde_json::Value>(&raw).ok())
            .filter(serde_json::Value::is_object)
            .unwrap_or_else(|| serde_json::json!({}));
        let object = document.as_object_mut().ok_or_else(|| {
            InfraError::OAuth(format!("invalid token file structure in {}", self.path.display()))
        })?;

        object.insert("access_token".to_string(), token.access_token.clone().into());
        if let Some(refresh_token) = &token.refresh_token {
            object.insert("refresh_token".to_string(), refresh_token.clone().into());
        }
        if let Some(scope) = &token.scope {
            object.insert("scope".to_string(), scope.clone().into());
        }
        object.insert("token_type".to_string(), token.token_type.clone().into());
        object.insert(
            "expiry_date".to_string(),
            token.expires_at.timestamp_millis().into(),
        );

        write_json_atomic(&self.path, &document)
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(InfraError::Io(error)),
        };
        let parsed: TokenFile = serde_json::from_str(&raw)?;
        let expires_at = parsed
            .expiry_date
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

        Ok(Some(OAuthToken {
            access_token: parsed.access_token.unwrap_or_default(),
            refresh_token: parsed
                .refresh_token
                .filter(|value| !value.trim().is_empty()),
            expires_at,
            token_type: parsed.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: parsed.scope,
        }))
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<OAuthToken>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &OAuthToken) -> Result<(), InfraError> {
        let mut guard = self
            .token
            .lock()
            .map_err(|error| InfraError::OAuth(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(token.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<OAuthToken>, InfraError> {
        let guard = self
            .token
            .lock()
            .map_err(|error| InfraError::OAuth(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }
}
