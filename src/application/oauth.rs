use crate::domain::models::OAuthToken;
use crate::infrastructure::credential_store::{ClientCredentials, CredentialStore};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::google_calendar_client::AccessTokenProvider;
use crate::infrastructure::oauth_client::{
    GOOGLE_TOKEN_ENDPOINT, OAuthHttpClient, OAuthRefreshRequest, OAuthTokenResponse,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

const TOKEN_LEEWAY_SECONDS: i64 = 60;

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub credentials: ClientCredentials,
    pub token_endpoint: String,
}

impl OAuthConfig {
    pub fn new(credentials: ClientCredentials) -> Self {
        Self {
            credentials,
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureTokenResult {
    Existing(OAuthToken),
    Refreshed(OAuthToken),
    ReauthenticationRequired,
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Keeps a stored Google token usable, refreshing it when it is about to expire.
pub struct OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    config: OAuthConfig,
    credential_store: Arc<S>,
    oauth_client: Arc<C>,
    now_provider: NowProvider,
}

impl<S, C> OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    pub fn new(config: OAuthConfig, credential_store: Arc<S>, oauth_client: Arc<C>) -> Self {
        Self {
            config,
            credential_store,
            oauth_client,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn ensure_access_token(&self) -> Result<EnsureTokenResult, InfraError> {
        let Some(stored_token) = self.credential_store.load_token()? else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        if stored_token.is_valid_at((self.now_provider)(), TOKEN_LEEWAY_SECONDS) {
            return Ok(EnsureTokenResult::Existing(stored_token));
        }

        let Some(refresh_token) = stored_token.refresh_token.clone() else {
            return Ok(EnsureTokenResult::ReauthenticationRequired);
        };

        let refreshed = self
            .oauth_client
            .refresh_access_token(OAuthRefreshRequest {
                token_endpoint: self.config.token_endpoint.clone(),
                client_id: self.config.credentials.client_id.clone(),
                client_secret: self.config.credentials.client_secret.clone(),
                refresh_token,
            })
            .await;

        match refreshed {
            Ok(response) => {
                let token = self.token_from_response(response, stored_token.refresh_token);
                self.credential_store.save_token(&token)?;
                tracing::info!(expires_at = %token.expires_at, "refreshed google access token");
                Ok(EnsureTokenResult::Refreshed(token))
            }
            Err(InfraError::OAuth(message)) if !message.contains("network error") => {
                tracing::warn!(error = %message, "token refresh rejected");
                Ok(EnsureTokenResult::ReauthenticationRequired)
            }
            Err(error) => Err(error),
        }
    }

    fn token_from_response(
        &self,
        response: OAuthTokenResponse,
        fallback_refresh_token: Option<String>,
    ) -> OAuthToken {
        let expires_at = (self.now_provider)() + Duration::seconds(response.expires_in.max(0));
        OAuthToken {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(fallback_refresh_token),
            expires_at,
            token_type: response.token_type.unwrap_or_else(|| "Bearer".to_string()),
            scope: response.scope,
        }
    }
}

#[async_trait]
impl<S, C> AccessTokenProvider for OAuthManager<S, C>
where
    S: CredentialStore,
    C: OAuthHttpClient,
{
    async fn access_token(&self) -> Result<String, InfraError> {
        match self.ensure_access_token().await? {
            EnsureTokenResult::Existing(token) | EnsureTokenResult::Refreshed(token) => {
                Ok(token.access_token)
            }
            EnsureTokenResult::ReauthenticationRequired => Err(InfraError::OAuth(
                "no usable google token; re-authorize to create a fresh token.json".to_string(),
            )),
        }
    }
}
