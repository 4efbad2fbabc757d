use crate::infrastructure::error::InfraError;
use crate::infrastructure::event_mapper::GoogleCalendarEvent;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use std::sync::Arc;
use url::Url;

pub const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/";
const PAGE_SIZE: &str = "250";

#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, InfraError>;
}

/// Token supplied directly, e.g. through `GOOGLE_ACCESS_TOKEN`.
#[derive(Debug, Clone)]
pub struct StaticAccessToken(String);

impl StaticAccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl AccessTokenProvider for StaticAccessToken {
    async fn access_token(&self) -> Result<String, InfraError> {
        Ok(self.0.clone())
    }
}

/// Read-only source of raw events for one calendar and time range.
#[async_trait]
pub trait CalendarSource: Send + Sync {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError>;
}

#[derive(Clone)]
pub struct ReqwestGoogleCalendarClient {
    client: Client,
    tokens: Arc<dyn AccessTokenProvider>,
    api_base: String,
}

impl ReqwestGoogleCalendarClient {
    pub fn new(client: Client, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self {
            client,
            tokens,
            api_base: CALENDAR_API_BASE.to_string(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), InfraError> {
        if value.trim().is_empty() {
            return Err(InfraError::Calendar(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn http_error(status: reqwest::StatusCode, body: &str) -> InfraError {
        let message = if body.trim().is_empty() {
            format!("google calendar api error: http {}", status.as_u16())
        } else {
            format!("google calendar api error: http {}; body={body}", status.as_u16())
        };
        InfraError::Calendar(message)
    }

    fn events_endpoint(&self, calendar_id: &str) -> Result<Url, InfraError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|error| InfraError::Calendar(format!("invalid calendar api base url: {error}")))?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                InfraError::Calendar("calendar api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty();
            segments.push("calendars");
            segments.push(calendar_id);
            segments.push("events");
        }
        Ok(url)
    }
}

#[derive(Debug, serde::Deserialize)]
struct EventsPageResponse {
    items: Option<Vec<GoogleCalendarEvent>>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[async_trait]
impl CalendarSource for ReqwestGoogleCalendarClient {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<GoogleCalendarEvent>, InfraError> {
        Self::ensure_non_empty(calendar_id, "calendar id")?;
        let access_token = self.tokens.access_token().await?;
        Self::ensure_non_empty(&access_token, "access token")?;

        let endpoint = self.events_endpoint(calendar_id)?;
        let time_min = time_min.to_rfc3339_opts(SecondsFormat::Millis, true);
        let time_max = time_max.to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut page_token: Option<String> = None;
        let mut events = Vec::new();

        loop {
            let mut req = self
                .client
                .get(endpoint.clone())
                .bearer_auth(&access_token)
                .query(&[
                    ("timeMin", time_min.as_str()),
                    ("timeMax", time_max.as_str()),
                    ("singleEvents", "true"),
                    ("orderBy", "startTime"),
                    ("maxResults", PAGE_SIZE),
                ]);
            if let Some(page_token) = page_token.as_deref() {
                req = req.query(&[("pageToken", page_token)]);
            }

            let response = req.send().await.map_err(|error| {
                InfraError::Calendar(format!("network error while listing calendar events: {error}"))
            })?;

            let status = response.status();
            let body = response.text().await.map_err(|error| {
                InfraError::Calendar(format!("failed reading events list response: {error}"))
            })?;
            if !status.is_success() {
                return Err(Self::http_error(status, &body));
            }

            let mut parsed: EventsPageResponse = serde_json::from_str(&body).map_err(|error| {
                InfraError::Calendar(format!("invalid events list payload: {error}; body={body}"))
            })?;
            events.extend(parsed.items.take().unwrap_or_default());

            match parsed.next_page_token.take() {
                Some(next_page_token) => page_token = Some(next_page_token),
                None => break,
            }
        }

        tracing::debug!(calendar_id, count = events.len(), "fetched calendar events");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn client_for(server: &MockServer) -> ReqwestGoogleCalendarClient {
        ReqwestGoogleCalendarClient::new(
            Client::new(),
            Arc::new(StaticAccessToken::new("test-token")),
        )
        .with_api_base(format!("{}/calendar/v3/", server.uri()))
    }

    #[tokio::test]
    async fn list_events_sends_window_and_follows_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .and(header("authorization", "Bearer test-token"))
            .and(query_param("timeMin", "2026-02-16T09:00:00.000Z"))
            .and(query_param("timeMax", "2026-02-16T09:05:00.000Z"))
            .and(query_param("singleEvents", "true"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    { "id": "e2", "summary": "Second", "start": { "dateTime": "2026-02-16T09:04:00Z" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/primary/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "items": [
                    { "id": "e1", "summary": "First", "start": { "dateTime": "2026-02-16T09:01:00Z" } }
                ],
                "nextPageToken": "page-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let events = client_for(&server)
            .list_events(
                "primary",
                fixed_time("2026-02-16T09:00:00Z"),
                fixed_time("2026-02-16T09:05:00Z"),
            )
            .await
            .expect("list events");

        let ids: Vec<_> = events.iter().filter_map(|event| event.id.as_deref()).collect();
        assert_eq!(ids, vec!["e1", "e2"]);
    }

    #[tokio::test]
    async fn group_calendar_id_is_a_single_path_segment() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/calendar/v3/calendars/team@group.calendar.google.com/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "items": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let events = client_for(&server)
            .list_events(
                "team@group.calendar.google.com",
                fixed_time("2026-02-16T09:00:00Z"),
                fixed_time("2026-02-16T09:05:00Z"),
            )
            .await
            .expect("list events");
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn http_failure_is_reported_as_calendar_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let error = client_for(&server)
            .list_events(
                "primary",
                fixed_time("2026-02-16T09:00:00Z"),
                fixed_time("2026-02-16T09:05:00Z"),
            )
            .await
            .expect_err("403 fails");

        match error {
            InfraError::Calendar(message) => {
                assert!(message.contains("http 403"));
                assert!(message.contains("forbidden"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
