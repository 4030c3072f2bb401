//! Google Calendar + Gmail integration.
//!
//! Calendar supplies the day's busy time and receives one event per placed
//! block. Gmail supplies recent message metadata for candidate selection.
//! Uses OAuth2 tokens stored in the OS keyring, or a static bearer token.

use std::sync::Mutex;

use chrono::{DateTime, Days, NaiveDate};
use chrono_tz::Tz;
use reqwest::Client;
use serde_json::json;
use tokio::runtime::Runtime;

use super::keyring_store;
use super::oauth::{self, OAuthConfig};
use super::traits::{BusySource, Email, EventSink, MailSource, NewEvent};
use super::{adapter_runtime, check_status};
use crate::error::{CoreError, OAuthError, Result};
use crate::interval::TimeInterval;
use crate::scheduler::start_of_day;
use crate::storage::GoogleConfig;

const SERVICE: &str = "google";
const TOKENS_KEY: &str = "google";
const MAX_SUBJECT_CHARS: usize = 200;
const MAX_SNIPPET_CHARS: usize = 300;

/// Where access tokens come from.
enum TokenSource {
    /// Fixed bearer token (tests, service tokens).
    Static(String),
    /// OAuth tokens in the keyring, refreshed when expired.
    Keyring,
}

/// Google Calendar + Gmail client.
pub struct GoogleClient {
    http: Client,
    runtime: Runtime,
    tokens: TokenSource,
    tz: Tz,
    calendar_id: String,
    calendar_api_base: String,
    gmail_api_base: String,
    mail_query: String,
    mail_limit: u32,
    /// Highest Gmail history id seen by the last fetch.
    last_history_id: Mutex<Option<u64>>,
}

impl GoogleClient {
    /// Client authenticated through the keyring-stored OAuth tokens.
    pub fn new(config: &GoogleConfig, tz: Tz) -> Result<Self> {
        Self::build(config, tz, TokenSource::Keyring)
    }

    /// Client using a fixed bearer token.
    pub fn with_token(config: &GoogleConfig, tz: Tz, token: impl Into<String>) -> Result<Self> {
        Self::build(config, tz, TokenSource::Static(token.into()))
    }

    fn build(config: &GoogleConfig, tz: Tz, tokens: TokenSource) -> Result<Self> {
        Ok(Self {
            http: Client::new(),
            runtime: adapter_runtime(SERVICE)?,
            tokens,
            tz,
            calendar_id: config.calendar_id.clone(),
            calendar_api_base: config.calendar_api_base.trim_end_matches('/').to_string(),
            gmail_api_base: config.gmail_api_base.trim_end_matches('/').to_string(),
            mail_query: config.mail_query.clone(),
            mail_limit: config.mail_limit,
            last_history_id: Mutex::new(None),
        })
    }

    /// Persist Google OAuth client credentials to the OS keyring.
    pub fn set_credentials(client_id: &str, client_secret: &str) -> Result<(), OAuthError> {
        keyring_store::set("google_client_id", client_id)?;
        keyring_store::set("google_client_secret", client_secret)?;
        Ok(())
    }

    /// OAuth settings built from the stored client credentials.
    pub fn oauth_config() -> Result<OAuthConfig, OAuthError> {
        let not_configured = || OAuthError::CredentialsNotConfigured {
            service: SERVICE.to_string(),
        };
        let client_id = keyring_store::get("google_client_id")?
            .filter(|v| !v.is_empty())
            .ok_or_else(not_configured)?;
        let client_secret = keyring_store::get("google_client_secret")?
            .filter(|v| !v.is_empty())
            .ok_or_else(not_configured)?;

        Ok(OAuthConfig {
            service_name: TOKENS_KEY.to_string(),
            client_id,
            client_secret,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            scopes: vec![
                "https://www.googleapis.com/auth/gmail.readonly".to_string(),
                "https://www.googleapis.com/auth/calendar".to_string(),
            ],
            redirect_port: 19821,
        })
    }

    pub fn is_authenticated() -> bool {
        oauth::load_tokens(TOKENS_KEY).is_some()
    }

    /// Run the browser-based OAuth flow and store the tokens.
    pub fn authorize() -> Result<()> {
        let config = Self::oauth_config()?;
        adapter_runtime(SERVICE)?.block_on(oauth::authorize(&config))?;
        Ok(())
    }

    /// Forget the stored tokens.
    pub fn disconnect() -> Result<(), OAuthError> {
        keyring_store::delete(TOKENS_KEY)
    }

    /// Return a valid access token, refreshing if expired.
    fn access_token(&self) -> Result<String> {
        if let TokenSource::Static(token) = &self.tokens {
            return Ok(token.clone());
        }

        let tokens = oauth::load_tokens(TOKENS_KEY).ok_or_else(|| OAuthError::NotAuthenticated {
            service: SERVICE.to_string(),
        })?;
        if !oauth::is_expired(&tokens) {
            return Ok(tokens.access_token);
        }

        let refresh = tokens.refresh_token.as_deref().ok_or_else(|| {
            OAuthError::TokenRefreshFailed("no refresh token available".to_string())
        })?;
        let config = Self::oauth_config()?;
        let refreshed = self
            .runtime
            .block_on(oauth::refresh_token(&config, refresh))?;
        Ok(refreshed.access_token)
    }

    fn get_json(&self, url: &str, query: &[(&str, String)]) -> Result<serde_json::Value> {
        let token = self.access_token()?;
        self.runtime.block_on(async {
            let resp = self
                .http
                .get(url)
                .bearer_auth(&token)
                .query(query)
                .send()
                .await
                .map_err(|e| CoreError::collaborator_with(SERVICE, e))?;
            check_status(SERVICE, resp)
                .await?
                .json()
                .await
                .map_err(|e| CoreError::collaborator_with(SERVICE, e))
        })
    }

    fn parse_instant(&self, value: &str) -> Option<DateTime<Tz>> {
        DateTime::parse_from_rfc3339(value)
            .ok()
            .map(|dt| dt.with_timezone(&self.tz))
    }

    /// Metadata for one Gmail message.
    fn fetch_message(&self, id: &str) -> Result<Email> {
        let url = format!("{}/users/me/messages/{id}", self.gmail_api_base);
        let msg = self.get_json(
            &url,
            &[
                ("format", "metadata".to_string()),
                ("metadataHeaders", "Subject".to_string()),
                ("metadataHeaders", "From".to_string()),
                ("metadataHeaders", "Date".to_string()),
            ],
        )?;

        let header = |name: &str| {
            msg["payload"]["headers"]
                .as_array()
                .and_then(|headers| {
                    headers
                        .iter()
                        .find(|h| h["name"].as_str() == Some(name))
                        .and_then(|h| h["value"].as_str())
                })
                .map(str::to_string)
        };

        if let Some(history_id) = msg["historyId"].as_str().and_then(|h| h.parse::<u64>().ok()) {
            if let Ok(mut last) = self.last_history_id.lock() {
                *last = Some(last.map_or(history_id, |seen| seen.max(history_id)));
            }
        }

        let thread_id = msg["threadId"]
            .as_str()
            .or_else(|| msg["id"].as_str())
            .unwrap_or(id)
            .to_string();

        Ok(Email {
            thread_id,
            subject: truncate(
                &header("Subject").unwrap_or_else(|| "(no subject)".to_string()),
                MAX_SUBJECT_CHARS,
            ),
            snippet: truncate(msg["snippet"].as_str().unwrap_or_default(), MAX_SNIPPET_CHARS),
            sender: header("From").unwrap_or_default(),
            date: header("Date").unwrap_or_default(),
        })
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

impl BusySource for GoogleClient {
    /// Timed events of the day. All-day events do not block time.
    fn get_busy(&self, day: NaiveDate) -> Result<Vec<TimeInterval>> {
        let next_day = day
            .checked_add_days(Days::new(1))
            .ok_or_else(|| CoreError::collaborator(SERVICE, format!("day out of range: {day}")))?;
        let time_min = start_of_day(self.tz, day);
        let time_max = start_of_day(self.tz, next_day);

        let url = format!(
            "{}/calendars/{}/events",
            self.calendar_api_base, self.calendar_id
        );
        let resp = self.get_json(
            &url,
            &[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ],
        )?;

        let items = resp["items"].as_array().cloned().unwrap_or_default();
        let busy = items
            .iter()
            .filter(|item| item["status"].as_str() != Some("cancelled"))
            .filter_map(|item| {
                let start = self.parse_instant(item["start"]["dateTime"].as_str()?)?;
                let end = self.parse_instant(item["end"]["dateTime"].as_str()?)?;
                TimeInterval::new(start, end).ok()
            })
            .collect::<Vec<_>>();

        tracing::debug!(%day, events = items.len(), busy = busy.len(), "fetched calendar busy time");
        Ok(busy)
    }
}

impl EventSink for GoogleClient {
    fn create_event(&self, event: &NewEvent) -> Result<String> {
        let token = self.access_token()?;
        let url = format!(
            "{}/calendars/{}/events",
            self.calendar_api_base, self.calendar_id
        );
        let body = json!({
            "summary": event.title,
            "description": event.description,
            "start": { "dateTime": event.start.to_rfc3339(), "timeZone": self.tz.name() },
            "end": { "dateTime": event.end.to_rfc3339(), "timeZone": self.tz.name() },
        });

        let created: serde_json::Value = self.runtime.block_on(async {
            let resp = self
                .http
                .post(&url)
                .bearer_auth(&token)
                .json(&body)
                .send()
                .await
                .map_err(|e| CoreError::collaborator_with(SERVICE, e))?;
            check_status(SERVICE, resp)
                .await?
                .json()
                .await
                .map_err(|e| CoreError::collaborator_with(SERVICE, e))
        })?;

        created["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CoreError::collaborator(SERVICE, "missing event id in response"))
    }
}

impl MailSource for GoogleClient {
    /// Recent messages, newest first.
    fn fetch_recent(&self) -> Result<Vec<Email>> {
        let url = format!("{}/users/me/messages", self.gmail_api_base);
        let list = self.get_json(
            &url,
            &[
                ("q", self.mail_query.clone()),
                ("maxResults", self.mail_limit.to_string()),
            ],
        )?;

        let ids: Vec<String> = list["messages"]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|m| m["id"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        ids.iter().map(|id| self.fetch_message(id)).collect()
    }

    fn sync_cursor(&self) -> Option<String> {
        self.last_history_id
            .lock()
            .ok()
            .and_then(|last| *last)
            .map(|id| id.to_string())
    }
}
