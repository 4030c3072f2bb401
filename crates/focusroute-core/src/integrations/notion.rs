//! Notion to-do list integration.
//!
//! The task list is a single page whose `to_do` children are the items.
//! Unchecked items become planning candidates; new items are appended to
//! the same page.

use reqwest::Client;
use serde_json::json;
use tokio::runtime::Runtime;

use super::keyring_store;
use super::traits::{Todo, TodoSource};
use super::{adapter_runtime, check_status};
use crate::error::{ConfigError, CoreError, OAuthError, Result};
use crate::storage::NotionConfig;

const SERVICE: &str = "notion";
const NOTION_VERSION: &str = "2022-06-28";
const TOKEN_KEY: &str = "notion_token";
/// Longest to-do text written to Notion.
pub const MAX_TODO_CHARS: usize = 160;

/// Clip text to [`MAX_TODO_CHARS`], ending in `...` when shortened.
pub fn clip_todo_text(text: &str) -> String {
    if text.chars().count() <= MAX_TODO_CHARS {
        return text.to_string();
    }
    let mut clipped: String = text.chars().take(MAX_TODO_CHARS - 3).collect();
    clipped.push_str("...");
    clipped
}

pub struct NotionTodos {
    http: Client,
    runtime: Runtime,
    token: String,
    page_id: String,
    api_base: String,
}

impl NotionTodos {
    /// Client using the keyring token, falling back to `NOTION_TOKEN`.
    pub fn new(config: &NotionConfig) -> Result<Self> {
        let token = Self::stored_token()
            .or_else(|| std::env::var("NOTION_TOKEN").ok().filter(|t| !t.is_empty()))
            .ok_or_else(|| OAuthError::CredentialsNotConfigured {
                service: SERVICE.to_string(),
            })?;
        Self::with_token(config, token)
    }

    pub fn with_token(config: &NotionConfig, token: impl Into<String>) -> Result<Self> {
        if config.tasks_page_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "notion.tasks_page_id".to_string(),
                message: "not set".to_string(),
            }
            .into());
        }
        Ok(Self {
            http: Client::new(),
            runtime: adapter_runtime(SERVICE)?,
            token: token.into(),
            page_id: config.tasks_page_id.trim().to_string(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    /// Integration token stored in the OS keyring.
    pub fn stored_token() -> Option<String> {
        keyring_store::get(TOKEN_KEY).ok().flatten().filter(|t| !t.is_empty())
    }

    /// Persist the integration token to the OS keyring.
    pub fn set_token(token: &str) -> Result<(), OAuthError> {
        keyring_store::set(TOKEN_KEY, token)
    }

    pub fn clear_token() -> Result<(), OAuthError> {
        keyring_store::delete(TOKEN_KEY)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
    }

    fn send_json(&self, builder: reqwest::RequestBuilder) -> Result<serde_json::Value> {
        self.runtime.block_on(async {
            let resp = builder
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

    /// Verify the token by hitting the users/me endpoint.
    pub fn verify(&self) -> Result<()> {
        let url = format!("{}/users/me", self.api_base);
        self.send_json(self.request(reqwest::Method::GET, &url))?;
        Ok(())
    }
}

fn plain_text(block: &serde_json::Value) -> String {
    block["to_do"]["rich_text"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["plain_text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

impl TodoSource for NotionTodos {
    fn list_unchecked(&self) -> Result<Vec<Todo>> {
        let url = format!("{}/blocks/{}/children", self.api_base, self.page_id);
        let mut todos = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut builder = self
                .request(reqwest::Method::GET, &url)
                .query(&[("page_size", "100")]);
            if let Some(start) = &cursor {
                builder = builder.query(&[("start_cursor", start.as_str())]);
            }
            let page = self.send_json(builder)?;

            let results = page["results"].as_array().cloned().unwrap_or_default();
            todos.extend(
                results
                    .iter()
                    .filter(|block| block["type"].as_str() == Some("to_do"))
                    .filter(|block| !block["to_do"]["checked"].as_bool().unwrap_or(false))
                    .filter_map(|block| {
                        Some(Todo {
                            block_id: block["id"].as_str()?.to_string(),
                            text: plain_text(block),
                        })
                    }),
            );

            cursor = page["next_cursor"].as_str().map(str::to_string);
            if !page["has_more"].as_bool().unwrap_or(false) || cursor.is_none() {
                break;
            }
        }

        Ok(todos)
    }

    fn add_todo(&self, text: &str) -> Result<String> {
        let url = format!("{}/blocks/{}/children", self.api_base, self.page_id);
        let body = json!({
            "children": [{
                "object": "block",
                "type": "to_do",
                "to_do": {
                    "rich_text": [{ "type": "text", "text": { "content": clip_todo_text(text) } }],
                    "checked": false,
                },
            }],
        });

        let resp = self.send_json(self.request(reqwest::Method::PATCH, &url).json(&body))?;
        resp["results"][0]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CoreError::collaborator(SERVICE, "missing block id in response"))
    }
}
