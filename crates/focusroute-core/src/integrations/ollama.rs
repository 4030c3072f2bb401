//! Ollama chat client used for ranking.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tokio::runtime::Runtime;

use super::traits::TextGenerator;
use super::{adapter_runtime, check_status};
use crate::error::{CoreError, Result};
use crate::storage::OllamaConfig;

const SERVICE: &str = "ollama";

pub struct OllamaClient {
    http: Client,
    runtime: Runtime,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::collaborator_with(SERVICE, e))?;
        Ok(Self {
            http,
            runtime: adapter_runtime(SERVICE)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl TextGenerator for OllamaClient {
    /// One non-streaming chat turn at temperature 0.
    fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": prompt },
            ],
            "stream": false,
            "options": { "temperature": 0.0 },
        });

        let resp: serde_json::Value = self.runtime.block_on(async {
            let resp = self
                .http
                .post(&url)
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

        resp["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| CoreError::collaborator(SERVICE, "missing message content"))
    }
}
