//! TOML-based application configuration.
//!
//! Stores:
//! - Workday rules (bounds, lunch, buffer, quotas)
//! - The timezone all planning happens in
//! - Collaborator endpoints (Google, Notion, Ollama)
//!
//! Configuration is stored at `~/.config/focusroute/config.toml`. A few
//! settings can be overridden from the environment (`APP_TZ`,
//! `OLLAMA_BASE_URL`, `OLLAMA_MODEL`, `NOTION_TASKS_PAGE_ID`).

use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::scheduler::WorkdayRules;

/// Workday rules as written in the config file (times as `HH:MM`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkdayConfig {
    #[serde(default = "default_workday_start")]
    pub workday_start: String,
    #[serde(default = "default_workday_end")]
    pub workday_end: String,
    #[serde(default = "default_lunch_start")]
    pub lunch_start: String,
    #[serde(default = "default_lunch_end")]
    pub lunch_end: String,
    #[serde(default = "default_buffer_minutes")]
    pub buffer_minutes: i64,
    #[serde(default = "default_max_blocks")]
    pub max_blocks_per_day: u32,
    #[serde(default = "default_max_deep_morning")]
    pub max_deep_work_morning: u32,
}

/// Google Calendar / Gmail settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_calendar_id")]
    pub calendar_id: String,
    #[serde(default = "default_calendar_api_base")]
    pub calendar_api_base: String,
    #[serde(default = "default_gmail_api_base")]
    pub gmail_api_base: String,
    /// Gmail search query for recent mail.
    #[serde(default = "default_mail_query")]
    pub mail_query: String,
    #[serde(default = "default_mail_limit")]
    pub mail_limit: u32,
}

/// Notion to-do page settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    /// Page whose `to_do` children are the task list.
    #[serde(default)]
    pub tasks_page_id: String,
    #[serde(default = "default_notion_api_base")]
    pub api_base: String,
}

/// Local LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_ollama_model")]
    pub model: String,
    #[serde(default = "default_ollama_timeout")]
    pub timeout_secs: u64,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/focusroute/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IANA zone name, e.g. `America/Lima`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default)]
    pub workday: WorkdayConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub notion: NotionConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
}

// Default functions
fn default_timezone() -> String {
    "America/Lima".into()
}
fn default_workday_start() -> String {
    "08:30".into()
}
fn default_workday_end() -> String {
    "19:00".into()
}
fn default_lunch_start() -> String {
    "13:00".into()
}
fn default_lunch_end() -> String {
    "14:00".into()
}
fn default_buffer_minutes() -> i64 {
    10
}
fn default_max_blocks() -> u32 {
    5
}
fn default_max_deep_morning() -> u32 {
    3
}
fn default_calendar_id() -> String {
    "primary".into()
}
fn default_calendar_api_base() -> String {
    "https://www.googleapis.com/calendar/v3".into()
}
fn default_gmail_api_base() -> String {
    "https://gmail.googleapis.com/gmail/v1".into()
}
fn default_mail_query() -> String {
    "newer_than:2d".into()
}
fn default_mail_limit() -> u32 {
    30
}
fn default_notion_api_base() -> String {
    "https://api.notion.com/v1".into()
}
fn default_ollama_base_url() -> String {
    "http://localhost:11434".into()
}
fn default_ollama_model() -> String {
    "gpt-oss:20b".into()
}
fn default_ollama_timeout() -> u64 {
    120
}

impl Default for WorkdayConfig {
    fn default() -> Self {
        Self {
            workday_start: default_workday_start(),
            workday_end: default_workday_end(),
            lunch_start: default_lunch_start(),
            lunch_end: default_lunch_end(),
            buffer_minutes: default_buffer_minutes(),
            max_blocks_per_day: default_max_blocks(),
            max_deep_work_morning: default_max_deep_morning(),
        }
    }
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            calendar_id: default_calendar_id(),
            calendar_api_base: default_calendar_api_base(),
            gmail_api_base: default_gmail_api_base(),
            mail_query: default_mail_query(),
            mail_limit: default_mail_limit(),
        }
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            tasks_page_id: String::new(),
            api_base: default_notion_api_base(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: default_ollama_base_url(),
            model: default_ollama_model(),
            timeout_secs: default_ollama_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            workday: WorkdayConfig::default(),
            google: GoogleConfig::default(),
            notion: NotionConfig::default(),
            ollama: OllamaConfig::default(),
        }
    }
}

fn parse_hhmm(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("expected HH:MM, got '{value}': {e}"),
    })
}

impl WorkdayConfig {
    /// Parse into scheduler rules, checking their ordering.
    pub fn to_rules(&self) -> Result<WorkdayRules, ConfigError> {
        let rules = WorkdayRules {
            workday_start: parse_hhmm("workday.workday_start", &self.workday_start)?,
            workday_end: parse_hhmm("workday.workday_end", &self.workday_end)?,
            lunch_start: parse_hhmm("workday.lunch_start", &self.lunch_start)?,
            lunch_end: parse_hhmm("workday.lunch_end", &self.lunch_end)?,
            buffer_minutes: self.buffer_minutes,
            max_blocks_per_day: self.max_blocks_per_day,
            max_deep_work_morning: self.max_deep_work_morning,
        };
        rules.validate().map_err(|e| ConfigError::InvalidValue {
            key: "workday".to_string(),
            message: e.to_string(),
        })?;
        Ok(rules)
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value
                        .parse::<bool>()
                        .map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<i64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as integer")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("not a leaf setting".to_string()))
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// `~/.config/focusroute/config.toml`
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::DataDir(e.to_string()))?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing the defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// The whole config is re-validated; on error `self` is unchanged.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config =
            serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Set a value by key and save. Returns error if key is unknown.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Flattened `key = value` pairs for display.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(tz) = non_empty("APP_TZ") {
            self.timezone = tz;
        }
        if let Some(url) = non_empty("OLLAMA_BASE_URL") {
            self.ollama.base_url = url;
        }
        if let Some(model) = non_empty("OLLAMA_MODEL") {
            self.ollama.model = model;
        }
        if let Some(page) = non_empty("NOTION_TASKS_PAGE_ID") {
            self.notion.tasks_page_id = page;
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Configured timezone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::InvalidValue {
                key: "timezone".to_string(),
                message: e.to_string(),
            })
    }

    /// Parsed scheduler rules.
    pub fn workday_rules(&self) -> Result<WorkdayRules, ConfigError> {
        self.workday.to_rules()
    }

    /// Check every value that is parsed lazily.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.tz()?;
        self.workday_rules()?;
        Ok(())
    }
}
