use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::interval::TimeInterval;

/// Source of already-occupied time for a day.
///
/// An empty list means a free day. Failures must be surfaced, never treated
/// as "free".
pub trait BusySource {
    fn get_busy(&self, day: NaiveDate) -> Result<Vec<TimeInterval>>;
}

/// A calendar event to create for a placed block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub description: String,
}

/// Destination for placed blocks. Each call creates one event; callers never
/// retry it.
pub trait EventSink {
    /// Create the event and return its external id.
    fn create_event(&self, event: &NewEvent) -> Result<String>;
}

/// An unchecked to-do item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub block_id: String,
    pub text: String,
}

/// To-do list the day's candidates come from and new to-dos go to.
pub trait TodoSource {
    fn list_unchecked(&self) -> Result<Vec<Todo>>;

    /// Append a to-do and return its block id.
    fn add_todo(&self, text: &str) -> Result<String>;
}

/// Mail message metadata used for candidate selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub thread_id: String,
    pub subject: String,
    pub snippet: String,
    pub sender: String,
    pub date: String,
}

/// Recent mail.
pub trait MailSource {
    fn fetch_recent(&self) -> Result<Vec<Email>>;

    /// Provider sync position reached by the last fetch, if it has one.
    fn sync_cursor(&self) -> Option<String> {
        None
    }
}

/// Free-text generation (an LLM). Output is untrusted.
pub trait TextGenerator {
    fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}
