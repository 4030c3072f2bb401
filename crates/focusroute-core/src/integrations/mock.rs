//! In-memory collaborators for offline runs and tests.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;

use super::notion::clip_todo_text;
use super::traits::{
    BusySource, Email, EventSink, MailSource, NewEvent, TextGenerator, Todo, TodoSource,
};
use crate::error::{CoreError, Result};
use crate::interval::TimeInterval;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Calendar holding a fixed busy list and recording created events.
#[derive(Debug, Default)]
pub struct MockCalendar {
    busy: Vec<TimeInterval>,
    created: Mutex<Vec<NewEvent>>,
    fail_busy: bool,
    fail_create_after: Option<usize>,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_busy(busy: Vec<TimeInterval>) -> Self {
        Self {
            busy,
            ..Self::default()
        }
    }

    /// Make `get_busy` fail.
    pub fn failing_busy(mut self) -> Self {
        self.fail_busy = true;
        self
    }

    /// Make `create_event` fail once `count` events exist.
    pub fn fail_create_after(mut self, count: usize) -> Self {
        self.fail_create_after = Some(count);
        self
    }

    /// Events created so far, in creation order.
    pub fn created(&self) -> Vec<NewEvent> {
        lock(&self.created).clone()
    }
}

impl BusySource for MockCalendar {
    fn get_busy(&self, day: NaiveDate) -> Result<Vec<TimeInterval>> {
        if self.fail_busy {
            return Err(CoreError::collaborator("mock-calendar", "busy lookup failed"));
        }
        Ok(self
            .busy
            .iter()
            .filter(|interval| {
                interval.start().date_naive() <= day && interval.end().date_naive() >= day
            })
            .copied()
            .collect())
    }
}

impl EventSink for MockCalendar {
    fn create_event(&self, event: &NewEvent) -> Result<String> {
        let mut created = lock(&self.created);
        if self.fail_create_after.is_some_and(|limit| created.len() >= limit) {
            return Err(CoreError::collaborator("mock-calendar", "event creation failed"));
        }
        tracing::info!(
            title = %event.title,
            start = %event.start.format("%H:%M"),
            end = %event.end.format("%H:%M"),
            "mock calendar event"
        );
        created.push(event.clone());
        Ok(format!("mock_evt_{}", event.start.timestamp()))
    }
}

/// Inbox with a fixed list of messages.
#[derive(Debug, Default)]
pub struct MockInbox {
    emails: Vec<Email>,
}

impl MockInbox {
    pub fn new(emails: Vec<Email>) -> Self {
        Self { emails }
    }

    /// Three sample messages used by offline runs.
    pub fn sample(date: &str) -> Self {
        let email = |thread_id: &str, subject: &str, snippet: &str, sender: &str| Email {
            thread_id: thread_id.to_string(),
            subject: subject.to_string(),
            snippet: snippet.to_string(),
            sender: sender.to_string(),
            date: date.to_string(),
        };
        Self::new(vec![
            email(
                "t1",
                "Client contract addendum",
                "Please review and approve the addendum.",
                "lawyer@example.com",
            ),
            email(
                "t2",
                "Purchase invoice",
                "PDF attached.",
                "invoices@example.com",
            ),
            email(
                "t3",
                "Coordinate site visit",
                "Can we coordinate for this Friday?",
                "lead@example.com",
            ),
        ])
    }
}

impl MailSource for MockInbox {
    fn fetch_recent(&self) -> Result<Vec<Email>> {
        Ok(self.emails.clone())
    }
}

/// To-do list kept in memory. New items get ids `mock_1`, `mock_2`, ...
#[derive(Debug, Default)]
pub struct MockTodos {
    todos: Mutex<Vec<(Todo, bool)>>,
    fail_list: bool,
}

impl MockTodos {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populated unchecked items.
    pub fn with_items<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let todos = Self::new();
        for text in items {
            let text = text.into();
            let mut list = lock(&todos.todos);
            let block_id = format!("mock_{}", list.len() + 1);
            list.push((Todo { block_id, text }, false));
        }
        todos
    }

    pub fn failing(mut self) -> Self {
        self.fail_list = true;
        self
    }

    /// Mark an item as done so it is no longer listed.
    pub fn check(&self, block_id: &str) {
        for (todo, checked) in lock(&self.todos).iter_mut() {
            if todo.block_id == block_id {
                *checked = true;
            }
        }
    }

    /// Every item, checked or not.
    pub fn all(&self) -> Vec<Todo> {
        lock(&self.todos).iter().map(|(todo, _)| todo.clone()).collect()
    }
}

impl TodoSource for MockTodos {
    fn list_unchecked(&self) -> Result<Vec<Todo>> {
        if self.fail_list {
            return Err(CoreError::collaborator("mock-todos", "listing failed"));
        }
        Ok(lock(&self.todos)
            .iter()
            .filter(|(_, checked)| !checked)
            .map(|(todo, _)| todo.clone())
            .collect())
    }

    fn add_todo(&self, text: &str) -> Result<String> {
        let mut list = lock(&self.todos);
        let block_id = format!("mock_{}", list.len() + 1);
        list.push((
            Todo {
                block_id: block_id.clone(),
                text: clip_todo_text(text),
            },
            false,
        ));
        Ok(block_id)
    }
}

/// Text generator replaying canned responses in order.
///
/// Once the script runs out every call fails, which exercises the ranking
/// fallbacks. [`MockGenerator::offline`] always fails.
#[derive(Debug, Default)]
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.into())).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Generator with no responses: every ranking step falls back.
    pub fn offline() -> Self {
        Self::default()
    }

    /// Queue a failing call.
    pub fn push_failure(&self, message: &str) {
        lock(&self.responses).push_back(Err(message.to_string()));
    }

    /// User prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }
}

impl TextGenerator for MockGenerator {
    fn generate(&self, _system: &str, prompt: &str) -> Result<String> {
        lock(&self.prompts).push(prompt.to_string());
        match lock(&self.responses).pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(CoreError::collaborator("mock-llm", message)),
            None => Err(CoreError::collaborator("mock-llm", "no response available")),
        }
    }
}
