//! Constrained interval scheduler for one workday.
//!
//! This module turns an ordered list of task requests into calendar blocks:
//! - Computes free time inside the workday against calendar busy time and lunch
//! - Places tasks greedily in input order, splitting around lunch
//! - Enforces buffers, a daily block quota and a morning deep-work quota
//! - Falls back to a single triage block when nothing could be placed

mod engine;
mod free;
mod slot;
mod workday;

pub use engine::{
    planning_day, BlockPlacer, DayLayout, Outcome, PlacementState, ScheduleQuotas, Step,
};
pub use free::{free_segments, FreeSegments};
pub use slot::find_slot;
pub use workday::{local, start_of_day, Workday, WorkdayRules, MORNING_CUTOFF_HOUR};

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::ValidationError;
use crate::interval::TimeInterval;

/// Shortest task duration accepted after normalization.
pub const MIN_TASK_MINUTES: i64 = 10;
/// Longest task duration accepted after normalization.
pub const MAX_TASK_MINUTES: i64 = 120;
/// Titles are truncated to this many characters.
pub const MAX_TITLE_CHARS: usize = 200;
/// Tasks at least this long count as deep work.
pub const DEEP_WORK_MINUTES: i64 = 45;
/// Length of the fallback triage block.
pub const TRIAGE_MINUTES: i64 = 30;
pub const TRIAGE_TITLE: &str = "Triage (30m)";
pub const TRIAGE_DESCRIPTION: &str = "Sort pending items and write a minimal plan.";
pub const BLOCK_DESCRIPTION: &str =
    "Rules: no notifications, no multitasking.\nAcceptance criterion: leave minimal evidence (note/link).";

/// A task to place, already normalized.
///
/// Titles are trimmed, non-empty and at most [`MAX_TITLE_CHARS`] characters;
/// minutes lie in `[MIN_TASK_MINUTES, MAX_TASK_MINUTES]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRequest {
    title: String,
    minutes: i64,
    origin_id: Option<String>,
}

impl TaskRequest {
    /// Normalize a raw `(title, minutes)` pair.
    ///
    /// Durations are clamped rather than rejected; only an empty title is an
    /// error.
    pub fn new(title: &str, minutes: i64) -> Result<Self, ValidationError> {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidTask("title is empty".to_string()));
        }
        Ok(Self {
            title: trimmed.chars().take(MAX_TITLE_CHARS).collect(),
            minutes: minutes.clamp(MIN_TASK_MINUTES, MAX_TASK_MINUTES),
            origin_id: None,
        })
    }

    /// Attach the opaque id of the item this task came from (e.g. a mail thread).
    pub fn with_origin(mut self, origin_id: impl Into<String>) -> Self {
        let origin_id = origin_id.into();
        self.origin_id = (!origin_id.is_empty()).then_some(origin_id);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn minutes(&self) -> i64 {
        self.minutes
    }

    pub fn origin_id(&self) -> Option<&str> {
        self.origin_id.as_deref()
    }

    pub fn is_deep_work(&self) -> bool {
        self.minutes >= DEEP_WORK_MINUTES
    }
}

/// What a placed block stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Task,
    Triage,
}

/// A block that was placed and created on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacedBlock {
    pub title: String,
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
    pub external_event_id: String,
    pub origin_id: Option<String>,
    pub kind: BlockKind,
}

impl PlacedBlock {
    pub fn interval(&self) -> Option<TimeInterval> {
        TimeInterval::new(self.start, self.end).ok()
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// Why a task did not make it onto the calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No free segment could hold the task and its buffer.
    NoFreeSlot,
    /// The daily block quota was already used up.
    QuotaExhausted,
}

/// A task that was skipped during placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedTask {
    pub title: String,
    pub minutes: i64,
    pub origin_id: Option<String>,
    pub reason: DropReason,
}

impl DroppedTask {
    pub fn new(task: &TaskRequest, reason: DropReason) -> Self {
        Self {
            title: task.title.clone(),
            minutes: task.minutes,
            origin_id: task.origin_id.clone(),
            reason,
        }
    }
}

/// Outcome of one planning run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayPlan {
    pub day: NaiveDate,
    pub placed: Vec<PlacedBlock>,
    pub dropped: Vec<DroppedTask>,
    /// Whether the only block is the triage fallback.
    pub triaged: bool,
}

impl DayPlan {
    pub fn new(day: NaiveDate) -> Self {
        Self {
            day,
            placed: Vec::new(),
            dropped: Vec::new(),
            triaged: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.placed.is_empty()
    }
}
