//! Daily planning run.
//!
//! [`DailyRouter::run`] gathers to-dos and recent mail, asks the text
//! generator for the day's most important tasks, turns email MITs into
//! to-dos and places the estimated tasks on the calendar.

use std::fmt;

use chrono::{DateTime, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::RunError;
use crate::integrations::traits::{
    BusySource, Email, EventSink, MailSource, TextGenerator, TodoSource,
};
use crate::ranking::{self, Candidate, EstimatedTask};
use crate::scheduler::{
    planning_day, BlockPlacer, DayPlan, DropReason, TaskRequest, WorkdayRules, MAX_TITLE_CHARS,
};
use crate::storage::{LinkageRecorder, LinkageStore};

/// Words taken from the subject (and topped up from the snippet) for a to-do.
pub const TODO_TITLE_WORDS: usize = 15;
const MAX_SNIPPET_WORDS: usize = 10;
const MAIL_PROVIDER: &str = "gmail";

/// To-do text for an actionable email.
///
/// The first words of the subject, topped up from the snippet when the
/// subject is short.
pub fn todo_title(email: &Email) -> String {
    let mut words: Vec<&str> = email
        .subject
        .split_whitespace()
        .take(TODO_TITLE_WORDS)
        .collect();
    let room = TODO_TITLE_WORDS.saturating_sub(words.len());
    words.extend(
        email
            .snippet
            .split_whitespace()
            .take(MAX_SNIPPET_WORDS.min(room)),
    );
    words.join(" ").chars().take(MAX_TITLE_CHARS).collect()
}

/// What a run did, for display or JSON output.
#[derive(Debug, Clone, Serialize)]
pub struct PlanSummary {
    pub day: NaiveDate,
    pub todos_unchecked: usize,
    pub emails_fetched: usize,
    pub emails_actionable: usize,
    pub mits: Vec<Candidate>,
    /// Block ids of to-dos created from email MITs.
    pub created_todos: Vec<String>,
    pub estimates: Vec<EstimatedTask>,
    pub plan: DayPlan,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "===== DAILY FOCUS PLAN SUMMARY =====")?;
        writeln!(f, "Day: {}", self.day)?;
        writeln!(f, "Unchecked to-dos: {}", self.todos_unchecked)?;
        writeln!(
            f,
            "Emails fetched: {} (filtered to {} actionable)",
            self.emails_fetched, self.emails_actionable
        )?;
        writeln!(f, "Selected MITs: {}", self.mits.len())?;
        writeln!(f, "Created to-dos: {}", self.created_todos.len())?;

        writeln!(
            f,
            "Prioritized {} MITs with time estimates:",
            self.estimates.len()
        )?;
        for (i, estimate) in self.estimates.iter().enumerate() {
            writeln!(f, "   {}. {} ({} min)", i + 1, estimate.text, estimate.minutes)?;
        }

        writeln!(f, "Scheduled {} calendar blocks:", self.plan.placed.len())?;
        for block in &self.plan.placed {
            writeln!(
                f,
                "   • {}: {} - {}",
                block.title,
                block.start.format("%H:%M"),
                block.end.format("%H:%M")
            )?;
        }

        if !self.plan.dropped.is_empty() {
            writeln!(f, "Dropped {} tasks:", self.plan.dropped.len())?;
            for task in &self.plan.dropped {
                let reason = match task.reason {
                    DropReason::NoFreeSlot => "no free slot",
                    DropReason::QuotaExhausted => "block quota exhausted",
                };
                writeln!(f, "   - {} ({} min): {}", task.title, task.minutes, reason)?;
            }
        }
        Ok(())
    }
}

/// Collaborators and rules for one planning run.
pub struct DailyRouter<'a> {
    todos: &'a dyn TodoSource,
    mail: &'a dyn MailSource,
    generator: &'a dyn TextGenerator,
    busy_source: &'a dyn BusySource,
    sink: &'a dyn EventSink,
    linkage: Option<&'a LinkageStore>,
    rules: WorkdayRules,
    tz: Tz,
}

impl<'a> DailyRouter<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        todos: &'a dyn TodoSource,
        mail: &'a dyn MailSource,
        generator: &'a dyn TextGenerator,
        busy_source: &'a dyn BusySource,
        sink: &'a dyn EventSink,
        rules: WorkdayRules,
        tz: Tz,
    ) -> Self {
        Self {
            todos,
            mail,
            generator,
            busy_source,
            sink,
            linkage: None,
            rules,
            tz,
        }
    }

    /// Record thread/to-do/event links and the mail cursor in `store`.
    pub fn with_linkage(mut self, store: &'a LinkageStore) -> Self {
        self.linkage = Some(store);
        self
    }

    fn record(&self, origin_id: &str, block_id: Option<&str>) {
        if let Some(store) = self.linkage {
            if let Err(e) = store.upsert_mapping(origin_id, block_id, None) {
                warn!(origin_id, error = %e, "failed to record linkage");
            }
        }
    }

    fn fetch_mail(&self) -> Result<Vec<Email>, RunError> {
        let emails = self.mail.fetch_recent().map_err(RunError::before_placement)?;
        for email in &emails {
            self.record(&email.thread_id, None);
        }
        if let (Some(store), Some(cursor)) = (self.linkage, self.mail.sync_cursor()) {
            if let Err(e) = store.set_cursor(MAIL_PROVIDER, &cursor) {
                warn!(error = %e, "failed to store mail sync cursor");
            }
        }
        Ok(emails)
    }

    /// Create a to-do for every email MIT. Failures are logged and skipped.
    fn create_todos(&self, mits: &[Candidate], actionable: &[Email]) -> Vec<String> {
        let mut created = Vec::new();
        for thread_id in mits.iter().filter_map(Candidate::thread_id) {
            let Some(email) = actionable.iter().find(|e| e.thread_id == thread_id) else {
                continue;
            };
            let title = todo_title(email);
            if title.is_empty() {
                continue;
            }
            match self.todos.add_todo(&title) {
                Ok(block_id) => {
                    info!(thread_id, block_id = %block_id, "created to-do from email");
                    self.record(thread_id, Some(&block_id));
                    created.push(block_id);
                }
                Err(e) => warn!(thread_id, error = %e, "failed to create to-do"),
            }
        }
        created
    }

    /// Run the whole pipeline for the day containing `now`.
    ///
    /// To-do and mail failures end the run before anything is placed;
    /// generator failures fall back to deterministic rankings.
    pub fn run(&self, now: DateTime<Tz>) -> Result<PlanSummary, RunError> {
        let now = now.with_timezone(&self.tz);

        let todos = self.todos.list_unchecked().map_err(RunError::before_placement)?;
        let emails = self.fetch_mail()?;
        let actionable = ranking::filter_actionable(self.generator, &emails);

        let candidates: Vec<Candidate> = todos
            .iter()
            .map(Candidate::from_todo)
            .filter(|c| !c.text.is_empty())
            .chain(actionable.iter().map(Candidate::from_email))
            .collect();

        let mits = ranking::select_mits(self.generator, &candidates);
        let created_todos = self.create_todos(&mits, &actionable);
        let estimates = ranking::estimate_durations(self.generator, &mits);

        let tasks: Vec<TaskRequest> = estimates
            .iter()
            .filter_map(|estimate| match estimate.to_request() {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!(text = %estimate.text, error = %e, "skipping unschedulable task");
                    None
                }
            })
            .collect();

        let mut placer =
            BlockPlacer::new(self.rules.clone(), self.tz, self.busy_source, self.sink);
        if let Some(store) = self.linkage {
            placer = placer.with_linkage(store as &dyn LinkageRecorder);
        }
        let plan = placer.plan_day(&tasks, now)?;

        info!(
            day = %planning_day(now, self.tz),
            mits = mits.len(),
            placed = plan.placed.len(),
            dropped = plan.dropped.len(),
            "daily plan complete"
        );

        Ok(PlanSummary {
            day: plan.day,
            todos_unchecked: todos.len(),
            emails_fetched: emails.len(),
            emails_actionable: actionable.len(),
            mits,
            created_todos,
            estimates,
            plan,
        })
    }
}
