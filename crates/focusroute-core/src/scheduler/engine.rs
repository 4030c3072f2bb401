//! Ordered greedy block placement.
//!
//! Placement is split in two:
//! - [`DayLayout::propose`] is a pure decision for one task given the
//!   current [`PlacementState`]
//! - [`BlockPlacer`] drives the loop, creates calendar events for accepted
//!   proposals and commits them into the state
//!
//! Tasks are placed strictly in input order. A task that does not fit is
//! dropped and the next one is tried from the same cursor.

use chrono::{DateTime, Duration, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::free::free_segments;
use super::slot::find_slot;
use super::workday::{Workday, WorkdayRules};
use super::{
    BlockKind, DayPlan, DropReason, DroppedTask, PlacedBlock, TaskRequest, BLOCK_DESCRIPTION,
    TRIAGE_DESCRIPTION, TRIAGE_MINUTES, TRIAGE_TITLE,
};
use crate::error::RunError;
use crate::integrations::traits::{BusySource, EventSink, NewEvent};
use crate::interval::{BusySet, TimeInterval};
use crate::storage::LinkageRecorder;

/// Remaining capacity for the current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleQuotas {
    pub blocks_remaining: u32,
    pub morning_deep_work_remaining: u32,
}

impl ScheduleQuotas {
    pub fn from_rules(rules: &WorkdayRules) -> Self {
        Self {
            blocks_remaining: rules.max_blocks_per_day,
            morning_deep_work_remaining: rules.max_deep_work_morning,
        }
    }
}

/// Mutable state threaded through one planning run.
#[derive(Debug, Clone)]
pub struct PlacementState {
    cursor: DateTime<Tz>,
    quotas: ScheduleQuotas,
    created_busy: BusySet,
}

impl PlacementState {
    /// Fresh state with the cursor at `max(now, workday start)`.
    pub fn new(workday: &Workday, rules: &WorkdayRules, now: DateTime<Tz>) -> Self {
        Self {
            cursor: now.max(workday.window.start()),
            quotas: ScheduleQuotas::from_rules(rules),
            created_busy: BusySet::new(),
        }
    }

    pub fn cursor(&self) -> DateTime<Tz> {
        self.cursor
    }

    pub fn quotas(&self) -> ScheduleQuotas {
        self.quotas
    }

    /// Blocks placed so far in this run, each followed by its buffer.
    pub fn created_busy(&self) -> &BusySet {
        &self.created_busy
    }

    /// Commit a proposal.
    ///
    /// Any step moves the cursor to where the proposal left it. An accepted
    /// placement also books the slot and its trailing buffer, spends quota
    /// and moves the cursor past the buffer.
    pub fn apply(&mut self, step: &Step, buffer_minutes: i64) {
        self.cursor = step.cursor;

        let Outcome::Place {
            slot,
            morning_deep_work,
        } = step.outcome
        else {
            return;
        };

        self.created_busy.push(slot);
        if let Ok(buffer) = TimeInterval::starting_at(slot.end(), buffer_minutes) {
            self.created_busy.push(buffer);
        }

        self.quotas.blocks_remaining = self.quotas.blocks_remaining.saturating_sub(1);
        if morning_deep_work {
            self.quotas.morning_deep_work_remaining =
                self.quotas.morning_deep_work_remaining.saturating_sub(1);
        }
        self.cursor = slot.end() + Duration::minutes(buffer_minutes);
    }
}

/// Decision for a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Place the task at `slot`.
    Place {
        slot: TimeInterval,
        /// Deep work starting before the morning cutoff.
        morning_deep_work: bool,
    },
    NoFreeSlot,
    QuotaExhausted,
}

/// A proposal: where the cursor stands after evaluating the task and what
/// to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub cursor: DateTime<Tz>,
    pub outcome: Outcome,
}

/// The fixed inputs of a day: its window, lunch, and busy time that does not
/// change during the run (calendar busy plus lunch).
#[derive(Debug, Clone)]
pub struct DayLayout {
    workday: Workday,
    fixed_busy: BusySet,
    buffer_minutes: i64,
}

impl DayLayout {
    pub fn new(workday: Workday, calendar_busy: Vec<TimeInterval>, buffer_minutes: i64) -> Self {
        let mut fixed_busy: BusySet = calendar_busy.into_iter().collect();
        fixed_busy.push(workday.lunch);
        Self {
            workday,
            fixed_busy,
            buffer_minutes,
        }
    }

    pub fn workday(&self) -> &Workday {
        &self.workday
    }

    pub fn fixed_busy(&self) -> &BusySet {
        &self.fixed_busy
    }

    /// Decide what to do with `task` without touching `state`.
    pub fn propose(&self, state: &PlacementState, task: &TaskRequest) -> Step {
        let deep = task.is_deep_work();
        let mut cursor = state.cursor;

        // Morning deep-work quota spent: deep work waits until noon.
        if deep
            && self.workday.is_morning(cursor)
            && state.quotas.morning_deep_work_remaining == 0
        {
            cursor = self.workday.noon;
        }

        if state.quotas.blocks_remaining == 0 {
            return Step {
                cursor,
                outcome: Outcome::QuotaExhausted,
            };
        }

        let busy = self.fixed_busy.union(&state.created_busy);
        let slot = free_segments(cursor, self.workday.window.end(), &busy).find_map(|segment| {
            debug!(
                start = %segment.start(),
                end = %segment.end(),
                minutes = task.minutes(),
                "trying free segment"
            );
            find_slot(
                &segment,
                task.minutes(),
                self.buffer_minutes,
                &self.workday.lunch,
            )
        });

        let outcome = match slot {
            Some(slot) => Outcome::Place {
                slot,
                morning_deep_work: deep && self.workday.is_morning(slot.start()),
            },
            None => Outcome::NoFreeSlot,
        };
        Step { cursor, outcome }
    }

    /// First 30-minute slot from the cursor, used when nothing was placed.
    ///
    /// Unlike task placement, no trailing buffer is required.
    pub fn triage_slot(&self, state: &PlacementState) -> Option<TimeInterval> {
        if state.quotas.blocks_remaining == 0 {
            return None;
        }
        let busy = self.fixed_busy.union(&state.created_busy);
        free_segments(state.cursor, self.workday.window.end(), &busy)
            .find(|segment| segment.duration_minutes() >= TRIAGE_MINUTES)
            .and_then(|segment| TimeInterval::starting_at(segment.start(), TRIAGE_MINUTES).ok())
    }
}

/// Places tasks on one day and creates a calendar event per block.
pub struct BlockPlacer<'a> {
    rules: WorkdayRules,
    tz: Tz,
    busy_source: &'a dyn BusySource,
    sink: &'a dyn EventSink,
    linkage: Option<&'a dyn LinkageRecorder>,
}

impl<'a> BlockPlacer<'a> {
    pub fn new(
        rules: WorkdayRules,
        tz: Tz,
        busy_source: &'a dyn BusySource,
        sink: &'a dyn EventSink,
    ) -> Self {
        Self {
            rules,
            tz,
            busy_source,
            sink,
            linkage: None,
        }
    }

    /// Record `origin -> event` for placed tasks that carry an origin id.
    pub fn with_linkage(mut self, linkage: &'a dyn LinkageRecorder) -> Self {
        self.linkage = Some(linkage);
        self
    }

    pub fn rules(&self) -> &WorkdayRules {
        &self.rules
    }

    /// Plan the day containing `now` (in the configured timezone).
    ///
    /// Returns the placed and dropped tasks. When the busy source or the
    /// event sink fails, the run stops and the error carries every block
    /// created up to that point; those events are not rolled back.
    pub fn plan_day(&self, tasks: &[TaskRequest], now: DateTime<Tz>) -> Result<DayPlan, RunError> {
        let day = planning_day(now, self.tz);
        let now = now.with_timezone(&self.tz);
        let workday = self
            .rules
            .for_day(day, self.tz)
            .map_err(RunError::before_placement)?;
        let calendar_busy = self
            .busy_source
            .get_busy(day)
            .map_err(RunError::before_placement)?;

        let layout = DayLayout::new(workday, calendar_busy, self.rules.buffer_minutes);
        let mut state = PlacementState::new(&workday, &self.rules, now);
        let mut plan = DayPlan::new(day);

        for (index, task) in tasks.iter().enumerate() {
            let step = layout.propose(&state, task);
            match step.outcome {
                Outcome::QuotaExhausted => {
                    info!(
                        remaining = tasks.len() - index,
                        "daily block quota reached, dropping remaining tasks"
                    );
                    plan.dropped.extend(
                        tasks[index..]
                            .iter()
                            .map(|task| DroppedTask::new(task, DropReason::QuotaExhausted)),
                    );
                    break;
                }
                Outcome::NoFreeSlot => {
                    info!(title = task.title(), minutes = task.minutes(), "no free slot");
                    plan.dropped
                        .push(DroppedTask::new(task, DropReason::NoFreeSlot));
                    state.apply(&step, self.rules.buffer_minutes);
                }
                Outcome::Place { slot, .. } => {
                    let block = match self.create_block(
                        task.title(),
                        BLOCK_DESCRIPTION,
                        slot,
                        task.origin_id(),
                        BlockKind::Task,
                    ) {
                        Ok(block) => block,
                        Err(source) => {
                            return Err(RunError {
                                placed: plan.placed,
                                source,
                            })
                        }
                    };
                    state.apply(&step, self.rules.buffer_minutes);
                    plan.placed.push(block);
                }
            }
        }

        if plan.placed.is_empty() {
            if let Some(slot) = layout.triage_slot(&state) {
                let block = self
                    .create_block(TRIAGE_TITLE, TRIAGE_DESCRIPTION, slot, None, BlockKind::Triage)
                    .map_err(RunError::before_placement)?;
                plan.placed.push(block);
                plan.triaged = true;
            }
        }

        Ok(plan)
    }

    fn create_block(
        &self,
        title: &str,
        description: &str,
        slot: TimeInterval,
        origin_id: Option<&str>,
        kind: BlockKind,
    ) -> crate::error::Result<PlacedBlock> {
        let event = NewEvent {
            title: title.to_string(),
            start: slot.start(),
            end: slot.end(),
            description: description.to_string(),
        };
        let event_id = self.sink.create_event(&event)?;
        info!(
            title,
            start = %slot.start(),
            end = %slot.end(),
            event_id = %event_id,
            "block placed"
        );

        if let (Some(origin), Some(linkage)) = (origin_id, self.linkage) {
            if let Err(e) = linkage.upsert_mapping(origin, None, Some(&event_id)) {
                warn!(origin, error = %e, "failed to record event linkage");
            }
        }

        Ok(PlacedBlock {
            title: event.title,
            start: event.start,
            end: event.end,
            external_event_id: event_id,
            origin_id: origin_id.map(str::to_string),
            kind,
        })
    }
}

/// Day that `now` falls on in `tz`.
pub fn planning_day(now: DateTime<Tz>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DatabaseError;
    use crate::integrations::mock::MockCalendar;
    use crate::storage::LinkageStore;
    use chrono::{TimeZone, Timelike};
    use chrono_tz::UTC;

    fn at(hour: u32, minute: u32) -> DateTime<Tz> {
        UTC.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    fn iv(sh: u32, sm: u32, eh: u32, em: u32) -> TimeInterval {
        TimeInterval::new(at(sh, sm), at(eh, em)).unwrap()
    }

    fn task(title: &str, minutes: i64) -> TaskRequest {
        TaskRequest::new(title, minutes).unwrap()
    }

    fn plan(calendar: &MockCalendar, tasks: &[TaskRequest], now: DateTime<Tz>) -> DayPlan {
        BlockPlacer::new(WorkdayRules::default(), UTC, calendar, calendar)
            .plan_day(tasks, now)
            .unwrap()
    }

    fn spans(plan: &DayPlan) -> Vec<TimeInterval> {
        plan.placed.iter().filter_map(PlacedBlock::interval).collect()
    }

    struct BrokenLinkage;

    impl LinkageRecorder for BrokenLinkage {
        fn upsert_mapping(
            &self,
            _origin_id: &str,
            _notion_block_id: Option<&str>,
            _calendar_event_id: Option<&str>,
        ) -> Result<(), DatabaseError> {
            Err(DatabaseError::Locked)
        }
    }

    #[test]
    fn single_task_starts_at_now() {
        let calendar = MockCalendar::new();
        let plan = plan(&calendar, &[task("Draft contract", 60)], at(9, 0));

        assert_eq!(spans(&plan), vec![iv(9, 0, 10, 0)]);
        assert_eq!(plan.placed[0].kind, BlockKind::Task);
        assert!(!plan.triaged);
        assert_eq!(calendar.created().len(), 1);
        assert_eq!(calendar.created()[0].description, BLOCK_DESCRIPTION);
    }

    #[test]
    fn short_morning_remainder_falls_after_lunch() {
        let calendar = MockCalendar::new();
        let plan = plan(&calendar, &[task("Review", 90)], at(12, 10));
        assert_eq!(spans(&plan), vec![iv(14, 0, 15, 30)]);
    }

    #[test]
    fn block_quota_caps_placements() {
        let calendar = MockCalendar::new();
        let tasks: Vec<_> = (1..=6).map(|i| task(&format!("Task {i}"), 60)).collect();
        let plan = plan(&calendar, &tasks, at(8, 30));

        assert_eq!(plan.placed.len(), 5);
        assert_eq!(plan.dropped.len(), 1);
        assert_eq!(plan.dropped[0].title, "Task 6");
        assert_eq!(plan.dropped[0].reason, DropReason::QuotaExhausted);
        assert_eq!(calendar.created().len(), 5);
    }

    #[test]
    fn morning_deep_work_quota_pushes_fourth_block_to_noon() {
        let calendar = MockCalendar::new();
        let tasks: Vec<_> = (1..=4).map(|i| task(&format!("Deep {i}"), 45)).collect();
        let plan = plan(&calendar, &tasks, at(8, 30));

        assert_eq!(
            spans(&plan),
            vec![
                iv(8, 30, 9, 15),
                iv(9, 25, 10, 10),
                iv(10, 20, 11, 5),
                iv(12, 0, 12, 45),
            ]
        );
        let morning = plan.placed.iter().filter(|b| b.start.hour() < 12).count();
        assert_eq!(morning, 3);
    }

    #[test]
    fn morning_deep_work_quota_with_exhausted_blocks_drops() {
        let calendar = MockCalendar::new();
        let rules = WorkdayRules {
            max_blocks_per_day: 3,
            ..WorkdayRules::default()
        };
        let tasks: Vec<_> = (1..=4).map(|i| task(&format!("Deep {i}"), 45)).collect();
        let plan = BlockPlacer::new(rules, UTC, &calendar, &calendar)
            .plan_day(&tasks, at(8, 30))
            .unwrap();

        assert_eq!(plan.placed.len(), 3);
        assert_eq!(plan.dropped.len(), 1);
        assert_eq!(plan.dropped[0].reason, DropReason::QuotaExhausted);
    }

    #[test]
    fn short_tasks_ignore_morning_quota() {
        let calendar = MockCalendar::new();
        let rules = WorkdayRules {
            max_deep_work_morning: 0,
            ..WorkdayRules::default()
        };
        let plan = BlockPlacer::new(rules, UTC, &calendar, &calendar)
            .plan_day(&[task("Reply", 30), task("Deep", 60)], at(9, 0))
            .unwrap();

        // 12:00-13:00 cannot hold 60 minutes plus buffer.
        assert_eq!(spans(&plan), vec![iv(9, 0, 9, 30), iv(14, 0, 15, 0)]);
    }

    #[test]
    fn no_tasks_yields_triage_block() {
        let calendar = MockCalendar::new();
        let plan = plan(&calendar, &[], at(9, 0));

        assert!(plan.triaged);
        assert_eq!(spans(&plan), vec![iv(9, 0, 9, 30)]);
        assert_eq!(plan.placed[0].title, TRIAGE_TITLE);
        assert_eq!(plan.placed[0].kind, BlockKind::Triage);
        assert_eq!(calendar.created()[0].description, TRIAGE_DESCRIPTION);
    }

    #[test]
    fn no_tasks_and_no_free_time_is_empty() {
        let calendar = MockCalendar::with_busy(vec![iv(8, 0, 20, 0)]);
        let plan = plan(&calendar, &[], at(9, 0));

        assert!(plan.is_empty());
        assert!(!plan.triaged);
        assert!(calendar.created().is_empty());
    }

    #[test]
    fn unplaceable_tasks_fall_back_to_triage() {
        // Only 12:00-12:40 and 18:20-19:00 are free.
        let calendar =
            MockCalendar::with_busy(vec![iv(8, 30, 12, 0), iv(12, 40, 13, 0), iv(14, 0, 18, 20)]);
        let plan = plan(&calendar, &[task("Long", 120)], at(8, 30));

        assert_eq!(plan.dropped.len(), 1);
        assert_eq!(plan.dropped[0].reason, DropReason::NoFreeSlot);
        assert!(plan.triaged);
        assert_eq!(spans(&plan), vec![iv(12, 0, 12, 30)]);
    }

    #[test]
    fn triage_skipped_when_block_quota_is_zero() {
        let calendar = MockCalendar::new();
        let rules = WorkdayRules {
            max_blocks_per_day: 0,
            ..WorkdayRules::default()
        };
        let plan = BlockPlacer::new(rules, UTC, &calendar, &calendar)
            .plan_day(&[task("Anything", 30)], at(9, 0))
            .unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.dropped[0].reason, DropReason::QuotaExhausted);
    }

    #[test]
    fn dropped_task_leaves_cursor_for_later_tasks() {
        // Only 09:00-10:00 is free.
        let calendar =
            MockCalendar::with_busy(vec![iv(8, 30, 9, 0), iv(10, 0, 13, 0), iv(14, 0, 19, 0)]);
        let plan = plan(&calendar, &[task("Big", 120), task("Small", 30)], at(8, 30));

        assert_eq!(plan.dropped.len(), 1);
        assert_eq!(plan.dropped[0].title, "Big");
        assert_eq!(plan.dropped[0].reason, DropReason::NoFreeSlot);
        assert_eq!(spans(&plan), vec![iv(9, 0, 9, 30)]);
    }

    #[test]
    fn cursor_never_moves_backwards() {
        let calendar = MockCalendar::with_busy(vec![iv(8, 30, 9, 0), iv(10, 0, 13, 0)]);
        let plan = plan(&calendar, &[task("Big", 120), task("Small", 30)], at(8, 30));

        assert!(plan.dropped.is_empty());
        assert_eq!(spans(&plan), vec![iv(14, 0, 16, 0), iv(16, 10, 16, 40)]);
    }

    #[test]
    fn blocks_avoid_calendar_busy_and_keep_buffers() {
        let calendar = MockCalendar::with_busy(vec![iv(9, 30, 10, 0)]);
        let plan = plan(
            &calendar,
            &[task("A", 20), task("B", 20), task("C", 20)],
            at(9, 0),
        );

        assert_eq!(
            spans(&plan),
            vec![iv(9, 0, 9, 20), iv(10, 0, 10, 20), iv(10, 30, 10, 50)]
        );
    }

    #[test]
    fn now_after_workday_places_nothing() {
        let calendar = MockCalendar::new();
        let plan = plan(&calendar, &[task("Late", 30)], at(19, 30));

        assert!(plan.is_empty());
        assert_eq!(plan.dropped[0].reason, DropReason::NoFreeSlot);
        assert!(!plan.triaged);
    }

    #[test]
    fn busy_source_failure_aborts_before_placement() {
        let calendar = MockCalendar::new().failing_busy();
        let err = BlockPlacer::new(WorkdayRules::default(), UTC, &calendar, &calendar)
            .plan_day(&[task("A", 30)], at(9, 0))
            .unwrap_err();

        assert!(err.placed.is_empty());
        assert!(calendar.created().is_empty());
    }

    #[test]
    fn sink_failure_reports_partial_plan() {
        let calendar = MockCalendar::new().fail_create_after(2);
        let tasks = [task("A", 30), task("B", 30), task("C", 30)];
        let err = BlockPlacer::new(WorkdayRules::default(), UTC, &calendar, &calendar)
            .plan_day(&tasks, at(9, 0))
            .unwrap_err();

        assert_eq!(err.placed.len(), 2);
        assert_eq!(err.placed[1].title, "B");
        assert_eq!(calendar.created().len(), 2);
    }

    #[test]
    fn placed_tasks_record_event_linkage() {
        let calendar = MockCalendar::new();
        let store = LinkageStore::open_memory().unwrap();
        let tasks = [
            task("Reply to supplier", 20).with_origin("thread-1"),
            task("Own task", 20),
        ];
        let plan = BlockPlacer::new(WorkdayRules::default(), UTC, &calendar, &calendar)
            .with_linkage(&store)
            .plan_day(&tasks, at(9, 0))
            .unwrap();

        let mapping = store.get_mapping("thread-1").unwrap().unwrap();
        assert_eq!(
            mapping.calendar_event_id.as_deref(),
            Some(plan.placed[0].external_event_id.as_str())
        );
        assert_eq!(store.list_mappings().unwrap().len(), 1);
    }

    #[test]
    fn linkage_failure_does_not_abort_run() {
        let calendar = MockCalendar::new();
        let tasks = [task("A", 20).with_origin("t1"), task("B", 20).with_origin("t2")];
        let plan = BlockPlacer::new(WorkdayRules::default(), UTC, &calendar, &calendar)
            .with_linkage(&BrokenLinkage)
            .plan_day(&tasks, at(9, 0))
            .unwrap();

        assert_eq!(plan.placed.len(), 2);
    }

    #[test]
    fn propose_is_pure() {
        let rules = WorkdayRules::default();
        let workday = rules.for_day(at(9, 0).date_naive(), UTC).unwrap();
        let layout = DayLayout::new(workday, vec![], rules.buffer_minutes);
        let state = PlacementState::new(&workday, &rules, at(9, 0));

        let first = layout.propose(&state, &task("A", 60));
        let second = layout.propose(&state, &task("A", 60));
        assert_eq!(first, second);
        assert_eq!(state.cursor(), at(9, 0));
        assert!(state.created_busy().is_empty());
    }

    #[test]
    fn apply_books_slot_and_buffer() {
        let rules = WorkdayRules::default();
        let workday = rules.for_day(at(9, 0).date_naive(), UTC).unwrap();
        let layout = DayLayout::new(workday, vec![], rules.buffer_minutes);
        let mut state = PlacementState::new(&workday, &rules, at(9, 0));

        let step = layout.propose(&state, &task("A", 60));
        state.apply(&step, rules.buffer_minutes);

        assert_eq!(state.cursor(), at(10, 10));
        assert_eq!(
            state.created_busy().as_slice(),
            &[iv(9, 0, 10, 0), iv(10, 0, 10, 10)]
        );
        assert_eq!(state.quotas().blocks_remaining, 4);
        assert_eq!(state.quotas().morning_deep_work_remaining, 2);
    }

    #[test]
    fn zero_buffer_books_only_slot() {
        let rules = WorkdayRules {
            buffer_minutes: 0,
            ..WorkdayRules::default()
        };
        let workday = rules.for_day(at(9, 0).date_naive(), UTC).unwrap();
        let layout = DayLayout::new(workday, vec![], 0);
        let mut state = PlacementState::new(&workday, &rules, at(9, 0));

        let step = layout.propose(&state, &task("A", 30));
        state.apply(&step, 0);

        assert_eq!(state.created_busy().len(), 1);
        assert_eq!(state.cursor(), at(9, 30));
    }

    #[test]
    fn planning_day_uses_zone() {
        let utc_evening = UTC.with_ymd_and_hms(2026, 3, 11, 2, 0, 0).unwrap();
        let lima_day = planning_day(utc_evening, chrono_tz::America::Lima);
        assert_eq!(lima_day, NaiveDate::from_ymd_opt(2026, 3, 10).unwrap());
    }
}
