//! Reference planning scenarios, run in a real timezone through the public API.

use chrono::{DateTime, TimeZone, Timelike};
use chrono_tz::America::Lima;
use chrono_tz::Tz;

use focusroute_core::integrations::MockCalendar;
use focusroute_core::scheduler::{BlockKind, DropReason, TRIAGE_TITLE};
use focusroute_core::{BlockPlacer, DayPlan, TaskRequest, TimeInterval, WorkdayRules};

fn at(hour: u32, minute: u32) -> DateTime<Tz> {
    Lima.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
}

fn tasks(specs: &[(&str, i64)]) -> Vec<TaskRequest> {
    specs
        .iter()
        .map(|(title, minutes)| TaskRequest::new(title, *minutes).unwrap())
        .collect()
}

fn plan(calendar: &MockCalendar, tasks: &[TaskRequest], now: DateTime<Tz>) -> DayPlan {
    BlockPlacer::new(WorkdayRules::default(), Lima, calendar, calendar)
        .plan_day(tasks, now)
        .unwrap()
}

fn times(plan: &DayPlan) -> Vec<(String, String)> {
    plan.placed
        .iter()
        .map(|b| (b.start.format("%H:%M").to_string(), b.end.format("%H:%M").to_string()))
        .collect()
}

fn hm(start: &str, end: &str) -> (String, String) {
    (start.to_string(), end.to_string())
}

#[test]
fn scenario_a_single_task_at_now() {
    let calendar = MockCalendar::new();
    let plan = plan(&calendar, &tasks(&[("Draft contract", 60)]), at(9, 0));
    assert_eq!(times(&plan), vec![hm("09:00", "10:00")]);
    assert_eq!(calendar.created()[0].title, "Draft contract");
}

#[test]
fn scenario_b_remainder_before_lunch_too_short() {
    let calendar = MockCalendar::new();
    let plan = plan(&calendar, &tasks(&[("Review", 90)]), at(12, 10));
    assert_eq!(times(&plan), vec![hm("14:00", "15:30")]);
}

#[test]
fn scenario_c_sixth_task_exceeds_block_quota() {
    let calendar = MockCalendar::new();
    let six: Vec<_> = (1..=6).map(|i| (format!("Task {i}"), 60)).collect();
    let specs: Vec<_> = six.iter().map(|(t, m)| (t.as_str(), *m)).collect();
    let plan = plan(&calendar, &tasks(&specs), at(8, 30));

    assert_eq!(plan.placed.len(), 5);
    assert_eq!(calendar.created().len(), 5);
    assert_eq!(plan.dropped.len(), 1);
    assert_eq!(plan.dropped[0].reason, DropReason::QuotaExhausted);
}

#[test]
fn scenario_d_morning_deep_work_is_capped() {
    let calendar = MockCalendar::new();
    let specs = [("Deep 1", 45), ("Deep 2", 45), ("Deep 3", 45), ("Deep 4", 45)];
    let plan = plan(&calendar, &tasks(&specs), at(8, 30));

    let before_noon = plan.placed.iter().filter(|b| b.start.hour() < 12).count();
    assert_eq!(before_noon, 3);
    assert_eq!(plan.placed.len(), 4);
    assert!(plan.placed[3].start >= at(12, 0));
}

#[test]
fn scenario_e_triage_when_no_tasks() {
    let calendar = MockCalendar::new();
    let plan = plan(&calendar, &[], at(10, 0));

    assert!(plan.triaged);
    assert_eq!(plan.placed.len(), 1);
    assert_eq!(plan.placed[0].kind, BlockKind::Triage);
    assert_eq!(plan.placed[0].title, TRIAGE_TITLE);
    assert_eq!(times(&plan), vec![hm("10:00", "10:30")]);
}

#[test]
fn scenario_e_no_free_time_is_empty_not_error() {
    let calendar = MockCalendar::with_busy(vec![TimeInterval::new(at(8, 0), at(19, 30)).unwrap()]);
    let plan = plan(&calendar, &[], at(8, 30));

    assert!(plan.placed.is_empty());
    assert!(!plan.triaged);
    assert!(calendar.created().is_empty());
}

#[test]
fn busy_calendar_pushes_blocks_past_events() {
    let calendar = MockCalendar::with_busy(vec![
        TimeInterval::new(at(8, 30), at(9, 30)).unwrap(),
        TimeInterval::new(at(10, 0), at(11, 0)).unwrap(),
    ]);
    let plan = plan(&calendar, &tasks(&[("Write", 60), ("Call", 20)]), at(8, 30));

    // 09:30-10:00 cannot hold 60 + 10 minutes; the cursor never moves back for the call.
    assert_eq!(times(&plan), vec![hm("11:00", "12:00"), hm("12:10", "12:30")]);
}
