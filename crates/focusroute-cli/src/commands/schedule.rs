use clap::Args;
use focusroute_core::integrations::{GoogleClient, MockCalendar};
use focusroute_core::{BlockPlacer, DayPlan, LinkageStore, RunError, TaskRequest};

use super::{load_config, parse_now, print_placed, print_plan};

const DEFAULT_MINUTES: i64 = 60;

#[derive(Args)]
pub struct ScheduleArgs {
    /// Task as "Title=minutes" (minutes default to 60); repeat in priority order
    #[arg(long = "task", required = true)]
    pub tasks: Vec<String>,
    /// Place on an empty in-memory calendar instead of Google Calendar
    #[arg(long)]
    pub offline: bool,
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
    /// Planning time: RFC 3339 or local YYYY-MM-DDTHH:MM
    #[arg(long)]
    pub now: Option<String>,
}

/// Parse `Title=minutes`. The last `=` separates the minutes.
pub fn parse_task(raw: &str) -> Result<TaskRequest, Box<dyn std::error::Error>> {
    let (title, minutes) = match raw.rsplit_once('=') {
        Some((title, minutes)) => {
            let minutes = minutes
                .trim()
                .parse::<i64>()
                .map_err(|e| format!("invalid minutes in '{raw}': {e}"))?;
            (title, minutes)
        }
        None => (raw, DEFAULT_MINUTES),
    };
    Ok(TaskRequest::new(title, minutes)?)
}

fn report(result: Result<DayPlan, RunError>, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    match result {
        Ok(plan) if json => println!("{}", serde_json::to_string_pretty(&plan)?),
        Ok(plan) => print_plan(&plan),
        Err(err) => {
            print_placed(&err);
            return Err(err.into());
        }
    }
    Ok(())
}

pub fn run(args: ScheduleArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    let tz = config.tz()?;
    let rules = config.workday_rules()?;
    let now = parse_now(args.now.as_deref(), tz)?;

    let tasks = args
        .tasks
        .iter()
        .map(|raw| parse_task(raw))
        .collect::<Result<Vec<_>, _>>()?;

    if args.offline {
        let calendar = MockCalendar::new();
        let result = BlockPlacer::new(rules, tz, &calendar, &calendar).plan_day(&tasks, now);
        return report(result, args.json);
    }

    let google = GoogleClient::new(&config.google, tz)?;
    let store = LinkageStore::open()?;
    let result = BlockPlacer::new(rules, tz, &google, &google)
        .with_linkage(&store)
        .plan_day(&tasks, now);
    report(result, args.json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_title_and_minutes() {
        let task = parse_task("Write report=45").unwrap();
        assert_eq!(task.title(), "Write report");
        assert_eq!(task.minutes(), 45);
    }

    #[test]
    fn last_equals_sign_splits() {
        let task = parse_task("a=b=30").unwrap();
        assert_eq!(task.title(), "a=b");
        assert_eq!(task.minutes(), 30);
    }

    #[test]
    fn minutes_default_and_clamp() {
        assert_eq!(parse_task("Plan week").unwrap().minutes(), 60);
        assert_eq!(parse_task("Quick=2").unwrap().minutes(), 10);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_task("Report=soon").is_err());
        assert!(parse_task("  =30").is_err());
    }
}
