pub mod auth;
pub mod config;
pub mod link;
pub mod plan;
pub mod schedule;

use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use focusroute_core::scheduler::local;
use focusroute_core::{Config, DayPlan, DropReason, RunError};

/// Config from disk with environment overrides applied.
pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Planning instant: `--now` as RFC 3339 or local `YYYY-MM-DDTHH:MM`, else the clock.
pub fn parse_now(now: Option<&str>, tz: Tz) -> Result<DateTime<Tz>, Box<dyn std::error::Error>> {
    let Some(raw) = now else {
        return Ok(Utc::now().with_timezone(&tz));
    };
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&tz));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .map_err(|e| format!("invalid --now '{raw}': {e}"))?;
    Ok(local(tz, naive.date(), naive.time())?)
}

/// Blocks that stay on the calendar after a failed run.
pub fn print_placed(err: &RunError) {
    if err.placed.is_empty() {
        return;
    }
    eprintln!("blocks created before the failure:");
    for block in &err.placed {
        eprintln!(
            "   • {}: {} - {}",
            block.title,
            block.start.format("%H:%M"),
            block.end.format("%H:%M")
        );
    }
}

pub fn print_plan(plan: &DayPlan) {
    println!("Scheduled {} calendar blocks for {}:", plan.placed.len(), plan.day);
    for block in &plan.placed {
        println!(
            "   • {}: {} - {}",
            block.title,
            block.start.format("%H:%M"),
            block.end.format("%H:%M")
        );
    }
    for task in &plan.dropped {
        let reason = match task.reason {
            DropReason::NoFreeSlot => "no free slot",
            DropReason::QuotaExhausted => "block quota exhausted",
        };
        println!("   - dropped {} ({} min): {}", task.title, task.minutes, reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::America::Lima;

    #[test]
    fn parses_local_and_rfc3339_now() {
        let at = parse_now(Some("2026-03-10T08:15"), Lima).unwrap();
        assert_eq!((at.hour(), at.minute()), (8, 15));

        let at = parse_now(Some("2026-03-10T13:00:00Z"), Lima).unwrap();
        assert_eq!(at.hour(), 8);

        assert!(parse_now(Some("tomorrow"), Lima).is_err());
    }
}
