//! Workday rules and their materialization onto a calendar day.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::ValidationError;
use crate::interval::TimeInterval;

/// Wall-clock hour at which the morning ends for the deep-work quota.
pub const MORNING_CUTOFF_HOUR: u32 = 12;

/// Immutable scheduling rules supplied at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkdayRules {
    pub workday_start: NaiveTime,
    pub workday_end: NaiveTime,
    pub lunch_start: NaiveTime,
    pub lunch_end: NaiveTime,
    pub buffer_minutes: i64,
    pub max_blocks_per_day: u32,
    pub max_deep_work_morning: u32,
}

impl Default for WorkdayRules {
    fn default() -> Self {
        Self {
            workday_start: hm(8, 30),
            workday_end: hm(19, 0),
            lunch_start: hm(13, 0),
            lunch_end: hm(14, 0),
            buffer_minutes: 10,
            max_blocks_per_day: 5,
            max_deep_work_morning: 3,
        }
    }
}

fn hm(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

impl WorkdayRules {
    /// Check the ordering constraints between the configured times.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.workday_end <= self.workday_start {
            return Err(invalid("workday_end", "must be after workday_start"));
        }
        if self.lunch_end <= self.lunch_start {
            return Err(invalid("lunch_end", "must be after lunch_start"));
        }
        if self.buffer_minutes < 0 {
            return Err(invalid("buffer_minutes", "must be >= 0"));
        }
        Ok(())
    }

    /// Pin the rules to a concrete day in `tz`.
    pub fn for_day(&self, day: NaiveDate, tz: Tz) -> Result<Workday, ValidationError> {
        self.validate()?;
        let window = TimeInterval::new(
            local(tz, day, self.workday_start)?,
            local(tz, day, self.workday_end)?,
        )?;
        let lunch = TimeInterval::new(
            local(tz, day, self.lunch_start)?,
            local(tz, day, self.lunch_end)?,
        )?;
        let noon = local(tz, day, hm(MORNING_CUTOFF_HOUR, 0))?;
        Ok(Workday {
            day,
            window,
            lunch,
            noon,
        })
    }
}

fn invalid(field: &str, message: &str) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.to_string(),
        message: message.to_string(),
    }
}

/// Resolve a wall-clock time on `day` in `tz`, taking the earlier instant
/// when the local time is repeated.
pub fn local(tz: Tz, day: NaiveDate, time: NaiveTime) -> Result<DateTime<Tz>, ValidationError> {
    let naive = day.and_time(time);
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| ValidationError::NonexistentLocalTime {
            local: naive.to_string(),
            timezone: tz.name().to_string(),
        })
}

/// First instant of `day` in `tz`.
///
/// Where the clocks jump forward over midnight, this is the first local
/// minute that exists.
pub fn start_of_day(tz: Tz, day: NaiveDate) -> DateTime<Tz> {
    let midnight = day.and_time(NaiveTime::MIN);
    (0..=24 * 60)
        .find_map(|minute| {
            tz.from_local_datetime(&(midnight + Duration::minutes(minute)))
                .earliest()
        })
        .unwrap_or_else(|| tz.from_utc_datetime(&midnight))
}

/// One day's concrete window, lunch and noon instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Workday {
    pub day: NaiveDate,
    pub window: TimeInterval,
    pub lunch: TimeInterval,
    pub noon: DateTime<Tz>,
}

impl Workday {
    /// Whether the instant falls before the morning cutoff.
    pub fn is_morning(&self, at: DateTime<Tz>) -> bool {
        at < self.noon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn defaults_match_documented_workday() {
        let rules = WorkdayRules::default();
        assert_eq!(rules.workday_start, hm(8, 30));
        assert_eq!(rules.workday_end, hm(19, 0));
        assert_eq!(rules.buffer_minutes, 10);
        assert_eq!(rules.max_blocks_per_day, 5);
        assert_eq!(rules.max_deep_work_morning, 3);
        assert!(rules.validate().is_ok());
    }

    #[test]
    fn rejects_inverted_lunch() {
        let rules = WorkdayRules {
            lunch_start: hm(14, 0),
            lunch_end: hm(13, 0),
            ..WorkdayRules::default()
        };
        assert!(rules.validate().is_err());
    }

    #[test]
    fn materializes_in_zone() {
        let rules = WorkdayRules::default();
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let workday = rules.for_day(day, chrono_tz::America::Lima).unwrap();
        assert_eq!(workday.window.start().hour(), 8);
        assert_eq!(workday.window.start().minute(), 30);
        assert_eq!(workday.lunch.end().hour(), 14);
        assert_eq!(workday.noon.hour(), 12);
        assert!(workday.is_morning(workday.window.start()));
        assert!(!workday.is_morning(workday.lunch.start()));
    }

    #[test]
    fn nonexistent_local_time_is_reported() {
        // 2026-03-08 02:30 does not exist in New York (spring forward).
        let day = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        let err = local(chrono_tz::America::New_York, day, hm(2, 30)).unwrap_err();
        assert!(matches!(err, ValidationError::NonexistentLocalTime { .. }));
    }

    #[test]
    fn start_of_day_skips_missing_midnight() {
        // Santiago springs forward from 00:00 to 01:00 on 2026-09-06.
        let day = NaiveDate::from_ymd_opt(2026, 9, 6).unwrap();
        let start = start_of_day(chrono_tz::America::Santiago, day);
        assert_eq!(start.date_naive(), day);
        assert_eq!((start.hour(), start.minute()), (1, 0));
        assert_eq!(start.to_rfc3339(), "2026-09-06T01:00:00-03:00");

        let workday = WorkdayRules::default()
            .for_day(day, chrono_tz::America::Santiago)
            .unwrap();
        assert!(start < workday.window.start());
    }

    #[test]
    fn start_of_day_is_midnight_on_ordinary_days() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let start = start_of_day(chrono_tz::America::Lima, day);
        assert_eq!(start.to_rfc3339(), "2026-03-10T00:00:00-05:00");
    }
}
