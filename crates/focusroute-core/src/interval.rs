//! Half-open time intervals and busy sets.
//!
//! All timestamps are zoned in the user's configured timezone so that
//! wall-clock rules (workday bounds, lunch, the noon cutoff) can be
//! evaluated directly on them.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use serde::Serialize;

use crate::error::ValidationError;

/// A half-open interval `[start, end)` with `end > start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimeInterval {
    start: DateTime<Tz>,
    end: DateTime<Tz>,
}

impl TimeInterval {
    /// Create an interval, rejecting empty or inverted ranges.
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidInterval {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Interval of `minutes` starting at `start`.
    pub fn starting_at(start: DateTime<Tz>, minutes: i64) -> Result<Self, ValidationError> {
        Self::new(start, start + Duration::minutes(minutes))
    }

    pub fn start(&self) -> DateTime<Tz> {
        self.start
    }

    pub fn end(&self) -> DateTime<Tz> {
        self.end
    }

    /// Length in whole minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }

    /// Half-open overlap: touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeInterval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Whether `other` lies entirely inside this interval.
    pub fn contains(&self, other: &TimeInterval) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// Busy time for one planning run.
///
/// Starts from the calendar's busy intervals plus lunch and only ever grows
/// by appending placed blocks and their trailing buffers.
#[derive(Debug, Clone, Default)]
pub struct BusySet {
    intervals: Vec<TimeInterval>,
}

impl BusySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, interval: TimeInterval) {
        self.intervals.push(interval);
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimeInterval> {
        self.intervals.iter()
    }

    pub fn as_slice(&self) -> &[TimeInterval] {
        &self.intervals
    }

    /// Whether any busy interval overlaps `candidate`.
    pub fn conflicts_with(&self, candidate: &TimeInterval) -> bool {
        self.intervals.iter().any(|busy| busy.overlaps(candidate))
    }

    /// Intervals ordered by start (ties by end).
    pub fn sorted(&self) -> Vec<TimeInterval> {
        let mut sorted = self.intervals.clone();
        sorted.sort_by_key(|interval| (interval.start, interval.end));
        sorted
    }

    /// Union of two busy sets, leaving both untouched.
    pub fn union(&self, other: &BusySet) -> BusySet {
        let mut intervals = Vec::with_capacity(self.len() + other.len());
        intervals.extend_from_slice(&self.intervals);
        intervals.extend_from_slice(&other.intervals);
        BusySet { intervals }
    }
}

impl FromIterator<TimeInterval> for BusySet {
    fn from_iter<I: IntoIterator<Item = TimeInterval>>(iter: I) -> Self {
        Self {
            intervals: iter.into_iter().collect(),
        }
    }
}

impl Extend<TimeInterval> for BusySet {
    fn extend<I: IntoIterator<Item = TimeInterval>>(&mut self, iter: I) {
        self.intervals.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::UTC;

    fn at(hour: u32, minute: u32) -> DateTime<Tz> {
        UTC.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted() {
        assert!(TimeInterval::new(at(9, 0), at(9, 0)).is_err());
        assert!(matches!(
            TimeInterval::new(at(10, 0), at(9, 0)),
            Err(ValidationError::InvalidInterval { .. })
        ));
    }

    #[test]
    fn touching_intervals_do_not_overlap() {
        let a = TimeInterval::new(at(9, 0), at(10, 0)).unwrap();
        let b = TimeInterval::new(at(10, 0), at(11, 0)).unwrap();
        assert!(!a.overlaps(&b));
        assert!(!b.overlaps(&a));
    }

    #[test]
    fn overlap_is_symmetric() {
        let a = TimeInterval::new(at(9, 0), at(10, 30)).unwrap();
        let b = TimeInterval::new(at(10, 0), at(11, 0)).unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
    }

    #[test]
    fn duration_in_minutes() {
        let a = TimeInterval::starting_at(at(9, 0), 75).unwrap();
        assert_eq!(a.duration_minutes(), 75);
        assert_eq!(a.end(), at(10, 15));
    }

    #[test]
    fn busy_set_sorts_by_start() {
        let busy: BusySet = vec![
            TimeInterval::new(at(14, 0), at(15, 0)).unwrap(),
            TimeInterval::new(at(9, 0), at(10, 0)).unwrap(),
        ]
        .into_iter()
        .collect();
        let sorted = busy.sorted();
        assert_eq!(sorted[0].start(), at(9, 0));
        assert_eq!(sorted[1].start(), at(14, 0));
    }

    #[test]
    fn union_keeps_both_sides() {
        let a: BusySet = std::iter::once(TimeInterval::new(at(9, 0), at(10, 0)).unwrap()).collect();
        let b: BusySet = std::iter::once(TimeInterval::new(at(11, 0), at(12, 0)).unwrap()).collect();
        let merged = a.union(&b);
        assert_eq!(merged.len(), 2);
        assert!(merged.conflicts_with(&TimeInterval::new(at(11, 30), at(11, 45)).unwrap()));
        assert_eq!(a.len(), 1);
    }
}
