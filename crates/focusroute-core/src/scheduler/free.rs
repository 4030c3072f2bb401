//! Free-segment generation inside a window.
//!
//! Finds the maximal free sub-intervals of a window given an unordered,
//! possibly overlapping set of busy intervals. The sweep is lazy: callers
//! usually stop at the first segment that fits.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::interval::{BusySet, TimeInterval};

/// Lazy, ordered iterator over the free segments of a window.
///
/// Pure function of its inputs: building it again from the same window and
/// busy set yields the same sequence.
#[derive(Debug, Clone)]
pub struct FreeSegments {
    busy: Vec<TimeInterval>,
    next_busy: usize,
    cursor: DateTime<Tz>,
    window_end: DateTime<Tz>,
    finished: bool,
}

impl FreeSegments {
    pub fn new(window_start: DateTime<Tz>, window_end: DateTime<Tz>, busy: &BusySet) -> Self {
        Self {
            busy: busy.sorted(),
            next_busy: 0,
            cursor: window_start,
            window_end,
            finished: false,
        }
    }
}

impl Iterator for FreeSegments {
    type Item = TimeInterval;

    fn next(&mut self) -> Option<TimeInterval> {
        if self.finished {
            return None;
        }

        while self.next_busy < self.busy.len() {
            if self.cursor >= self.window_end {
                self.finished = true;
                return None;
            }

            let busy = self.busy[self.next_busy];
            self.next_busy += 1;

            let mut segment = None;
            if busy.start() > self.cursor {
                let end = busy.start().min(self.window_end);
                segment = TimeInterval::new(self.cursor, end).ok();
            }
            if busy.end() > self.cursor {
                self.cursor = busy.end();
            }

            if segment.is_some() {
                return segment;
            }
        }

        // Tail after the last busy interval.
        self.finished = true;
        TimeInterval::new(self.cursor, self.window_end).ok()
    }
}

/// Free segments of `[window_start, window_end)` against `busy`.
pub fn free_segments(
    window_start: DateTime<Tz>,
    window_end: DateTime<Tz>,
    busy: &BusySet,
) -> FreeSegments {
    FreeSegments::new(window_start, window_end, busy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::UTC;

    fn at(hour: u32, minute: u32) -> DateTime<Tz> {
        UTC.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    fn iv(sh: u32, sm: u32, eh: u32, em: u32) -> TimeInterval {
        TimeInterval::new(at(sh, sm), at(eh, em)).unwrap()
    }

    fn busy(intervals: &[TimeInterval]) -> BusySet {
        intervals.iter().copied().collect()
    }

    #[test]
    fn empty_busy_yields_whole_window() {
        let segments: Vec<_> = free_segments(at(8, 30), at(19, 0), &BusySet::new()).collect();
        assert_eq!(segments, vec![iv(8, 30, 19, 0)]);
    }

    #[test]
    fn splits_around_unsorted_overlapping_busy() {
        let set = busy(&[iv(13, 0, 14, 0), iv(9, 0, 10, 0), iv(9, 30, 10, 30)]);
        let segments: Vec<_> = free_segments(at(8, 30), at(19, 0), &set).collect();
        assert_eq!(
            segments,
            vec![iv(8, 30, 9, 0), iv(10, 30, 13, 0), iv(14, 0, 19, 0)]
        );
    }

    #[test]
    fn busy_outside_window_is_clipped() {
        let set = busy(&[iv(6, 0, 9, 0), iv(18, 0, 21, 0)]);
        let segments: Vec<_> = free_segments(at(8, 30), at(19, 0), &set).collect();
        assert_eq!(segments, vec![iv(9, 0, 18, 0)]);
    }

    #[test]
    fn fully_busy_window_yields_nothing() {
        let set = busy(&[iv(8, 0, 20, 0)]);
        assert_eq!(free_segments(at(8, 30), at(19, 0), &set).count(), 0);
    }

    #[test]
    fn cursor_past_window_yields_nothing() {
        let set = busy(&[iv(20, 0, 21, 0)]);
        assert_eq!(free_segments(at(19, 30), at(19, 0), &set).count(), 0);
        assert_eq!(free_segments(at(19, 30), at(19, 0), &BusySet::new()).count(), 0);
    }

    #[test]
    fn touching_busy_intervals_leave_no_gap() {
        let set = busy(&[iv(9, 0, 10, 0), iv(10, 0, 11, 0)]);
        let segments: Vec<_> = free_segments(at(9, 0), at(12, 0), &set).collect();
        assert_eq!(segments, vec![iv(11, 0, 12, 0)]);
    }

    #[test]
    fn repeated_sweeps_are_identical() {
        let set = busy(&[iv(10, 0, 11, 0), iv(15, 0, 16, 0)]);
        let first: Vec<_> = free_segments(at(8, 30), at(19, 0), &set).collect();
        let second: Vec<_> = free_segments(at(8, 30), at(19, 0), &set).collect();
        assert_eq!(first, second);
    }
}
