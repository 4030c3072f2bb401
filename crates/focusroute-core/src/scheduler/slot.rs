//! Lunch-aware slot finding within a single free segment.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

use crate::interval::TimeInterval;

/// Decide where a block of `duration_minutes` fits in `segment`.
///
/// The segment must leave room for the block plus `buffer_minutes`. When
/// it straddles lunch, the part before lunch is tried first and the part
/// after lunch second. Returns the slot (without its buffer) or `None` when
/// the caller should move on to the next segment.
pub fn find_slot(
    segment: &TimeInterval,
    duration_minutes: i64,
    buffer_minutes: i64,
    lunch: &TimeInterval,
) -> Option<TimeInterval> {
    let needed = duration_minutes + buffer_minutes;

    if !segment.overlaps(lunch) {
        return slot_at_start(segment.start(), segment.end(), duration_minutes, needed);
    }

    if segment.start() < lunch.start() {
        if let Some(slot) = slot_at_start(segment.start(), lunch.start(), duration_minutes, needed) {
            return Some(slot);
        }
    }

    let after_lunch = segment.start().max(lunch.end());
    slot_at_start(after_lunch, segment.end(), duration_minutes, needed)
}

fn slot_at_start(
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    duration_minutes: i64,
    needed_minutes: i64,
) -> Option<TimeInterval> {
    if end - start < Duration::minutes(needed_minutes) {
        return None;
    }
    TimeInterval::starting_at(start, duration_minutes).ok()
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

    fn lunch() -> TimeInterval {
        iv(13, 0, 14, 0)
    }

    #[test]
    fn fits_at_segment_start_away_from_lunch() {
        let slot = find_slot(&iv(9, 0, 11, 0), 60, 10, &lunch()).unwrap();
        assert_eq!(slot, iv(9, 0, 10, 0));
    }

    #[test]
    fn requires_room_for_buffer() {
        // 60 minutes free, 60 minute task + 10 buffer does not fit.
        assert!(find_slot(&iv(9, 0, 10, 0), 60, 10, &lunch()).is_none());
        assert!(find_slot(&iv(9, 0, 10, 10), 60, 10, &lunch()).is_some());
    }

    #[test]
    fn prefers_before_lunch_when_it_fits() {
        let slot = find_slot(&iv(11, 0, 16, 0), 60, 10, &lunch()).unwrap();
        assert_eq!(slot, iv(11, 0, 12, 0));
    }

    #[test]
    fn falls_after_lunch_when_morning_part_is_short() {
        // 12:10-13:00 is 50 minutes; 90 + 10 needed.
        let slot = find_slot(&iv(12, 10, 19, 0), 90, 10, &lunch()).unwrap();
        assert_eq!(slot, iv(14, 0, 15, 30));
    }

    #[test]
    fn segment_starting_inside_lunch_uses_lunch_end() {
        let slot = find_slot(&iv(13, 30, 16, 0), 45, 10, &lunch()).unwrap();
        assert_eq!(slot, iv(14, 0, 14, 45));
    }

    #[test]
    fn rejects_when_neither_side_fits() {
        assert!(find_slot(&iv(12, 30, 14, 30), 45, 10, &lunch()).is_none());
    }

    #[test]
    fn segment_ending_inside_lunch_only_has_morning_side() {
        assert!(find_slot(&iv(12, 0, 13, 30), 60, 10, &lunch()).is_none());
        let slot = find_slot(&iv(11, 0, 13, 30), 60, 10, &lunch()).unwrap();
        assert_eq!(slot, iv(11, 0, 12, 0));
    }
}
