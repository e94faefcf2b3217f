//! Daily time-of-day schedule with a fixed UTC offset.

use chrono::{DateTime, Duration, FixedOffset, Utc};

/// A once-a-day firing time, e.g. 22:00 at UTC-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    hour: u32,
    minute: u32,
    offset: FixedOffset,
}

impl DailySchedule {
    /// Creates a schedule firing daily at `hour:minute` in the timezone
    /// `utc_offset_hours` hours east of UTC. Returns `None` for an invalid
    /// time or offset.
    pub fn new(hour: u32, minute: u32, utc_offset_hours: i32) -> Option<Self> {
        if hour >= 24 || minute >= 60 {
            return None;
        }
        let offset = FixedOffset::east_opt(utc_offset_hours.checked_mul(3600)?)?;
        Some(Self {
            hour,
            minute,
            offset,
        })
    }

    /// The next firing instant strictly after `after`.
    pub fn next_occurrence(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let local = after.with_timezone(&self.offset);
        let today = local
            .date_naive()
            .and_hms_opt(self.hour, self.minute, 0)
            .and_then(|naive| naive.and_local_timezone(self.offset).single());

        // Fixed offsets have no gaps or folds, so the conversion is always
        // single-valued; the fallback is unreachable in practice.
        let mut candidate = today.unwrap_or_else(|| local + Duration::days(1));
        if candidate <= local {
            candidate += Duration::days(1);
        }
        candidate.with_timezone(&Utc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn fires_later_today_when_time_not_yet_reached() {
        let schedule = DailySchedule::new(22, 0, 0).unwrap();
        let next = schedule.next_occurrence(utc(2025, 6, 1, 10, 0));
        assert_eq!(next, utc(2025, 6, 1, 22, 0));
    }

    #[test]
    fn fires_tomorrow_when_time_already_passed() {
        let schedule = DailySchedule::new(22, 0, 0).unwrap();
        let next = schedule.next_occurrence(utc(2025, 6, 1, 23, 30));
        assert_eq!(next, utc(2025, 6, 2, 22, 0));
    }

    #[test]
    fn exact_firing_time_rolls_to_next_day() {
        let schedule = DailySchedule::new(22, 0, 0).unwrap();
        let next = schedule.next_occurrence(utc(2025, 6, 1, 22, 0));
        assert_eq!(next, utc(2025, 6, 2, 22, 0));
    }

    #[test]
    fn offset_shifts_the_utc_firing_time() {
        // 22:00 at UTC-5 is 03:00 UTC the next calendar day.
        let schedule = DailySchedule::new(22, 0, -5).unwrap();
        let next = schedule.next_occurrence(utc(2025, 6, 1, 10, 0));
        assert_eq!(next, utc(2025, 6, 2, 3, 0));
    }

    #[test]
    fn successive_occurrences_are_a_day_apart() {
        let schedule = DailySchedule::new(6, 30, 2).unwrap();
        let first = schedule.next_occurrence(utc(2025, 6, 1, 0, 0));
        let second = schedule.next_occurrence(first);
        assert_eq!(second - first, Duration::days(1));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        assert!(DailySchedule::new(24, 0, 0).is_none());
        assert!(DailySchedule::new(0, 60, 0).is_none());
        assert!(DailySchedule::new(0, 0, 25).is_none());
        assert!(DailySchedule::new(0, 0, -25).is_none());
    }
}
