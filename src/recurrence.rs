//! Occurrence evaluation — "is this schedule active on that date?".
//!
//! The checks run in a fixed order and fail closed: series not started,
//! series truncated, occurrence skipped, then the frequency rule itself.
//! The evaluator is total over validated schedules; it never errors and it
//! is also used for past dates (history views), so there is no "not before
//! today" constraint here.

use chrono::{Datelike, NaiveDate};

use crate::models::{Frequency, Schedule, Weekday};

/// Returns whether `schedule` has an occurrence on `date`.
pub fn is_active_on(schedule: &Schedule, date: NaiveDate) -> bool {
    if date < schedule.anchor_date {
        return false;
    }
    if let Some(end) = schedule.end_date {
        if date > end {
            return false;
        }
    }
    if schedule.skipped_dates.contains(&date) {
        return false;
    }

    match &schedule.frequency {
        Frequency::Once => date == schedule.anchor_date,
        Frequency::EveryNDays { interval } => {
            // Anchored arithmetic: editing the anchor shifts the whole series.
            let offset = (date - schedule.anchor_date).num_days();
            offset % i64::from(*interval) == 0
        }
        Frequency::Weekly { days } => days.contains(&Weekday::from(date.weekday())),
        Frequency::Monthly { day_of_month } => {
            let clamped = (*day_of_month).min(last_day_of_month(date.year(), date.month()));
            date.day() == clamped
        }
    }
}

/// Last valid day number of the given month (handles leap years).
pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    // Month is always 1..=12 here, so the first of the next month exists.
    first_of_next
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Frequency, Schedule, ScheduleKind};
    use chrono::NaiveTime;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn schedule(anchor: NaiveDate, frequency: Frequency) -> Schedule {
        Schedule {
            id: uuid::Uuid::new_v4(),
            owner_id: "patient-1".into(),
            kind: ScheduleKind::Medication,
            title: "Metformin".into(),
            anchor_date: anchor,
            time_of_day: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            frequency,
            skipped_dates: BTreeSet::new(),
            end_date: None,
            has_alarm: false,
            version: 0,
        }
    }

    #[test]
    fn once_active_on_exactly_one_date() {
        let s = schedule(date(2024, 6, 1), Frequency::Once);
        assert!(is_active_on(&s, date(2024, 6, 1)));
        assert!(!is_active_on(&s, date(2024, 5, 31)));
        assert!(!is_active_on(&s, date(2024, 6, 2)));
        // Exhaustive over a wide window: exactly one active date.
        let active = (0..730)
            .filter_map(|d| date(2024, 1, 1).checked_add_days(chrono::Days::new(d)))
            .filter(|d| is_active_on(&s, *d))
            .count();
        assert_eq!(active, 1);
    }

    #[test]
    fn before_anchor_never_active() {
        let s = schedule(date(2024, 3, 1), Frequency::EveryNDays { interval: 1 });
        assert!(!is_active_on(&s, date(2024, 2, 29)));
        assert!(is_active_on(&s, date(2024, 3, 1)));
    }

    #[test]
    fn every_n_days_anchored_arithmetic() {
        // Anchor 2024-01-01, every 3 days.
        let s = schedule(date(2024, 1, 1), Frequency::EveryNDays { interval: 3 });
        assert!(is_active_on(&s, date(2024, 1, 10))); // offset 9
        assert!(!is_active_on(&s, date(2024, 1, 11))); // offset 10
        assert!(is_active_on(&s, date(2024, 1, 1))); // offset 0
    }

    #[test]
    fn every_n_days_periodicity() {
        let s = schedule(date(2024, 1, 1), Frequency::EveryNDays { interval: 7 });
        for offset in 0..120i64 {
            let d = date(2024, 1, 1) + chrono::Duration::days(offset);
            let d_next = d + chrono::Duration::days(7);
            assert_eq!(is_active_on(&s, d), is_active_on(&s, d_next), "offset {offset}");
        }
    }

    #[test]
    fn weekly_matches_weekday_only() {
        // Anchor 2024-01-01 is a Monday.
        let s = schedule(
            date(2024, 1, 1),
            Frequency::Weekly { days: BTreeSet::from([Weekday::Monday]) },
        );
        assert!(is_active_on(&s, date(2024, 1, 8)));
        assert!(!is_active_on(&s, date(2024, 1, 2)));
        // Every Monday for a year, nothing else.
        for offset in 0..365i64 {
            let d = date(2024, 1, 1) + chrono::Duration::days(offset);
            use chrono::Datelike;
            assert_eq!(is_active_on(&s, d), d.weekday() == chrono::Weekday::Mon);
        }
    }

    #[test]
    fn weekly_multiple_days() {
        let s = schedule(
            date(2024, 1, 1),
            Frequency::Weekly { days: BTreeSet::from([Weekday::Monday, Weekday::Thursday]) },
        );
        assert!(is_active_on(&s, date(2024, 1, 1))); // Mon
        assert!(is_active_on(&s, date(2024, 1, 4))); // Thu
        assert!(!is_active_on(&s, date(2024, 1, 3))); // Wed
    }

    #[test]
    fn monthly_fires_on_the_day() {
        let s = schedule(date(2024, 1, 10), Frequency::Monthly { day_of_month: 15 });
        assert!(is_active_on(&s, date(2024, 1, 15)));
        assert!(is_active_on(&s, date(2024, 2, 15)));
        assert!(!is_active_on(&s, date(2024, 2, 14)));
    }

    #[test]
    fn monthly_31_clamps_to_short_months() {
        let s = schedule(date(2024, 1, 1), Frequency::Monthly { day_of_month: 31 });
        assert!(is_active_on(&s, date(2024, 1, 31)));
        assert!(is_active_on(&s, date(2024, 2, 29))); // leap February
        assert!(is_active_on(&s, date(2024, 4, 30))); // 30-day month
        // No other February date is active.
        for day in 1..=28 {
            assert!(!is_active_on(&s, date(2024, 2, day)), "feb {day}");
        }
        // Non-leap year clamps to the 28th.
        let s2 = schedule(date(2023, 1, 1), Frequency::Monthly { day_of_month: 31 });
        assert!(is_active_on(&s2, date(2023, 2, 28)));
        assert!(!is_active_on(&s2, date(2023, 2, 27)));
    }

    #[test]
    fn skipped_date_suppressed_regardless_of_match() {
        // 2024-03-15 is a Friday.
        let mut s = schedule(
            date(2024, 1, 5),
            Frequency::Weekly { days: BTreeSet::from([Weekday::Friday]) },
        );
        s.skipped_dates.insert(date(2024, 3, 15));
        assert!(!is_active_on(&s, date(2024, 3, 15)));
        assert!(is_active_on(&s, date(2024, 3, 22)));
    }

    #[test]
    fn end_date_is_inclusive() {
        let mut s = schedule(date(2024, 1, 1), Frequency::EveryNDays { interval: 1 });
        s.end_date = Some(date(2024, 1, 5));
        assert!(is_active_on(&s, date(2024, 1, 5))); // last occurrence stands
        assert!(!is_active_on(&s, date(2024, 1, 6)));
        for offset in 6..60i64 {
            assert!(!is_active_on(&s, date(2024, 1, 1) + chrono::Duration::days(offset)));
        }
    }

    #[test]
    fn skipped_end_date_occurrence_suppressed() {
        let mut s = schedule(date(2024, 1, 1), Frequency::EveryNDays { interval: 1 });
        s.end_date = Some(date(2024, 1, 5));
        s.skipped_dates.insert(date(2024, 1, 5));
        assert!(!is_active_on(&s, date(2024, 1, 5)));
    }

    #[test]
    fn last_day_of_month_table() {
        assert_eq!(last_day_of_month(2024, 1), 31);
        assert_eq!(last_day_of_month(2024, 2), 29); // leap
        assert_eq!(last_day_of_month(2023, 2), 28);
        assert_eq!(last_day_of_month(2024, 4), 30);
        assert_eq!(last_day_of_month(2024, 12), 31); // year rollover path
        assert_eq!(last_day_of_month(1900, 2), 28); // century non-leap
        assert_eq!(last_day_of_month(2000, 2), 29); // 400-year leap
    }
}
