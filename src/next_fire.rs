//! Next-fire calculation — when should the next reminder go off?
//!
//! A bounded forward scan rather than a closed form: once skip lists layer
//! onto weekly/monthly rules there is no formula that composes correctly
//! without duplicating the exclusion logic, so we walk day by day through
//! the same evaluator the day view uses.

use chrono::{Days, NaiveDateTime};

use crate::config::SCAN_HORIZON_DAYS;
use crate::models::Schedule;
use crate::recurrence::is_active_on;

/// Returns the earliest date-time strictly after `reference_now` at which
/// `schedule` fires, or `None` if the series will never fire again.
///
/// `None` covers both a truncated series (scan passed `end_date`) and the
/// pathological case where every candidate inside the scan horizon is
/// skipped; the horizon (`config::SCAN_HORIZON_DAYS`) is a termination
/// safety net, not a domain rule.
pub fn next_fire_after(schedule: &Schedule, reference_now: NaiveDateTime) -> Option<NaiveDateTime> {
    // Nothing before the anchor can fire, so start the scan at whichever of
    // anchor/today is later.
    let mut date = reference_now.date().max(schedule.anchor_date);

    for _ in 0..=SCAN_HORIZON_DAYS {
        if let Some(end) = schedule.end_date {
            if date > end {
                return None;
            }
        }

        if is_active_on(schedule, date) {
            let candidate = date.and_time(schedule.time_of_day);
            if candidate > reference_now {
                return Some(candidate);
            }
        }

        date = date.checked_add_days(Days::new(1))?;
    }

    tracing::warn!(
        schedule_id = %schedule.id,
        horizon_days = SCAN_HORIZON_DAYS,
        "next-fire scan exhausted its horizon; treating series as ended"
    );
    None
}
