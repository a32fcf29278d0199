//! Schedule model — the typed recurrence definition shared by appointment
//! and medication reminders.
//!
//! The legacy app duplicated these fields per entity (`Appointment`,
//! `Medicine`); here both collapse into one `Schedule` carrying an opaque
//! `kind` + `title` payload. Validation happens at construction; the
//! evaluators in `recurrence`/`next_fire` assume a well-formed value.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::enums::{ScheduleKind, Weekday};

/// Rejected schedule construction, carrying the offending field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidSchedule {
    #[error("everyXDays interval must be at least 1, got {interval}")]
    NonPositiveInterval { interval: u32 },

    #[error("weekly frequency requires at least one weekday")]
    EmptyWeekdaySet,

    #[error("monthly day must be 1..=31, got {day}")]
    DayOfMonthOutOfRange { day: u32 },

    #[error("skipped date {date} is before the anchor date {anchor}")]
    SkippedBeforeAnchor { date: NaiveDate, anchor: NaiveDate },

    #[error("end date {date} is before the anchor date {anchor}")]
    EndBeforeAnchor { date: NaiveDate, anchor: NaiveDate },

    #[error("one-time schedule dated {date} is in the past (today is {today})")]
    OnceInPast { date: NaiveDate, today: NaiveDate },
}

/// How a schedule repeats. Exactly one variant applies per schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Fires only on the anchor date.
    Once,
    /// Fires on the anchor date and every `interval` days after it.
    EveryNDays { interval: u32 },
    /// Fires on every date on/after the anchor whose weekday is in the set.
    Weekly { days: BTreeSet<Weekday> },
    /// Fires on the given day of each month, clamped to shorter months.
    Monthly { day_of_month: u32 },
}

impl Frequency {
    fn validate(&self) -> Result<(), InvalidSchedule> {
        match self {
            Frequency::Once => Ok(()),
            Frequency::EveryNDays { interval } => {
                if *interval < 1 {
                    Err(InvalidSchedule::NonPositiveInterval { interval: *interval })
                } else {
                    Ok(())
                }
            }
            Frequency::Weekly { days } => {
                if days.is_empty() {
                    Err(InvalidSchedule::EmptyWeekdaySet)
                } else {
                    Ok(())
                }
            }
            Frequency::Monthly { day_of_month } => {
                if !(1..=31).contains(day_of_month) {
                    Err(InvalidSchedule::DayOfMonthOutOfRange { day: *day_of_month })
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// A recurring or one-time event definition for one patient.
///
/// `end_date` is inclusive: the occurrence on the end date itself remains
/// active unless also skipped; nothing exists strictly after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub owner_id: String,
    pub kind: ScheduleKind,
    /// Display payload ("Cardiology check-up", "Metformin 500mg"). The
    /// recurrence engine never looks at it.
    pub title: String,
    pub anchor_date: NaiveDate,
    pub time_of_day: NaiveTime,
    pub frequency: Frequency,
    pub skipped_dates: BTreeSet<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Whether a device alarm is currently registered for the next
    /// occurrence. Flipped by the reconciliation job, reset by edits.
    pub has_alarm: bool,
    /// Store etag; every persisted mutation bumps it (compare-and-set).
    pub version: i64,
}

impl Schedule {
    /// Creates a new validated schedule from a caretaker action.
    ///
    /// `today` is the creation-day check for one-time schedules: a `Once`
    /// schedule dated in the past can never fire and is rejected outright.
    pub fn new(
        owner_id: impl Into<String>,
        kind: ScheduleKind,
        title: impl Into<String>,
        anchor_date: NaiveDate,
        time_of_day: NaiveTime,
        frequency: Frequency,
        today: NaiveDate,
    ) -> Result<Self, InvalidSchedule> {
        if matches!(frequency, Frequency::Once) && anchor_date < today {
            return Err(InvalidSchedule::OnceInPast { date: anchor_date, today });
        }

        let schedule = Schedule {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            kind,
            title: title.into(),
            anchor_date,
            time_of_day,
            frequency,
            skipped_dates: BTreeSet::new(),
            end_date: None,
            has_alarm: false,
            version: 0,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Checks the structural invariants without the creation-day rule.
    ///
    /// Used when loading stored records, which may legitimately be anchored
    /// in the past (history display).
    pub fn validate(&self) -> Result<(), InvalidSchedule> {
        self.frequency.validate()?;

        if let Some(date) = self.skipped_dates.iter().find(|d| **d < self.anchor_date) {
            return Err(InvalidSchedule::SkippedBeforeAnchor {
                date: *date,
                anchor: self.anchor_date,
            });
        }

        if let Some(end) = self.end_date {
            if end < self.anchor_date {
                return Err(InvalidSchedule::EndBeforeAnchor {
                    date: end,
                    anchor: self.anchor_date,
                });
            }
        }

        Ok(())
    }
}
