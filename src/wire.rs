//! Adapter for the legacy document representation of schedules.
//!
//! The original backend stores recurrence fields as loose strings on each
//! appointment/medicine document: `dd-MM-yyyy` dates, `HH:mm` times, a
//! frequency string enum, and uppercase weekday names. This module is the
//! only place those formats exist; everything past `into_schedule` is typed.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Frequency, FrequencyKind, InvalidSchedule, Schedule, ScheduleKind, UnknownVariant, Weekday,
};

/// Date format used throughout the legacy documents.
pub const DOC_DATE_FMT: &str = "%d-%m-%Y";
/// Time format used throughout the legacy documents.
pub const DOC_TIME_FMT: &str = "%H:%M";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("field {field} holds an unparsable date: {value:?} (expected dd-MM-yyyy)")]
    BadDate { field: &'static str, value: String },

    #[error("unparsable time: {value:?} (expected HH:mm)")]
    BadTime { value: String },

    #[error("{0}")]
    UnknownValue(#[from] UnknownVariant),

    #[error("frequency {frequency:?} requires field {field}, which is absent")]
    MissingParameter { frequency: &'static str, field: &'static str },

    #[error(transparent)]
    Invalid(#[from] InvalidSchedule),
}

/// A schedule as it appears in the legacy document store.
///
/// Optional fields may be entirely absent from older documents; parameter
/// fields that do not belong to the declared frequency are ignored (the
/// writer leaves nulls there).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScheduleDoc {
    pub name: String,
    pub user_id: String,
    /// Anchor date, `dd-MM-yyyy`.
    pub date: String,
    /// Firing time, `HH:mm`.
    pub time: String,
    /// One of "Once", "Every X days", "Weekly", "Monthly".
    pub frequency: String,
    pub every_x_days: Option<u32>,
    pub weekly_days: Option<Vec<String>>,
    pub monthly_day: Option<u32>,
    pub skipped_dates: Option<Vec<String>>,
    pub end_date: Option<String>,
    pub has_alarm: Option<bool>,
}

impl ScheduleDoc {
    /// Parses and validates this document into a typed `Schedule`.
    ///
    /// The caller supplies the id (assigned by the store) and which entity
    /// collection the document came from.
    pub fn into_schedule(self, id: Uuid, kind: ScheduleKind) -> Result<Schedule, WireError> {
        let anchor_date = parse_doc_date("date", &self.date)?;
        let time_of_day = NaiveTime::parse_from_str(&self.time, DOC_TIME_FMT)
            .map_err(|_| WireError::BadTime { value: self.time.clone() })?;

        let frequency = match FrequencyKind::from_str(&self.frequency)? {
            FrequencyKind::Once => Frequency::Once,
            FrequencyKind::EveryXDays => Frequency::EveryNDays {
                interval: self.every_x_days.ok_or(WireError::MissingParameter {
                    frequency: "Every X days",
                    field: "everyXDays",
                })?,
            },
            FrequencyKind::Weekly => {
                let names = self.weekly_days.ok_or(WireError::MissingParameter {
                    frequency: "Weekly",
                    field: "weeklyDays",
                })?;
                let days = names
                    .iter()
                    .map(|s| Weekday::from_str(s))
                    .collect::<Result<BTreeSet<_>, _>>()?;
                Frequency::Weekly { days }
            }
            FrequencyKind::Monthly => Frequency::Monthly {
                day_of_month: self.monthly_day.ok_or(WireError::MissingParameter {
                    frequency: "Monthly",
                    field: "monthlyDay",
                })?,
            },
        };

        let skipped_dates = self
            .skipped_dates
            .unwrap_or_default()
            .iter()
            .map(|s| parse_doc_date("skippedDates", s))
            .collect::<Result<BTreeSet<_>, _>>()?;

        let end_date = self
            .end_date
            .as_deref()
            .map(|s| parse_doc_date("endDate", s))
            .transpose()?;

        let schedule = Schedule {
            id,
            owner_id: self.user_id,
            kind,
            title: self.name,
            anchor_date,
            time_of_day,
            frequency,
            skipped_dates,
            end_date,
            has_alarm: self.has_alarm.unwrap_or(false),
            version: 0,
        };
        schedule.validate()?;
        Ok(schedule)
    }

    /// Renders a typed schedule back into the legacy document shape.
    pub fn from_schedule(schedule: &Schedule) -> Self {
        let (frequency, every_x_days, weekly_days, monthly_day) = match &schedule.frequency {
            Frequency::Once => (FrequencyKind::Once, None, None, None),
            Frequency::EveryNDays { interval } => {
                (FrequencyKind::EveryXDays, Some(*interval), None, None)
            }
            Frequency::Weekly { days } => (
                FrequencyKind::Weekly,
                None,
                Some(days.iter().map(|d| d.as_str().to_owned()).collect()),
                None,
            ),
            Frequency::Monthly { day_of_month } => {
                (FrequencyKind::Monthly, None, None, Some(*day_of_month))
            }
        };

        ScheduleDoc {
            name: schedule.title.clone(),
            user_id: schedule.owner_id.clone(),
            date: schedule.anchor_date.format(DOC_DATE_FMT).to_string(),
            time: schedule.time_of_day.format(DOC_TIME_FMT).to_string(),
            frequency: frequency.as_str().to_owned(),
            every_x_days,
            weekly_days,
            monthly_day,
            skipped_dates: if schedule.skipped_dates.is_empty() {
                None
            } else {
                Some(
                    schedule
                        .skipped_dates
                        .iter()
                        .map(|d| d.format(DOC_DATE_FMT).to_string())
                        .collect(),
                )
            },
            end_date: schedule.end_date.map(|d| d.format(DOC_DATE_FMT).to_string()),
            has_alarm: Some(schedule.has_alarm),
        }
    }
}

fn parse_doc_date(field: &'static str, value: &str) -> Result<NaiveDate, WireError> {
    NaiveDate::parse_from_str(value, DOC_DATE_FMT)
        .map_err(|_| WireError::BadDate { field, value: value.to_owned() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn base_doc() -> ScheduleDoc {
        ScheduleDoc {
            name: "Metformin".into(),
            user_id: "patient-1".into(),
            date: "01-06-2024".into(),
            time: "09:30".into(),
            frequency: "Once".into(),
            ..Default::default()
        }
    }

    #[test]
    fn once_document_parses() {
        let s = base_doc()
            .into_schedule(Uuid::new_v4(), ScheduleKind::Medication)
            .unwrap();
        assert_eq!(s.anchor_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(s.time_of_day, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(s.frequency, Frequency::Once);
        assert!(s.skipped_dates.is_empty());
        assert!(s.end_date.is_none());
        assert!(!s.has_alarm);
    }

    #[test]
    fn every_x_days_document_parses() {
        let mut doc = base_doc();
        doc.frequency = "Every X days".into();
        doc.every_x_days = Some(3);
        let s = doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication).unwrap();
        assert_eq!(s.frequency, Frequency::EveryNDays { interval: 3 });
    }

    #[test]
    fn weekly_document_parses_uppercase_names() {
        let mut doc = base_doc();
        doc.frequency = "Weekly".into();
        doc.weekly_days = Some(vec!["MONDAY".into(), "FRIDAY".into()]);
        let s = doc.into_schedule(Uuid::new_v4(), ScheduleKind::Appointment).unwrap();
        assert_eq!(
            s.frequency,
            Frequency::Weekly { days: BTreeSet::from([Weekday::Monday, Weekday::Friday]) }
        );
    }

    #[test]
    fn monthly_document_parses_with_skips_and_end() {
        let mut doc = base_doc();
        doc.frequency = "Monthly".into();
        doc.monthly_day = Some(31);
        doc.skipped_dates = Some(vec!["31-07-2024".into()]);
        doc.end_date = Some("31-12-2024".into());
        let s = doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication).unwrap();
        assert_eq!(s.frequency, Frequency::Monthly { day_of_month: 31 });
        assert!(s.skipped_dates.contains(&NaiveDate::from_ymd_opt(2024, 7, 31).unwrap()));
        assert_eq!(s.end_date, Some(NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()));
    }

    #[test]
    fn missing_parameter_for_declared_frequency_rejected() {
        let mut doc = base_doc();
        doc.frequency = "Every X days".into();
        let err = doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication).unwrap_err();
        assert_eq!(
            err,
            WireError::MissingParameter { frequency: "Every X days", field: "everyXDays" }
        );

        let mut doc = base_doc();
        doc.frequency = "Weekly".into();
        assert!(matches!(
            doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication),
            Err(WireError::MissingParameter { field: "weeklyDays", .. })
        ));
    }

    #[test]
    fn foreign_parameters_ignored() {
        // A Once document carrying stale recurrence params still parses.
        let mut doc = base_doc();
        doc.every_x_days = Some(5);
        doc.monthly_day = Some(12);
        let s = doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication).unwrap();
        assert_eq!(s.frequency, Frequency::Once);
    }

    #[test]
    fn bad_date_reports_field() {
        let mut doc = base_doc();
        doc.date = "2024-06-01".into(); // ISO, not the document format
        let err = doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication).unwrap_err();
        assert!(matches!(err, WireError::BadDate { field: "date", .. }));
    }

    #[test]
    fn bad_time_rejected() {
        let mut doc = base_doc();
        doc.time = "9h30".into();
        assert!(matches!(
            doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication),
            Err(WireError::BadTime { .. })
        ));
    }

    #[test]
    fn unknown_frequency_rejected() {
        let mut doc = base_doc();
        doc.frequency = "Fortnightly".into();
        assert!(matches!(
            doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication),
            Err(WireError::UnknownValue(_))
        ));
    }

    #[test]
    fn structural_validation_applies() {
        // Skip before anchor must be rejected even though it parses.
        let mut doc = base_doc();
        doc.frequency = "Weekly".into();
        doc.weekly_days = Some(vec!["MONDAY".into()]);
        doc.skipped_dates = Some(vec!["01-01-2024".into()]); // before 01-06-2024
        assert!(matches!(
            doc.into_schedule(Uuid::new_v4(), ScheduleKind::Medication),
            Err(WireError::Invalid(InvalidSchedule::SkippedBeforeAnchor { .. }))
        ));
    }

    #[test]
    fn deserializes_from_camel_case_json() {
        let json = r#"{
            "name": "Cardiology",
            "userId": "patient-9",
            "date": "15-03-2024",
            "time": "14:00",
            "frequency": "Weekly",
            "weeklyDays": ["FRIDAY"],
            "endDate": "28-06-2024"
        }"#;
        let doc: ScheduleDoc = serde_json::from_str(json).unwrap();
        let s = doc.into_schedule(Uuid::new_v4(), ScheduleKind::Appointment).unwrap();
        assert_eq!(s.owner_id, "patient-9");
        assert_eq!(s.anchor_date.month(), 3);
        assert_eq!(s.end_date, Some(NaiveDate::from_ymd_opt(2024, 6, 28).unwrap()));
    }

    #[test]
    fn round_trips_through_document_shape() {
        let mut doc = base_doc();
        doc.frequency = "Weekly".into();
        doc.weekly_days = Some(vec!["MONDAY".into(), "THURSDAY".into()]);
        doc.skipped_dates = Some(vec!["10-06-2024".into()]);
        let id = Uuid::new_v4();
        let s = doc.into_schedule(id, ScheduleKind::Medication).unwrap();

        let back = ScheduleDoc::from_schedule(&s);
        let s2 = back.into_schedule(id, ScheduleKind::Medication).unwrap();
        assert_eq!(s, s2);
    }
}
