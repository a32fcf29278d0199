//! Schedule repository — CRUD, the three deletion modes, and the
//! compare-and-set writes the reconciliation job relies on.
//!
//! The `schedules` table stands in for the original remote document store;
//! its `version` column plays the role of the per-document etag, so every
//! mutation here is a compare-and-set. Any edit that could change the
//! recurrence resets `has_alarm`, forcing the reconciler to recompute.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{Days, NaiveDate, NaiveTime};
use rusqlite::{params, Connection};
use uuid::Uuid;

use super::StoreError;
use crate::models::{Frequency, FrequencyKind, InvalidSchedule, Schedule, ScheduleKind, Weekday};
use crate::recurrence::is_active_on;
use crate::wire::ScheduleDoc;

const STORE_DATE_FMT: &str = "%Y-%m-%d";
const STORE_TIME_FMT: &str = "%H:%M";

// ═══════════════════════════════════════════
// Reads
// ═══════════════════════════════════════════

const SELECT_COLUMNS: &str = "id, owner_id, kind, title, anchor_date, time_of_day, frequency,
     every_n_days, weekly_days, monthly_day, skipped_dates, end_date, has_alarm, version";

pub fn get_schedule(conn: &Connection, id: &Uuid) -> Result<Option<Schedule>, StoreError> {
    let mut stmt = conn
        .prepare(&format!("SELECT {SELECT_COLUMNS} FROM schedules WHERE id = ?1"))?;

    let result = stmt.query_row(params![id.to_string()], read_row);
    match result {
        Ok(row) => Ok(Some(schedule_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// All schedules belonging to a patient, newest anchor first.
pub fn list_schedules(conn: &Connection, owner_id: &str) -> Result<Vec<Schedule>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM schedules WHERE owner_id = ?1 ORDER BY anchor_date DESC"
    ))?;
    let rows = stmt
        .query_map(params![owner_id], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(schedule_from_row).collect()
}

/// Day-view query: the patient's schedules with an occurrence on `date`.
///
/// Filtering happens in the evaluator, not SQL — the original backend does
/// the same (fetch all, filter client side), and it keeps the skip/end
/// logic in exactly one place.
pub fn fetch_active_on(
    conn: &Connection,
    owner_id: &str,
    date: NaiveDate,
) -> Result<Vec<Schedule>, StoreError> {
    let all = list_schedules(conn, owner_id)?;
    Ok(all.into_iter().filter(|s| is_active_on(s, date)).collect())
}

/// Schedules with no registered device alarm, for the reconciliation job.
pub fn fetch_pending_alarms(
    conn: &Connection,
    owner_id: &str,
) -> Result<Vec<Schedule>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM schedules WHERE owner_id = ?1 AND has_alarm = 0"
    ))?;
    let rows = stmt
        .query_map(params![owner_id], read_row)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(schedule_from_row).collect()
}

// ═══════════════════════════════════════════
// Writes
// ═══════════════════════════════════════════

/// Inserts a validated schedule at version 0.
pub fn insert_schedule(conn: &Connection, schedule: &Schedule) -> Result<(), StoreError> {
    schedule.validate()?;
    let (frequency, every_n_days, weekly_days, monthly_day) = frequency_columns(&schedule.frequency);
    conn.execute(
        "INSERT INTO schedules (id, owner_id, kind, title, anchor_date, time_of_day, frequency,
         every_n_days, weekly_days, monthly_day, skipped_dates, end_date, has_alarm, version)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 0)",
        params![
            schedule.id.to_string(),
            schedule.owner_id,
            schedule.kind.as_str(),
            schedule.title,
            schedule.anchor_date.format(STORE_DATE_FMT).to_string(),
            schedule.time_of_day.format(STORE_TIME_FMT).to_string(),
            frequency.as_str(),
            every_n_days,
            weekly_days,
            monthly_day,
            skipped_dates_json(&schedule.skipped_dates),
            schedule.end_date.map(|d| d.format(STORE_DATE_FMT).to_string()),
            schedule.has_alarm as i32,
        ],
    )?;
    Ok(())
}

/// Full-record compare-and-set against `schedule.version`.
///
/// On success the stored version becomes `schedule.version + 1` (returned)
/// and `has_alarm` is cleared: the caller edited the record, so any
/// registered alarm may now point at the wrong occurrence.
pub fn update_schedule(conn: &Connection, schedule: &Schedule) -> Result<i64, StoreError> {
    schedule.validate()?;
    let (frequency, every_n_days, weekly_days, monthly_day) = frequency_columns(&schedule.frequency);
    let changed = conn.execute(
        "UPDATE schedules
         SET owner_id = ?1, kind = ?2, title = ?3, anchor_date = ?4, time_of_day = ?5,
             frequency = ?6, every_n_days = ?7, weekly_days = ?8, monthly_day = ?9,
             skipped_dates = ?10, end_date = ?11, has_alarm = 0, version = version + 1
         WHERE id = ?12 AND version = ?13",
        params![
            schedule.owner_id,
            schedule.kind.as_str(),
            schedule.title,
            schedule.anchor_date.format(STORE_DATE_FMT).to_string(),
            schedule.time_of_day.format(STORE_TIME_FMT).to_string(),
            frequency.as_str(),
            every_n_days,
            weekly_days,
            monthly_day,
            skipped_dates_json(&schedule.skipped_dates),
            schedule.end_date.map(|d| d.format(STORE_DATE_FMT).to_string()),
            schedule.id.to_string(),
            schedule.version,
        ],
    )?;

    if changed == 0 {
        return Err(missing_or_conflict(conn, &schedule.id, schedule.version));
    }
    Ok(schedule.version + 1)
}

/// Compare-and-set flip of `has_alarm` after a successful registration.
pub fn mark_alarm_registered(
    conn: &Connection,
    id: &Uuid,
    expected_version: i64,
) -> Result<i64, StoreError> {
    let changed = conn.execute(
        "UPDATE schedules SET has_alarm = 1, version = version + 1
         WHERE id = ?1 AND version = ?2",
        params![id.to_string(), expected_version],
    )?;
    if changed == 0 {
        return Err(missing_or_conflict(conn, id, expected_version));
    }
    Ok(expected_version + 1)
}

/// Skip-one deletion mode: exclude a single occurrence, keep the series.
pub fn skip_occurrence(
    conn: &Connection,
    id: &Uuid,
    date: NaiveDate,
) -> Result<Schedule, StoreError> {
    let mut schedule = require_schedule(conn, id)?;
    schedule.skipped_dates.insert(date);
    let version = update_schedule(conn, &schedule)?;
    schedule.version = version;
    schedule.has_alarm = false;
    Ok(schedule)
}

/// Truncate-from deletion mode: `date` becomes the first excluded
/// occurrence, so the stored (inclusive) end date is the day before it.
///
/// Truncating at or before the anchor would leave an empty series; callers
/// wanting that should delete the series instead, so it is rejected here.
pub fn truncate_before(
    conn: &Connection,
    id: &Uuid,
    date: NaiveDate,
) -> Result<Schedule, StoreError> {
    let mut schedule = require_schedule(conn, id)?;
    let end = date
        .checked_sub_days(Days::new(1))
        .filter(|end| *end >= schedule.anchor_date)
        .ok_or(InvalidSchedule::EndBeforeAnchor {
            date,
            anchor: schedule.anchor_date,
        })?;
    schedule.end_date = Some(end);
    let version = update_schedule(conn, &schedule)?;
    schedule.version = version;
    schedule.has_alarm = false;
    Ok(schedule)
}

/// Delete-series deletion mode.
pub fn delete_schedule(conn: &Connection, id: &Uuid) -> Result<(), StoreError> {
    let changed = conn.execute("DELETE FROM schedules WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(StoreError::NotFound { id: id.to_string() });
    }
    Ok(())
}

/// Parses a legacy document, validates it, and stores it under a fresh id.
pub fn import_schedule_doc(
    conn: &Connection,
    kind: ScheduleKind,
    doc: ScheduleDoc,
) -> Result<Uuid, StoreError> {
    let id = Uuid::new_v4();
    let schedule = doc.into_schedule(id, kind)?;
    insert_schedule(conn, &schedule)?;
    Ok(id)
}

fn require_schedule(conn: &Connection, id: &Uuid) -> Result<Schedule, StoreError> {
    get_schedule(conn, id)?.ok_or_else(|| StoreError::NotFound { id: id.to_string() })
}

fn missing_or_conflict(conn: &Connection, id: &Uuid, expected: i64) -> StoreError {
    let exists: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM schedules WHERE id = ?1",
            params![id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .map(|n| n > 0)
        .unwrap_or(false);
    if exists {
        StoreError::VersionConflict { id: id.to_string(), expected }
    } else {
        StoreError::NotFound { id: id.to_string() }
    }
}

// ═══════════════════════════════════════════
// Row conversion
// ═══════════════════════════════════════════

struct ScheduleRow {
    id: String,
    owner_id: String,
    kind: String,
    title: String,
    anchor_date: String,
    time_of_day: String,
    frequency: String,
    every_n_days: Option<u32>,
    weekly_days: Option<String>,
    monthly_day: Option<u32>,
    skipped_dates: String,
    end_date: Option<String>,
    has_alarm: i32,
    version: i64,
}

fn read_row(row: &rusqlite::Row<'_>) -> Result<ScheduleRow, rusqlite::Error> {
    Ok(ScheduleRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        anchor_date: row.get(4)?,
        time_of_day: row.get(5)?,
        frequency: row.get(6)?,
        every_n_days: row.get(7)?,
        weekly_days: row.get(8)?,
        monthly_day: row.get(9)?,
        skipped_dates: row.get(10)?,
        end_date: row.get(11)?,
        has_alarm: row.get(12)?,
        version: row.get(13)?,
    })
}

fn schedule_from_row(row: ScheduleRow) -> Result<Schedule, StoreError> {
    let frequency = match FrequencyKind::from_str(&row.frequency)? {
        FrequencyKind::Once => Frequency::Once,
        FrequencyKind::EveryXDays => Frequency::EveryNDays {
            interval: row.every_n_days.ok_or_else(|| StoreError::CorruptField {
                field: "every_n_days".into(),
                value: "NULL".into(),
            })?,
        },
        FrequencyKind::Weekly => {
            let json = row.weekly_days.ok_or_else(|| StoreError::CorruptField {
                field: "weekly_days".into(),
                value: "NULL".into(),
            })?;
            let names: Vec<String> =
                serde_json::from_str(&json).map_err(|_| StoreError::CorruptField {
                    field: "weekly_days".into(),
                    value: json.clone(),
                })?;
            let days = names
                .iter()
                .map(|s| Weekday::from_str(s))
                .collect::<Result<BTreeSet<_>, _>>()?;
            Frequency::Weekly { days }
        }
        FrequencyKind::Monthly => Frequency::Monthly {
            day_of_month: row.monthly_day.ok_or_else(|| StoreError::CorruptField {
                field: "monthly_day".into(),
                value: "NULL".into(),
            })?,
        },
    };

    let skipped_names: Vec<String> =
        serde_json::from_str(&row.skipped_dates).map_err(|_| StoreError::CorruptField {
            field: "skipped_dates".into(),
            value: row.skipped_dates.clone(),
        })?;
    let skipped_dates = skipped_names
        .iter()
        .map(|s| parse_store_date("skipped_dates", s))
        .collect::<Result<BTreeSet<_>, _>>()?;

    Ok(Schedule {
        id: Uuid::parse_str(&row.id).map_err(|_| StoreError::CorruptField {
            field: "id".into(),
            value: row.id.clone(),
        })?,
        owner_id: row.owner_id,
        kind: ScheduleKind::from_str(&row.kind)?,
        title: row.title,
        anchor_date: parse_store_date("anchor_date", &row.anchor_date)?,
        time_of_day: NaiveTime::parse_from_str(&row.time_of_day, STORE_TIME_FMT).map_err(
            |_| StoreError::CorruptField {
                field: "time_of_day".into(),
                value: row.time_of_day.clone(),
            },
        )?,
        frequency,
        skipped_dates,
        end_date: row
            .end_date
            .as_deref()
            .map(|s| parse_store_date("end_date", s))
            .transpose()?,
        has_alarm: row.has_alarm != 0,
        version: row.version,
    })
}

fn parse_store_date(field: &str, value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, STORE_DATE_FMT).map_err(|_| StoreError::CorruptField {
        field: field.into(),
        value: value.into(),
    })
}

fn frequency_columns(
    frequency: &Frequency,
) -> (FrequencyKind, Option<u32>, Option<String>, Option<u32>) {
    match frequency {
        Frequency::Once => (FrequencyKind::Once, None, None, None),
        Frequency::EveryNDays { interval } => {
            (FrequencyKind::EveryXDays, Some(*interval), None, None)
        }
        Frequency::Weekly { days } => {
            let names: Vec<&str> = days.iter().map(|d| d.as_str()).collect();
            // Serializing a Vec<&str> cannot fail.
            let json = serde_json::to_string(&names).unwrap_or_else(|_| "[]".into());
            (FrequencyKind::Weekly, None, Some(json), None)
        }
        Frequency::Monthly { day_of_month } => {
            (FrequencyKind::Monthly, None, None, Some(*day_of_month))
        }
    }
}

fn skipped_dates_json(dates: &BTreeSet<NaiveDate>) -> String {
    let names: Vec<String> = dates.iter().map(|d| d.format(STORE_DATE_FMT).to_string()).collect();
    serde_json::to_string(&names).unwrap_or_else(|_| "[]".into())
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
