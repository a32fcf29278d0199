//! Alarm reconciliation — a periodic sweep that registers a device alarm
//! for every schedule that does not have one yet.
//!
//! The sweep is the safety net for lost alarms (device reboot, caretaker
//! edit from another device, registration failure). It is idempotent: a
//! successful registration flips `has_alarm` via compare-and-set, so a
//! schedule is only ever picked up again after an edit cleared the flag.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use thiserror::Error;
use uuid::Uuid;

use crate::db::{self, StoreError};
use crate::models::ScheduleKind;
use crate::next_fire::next_fire_after;

/// What the platform alarm API needs to know about a firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRef {
    pub schedule_id: Uuid,
    pub kind: ScheduleKind,
    pub title: String,
}

#[derive(Error, Debug)]
#[error("alarm registration failed: {0}")]
pub struct AlarmError(pub String);

/// Seam to the platform alarm service. The production backend talks to the
/// OS scheduler; tests substitute a recording mock.
pub trait AlarmBackend {
    fn register_alarm(&mut self, fire_at: NaiveDateTime, event: EventRef) -> Result<(), AlarmError>;
}

/// Outcome counts for one reconciliation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Alarms registered and acknowledged in the store.
    pub registered: usize,
    /// Schedules with no future occurrence; left alone.
    pub ended: usize,
    /// Backend registration failures; retried next sweep.
    pub failed: usize,
    /// Lost the compare-and-set race; retried next sweep if still pending.
    pub conflicts: usize,
}

/// One reconciliation sweep over a patient's pending schedules.
///
/// Ordering matters: the alarm is registered on the device first, and the
/// store is updated second. A crash between the two leaves a duplicate
/// registration (harmless, the next sweep re-registers the same firing)
/// rather than a silently missing alarm.
pub fn reconcile_alarms(
    conn: &Connection,
    owner_id: &str,
    now: NaiveDateTime,
    backend: &mut impl AlarmBackend,
) -> Result<ReconcileReport, StoreError> {
    let pending = db::fetch_pending_alarms(conn, owner_id)?;
    tracing::debug!(owner_id, pending = pending.len(), "reconciling alarms");

    let mut report = ReconcileReport::default();
    for schedule in pending {
        let Some(fire_at) = next_fire_after(&schedule, now) else {
            report.ended += 1;
            continue;
        };

        let event = EventRef {
            schedule_id: schedule.id,
            kind: schedule.kind,
            title: schedule.title.clone(),
        };
        if let Err(e) = backend.register_alarm(fire_at, event) {
            tracing::warn!(schedule_id = %schedule.id, error = %e, "alarm registration failed");
            report.failed += 1;
            continue;
        }

        match db::mark_alarm_registered(conn, &schedule.id, schedule.version) {
            Ok(_) => report.registered += 1,
            Err(StoreError::VersionConflict { .. }) | Err(StoreError::NotFound { .. }) => {
                // The schedule changed (or vanished) under us; the alarm we
                // just set may be stale, but the next sweep sees the cleared
                // flag and recomputes.
                tracing::debug!(schedule_id = %schedule.id, "lost reconcile race, deferring");
                report.conflicts += 1;
            }
            Err(e) => return Err(e),
        }
    }

    tracing::info!(
        owner_id,
        registered = report.registered,
        ended = report.ended,
        failed = report.failed,
        conflicts = report.conflicts,
        "reconcile sweep complete"
    );
    Ok(report)
}
