//! Memoraid core — the recurrence engine behind appointment and medication
//! reminders.
//!
//! A `Schedule` describes a one-time or recurring event (every N days, chosen
//! weekdays, or a fixed day of month) with per-occurrence skips and an
//! optional inclusive end date. The engine answers two questions:
//!
//! 1. Is this schedule active on a given calendar date? (`recurrence`)
//! 2. When should its next reminder fire? (`next_fire`)
//!
//! Everything else is plumbing around those two: a SQLite-backed schedule
//! store (`db`), an adapter for the legacy string-typed document format
//! (`wire`), and the reconciliation job that keeps device alarms registered
//! (`reconcile`). All dates and times are naive local values; the engine has
//! no notion of time zones.

pub mod config;
pub mod db;
pub mod models;
pub mod next_fire;
pub mod reconcile;
pub mod recurrence;
pub mod wire;
