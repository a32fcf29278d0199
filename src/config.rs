use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Memoraid";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hard ceiling on the forward scan in `next_fire_after`, in days.
///
/// Safety net, not a domain rule: a well-formed schedule matches within a
/// month or so (the sparsest frequency is a monthly day-of-month). Exhausting
/// the horizon means every candidate in the window was skipped, which is
/// treated as "never fires again".
pub const SCAN_HORIZON_DAYS: i64 = 400;

/// How often the host app should re-run alarm reconciliation.
pub const RECONCILE_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
