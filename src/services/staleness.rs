//! Staleness and active-window evaluation.
//!
//! Everything here is pure: callers pass "now" in, so a cycle evaluates every
//! request against the same instant and tests can pin the clock.

use chrono::{DateTime, NaiveTime, Timelike, Utc};

use crate::models::merge_request::MergeRequest;

/// Minutes that must elapse before a request counts as stale.
///
/// Both limits must be exceeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub created_minutes: f64,
    pub updated_minutes: f64,
}

/// Daily time-of-day range in which the watchdog acts. `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Thresholds plus the draft exemption switch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StalenessPolicy {
    pub thresholds: Thresholds,
    pub skip_work_in_progress: bool,
}

impl StalenessPolicy {
    pub fn is_stale(&self, mr: &MergeRequest, now: DateTime<Utc>) -> bool {
        if self.skip_work_in_progress && mr.work_in_progress {
            return false;
        }
        is_stale(mr, &self.thresholds, now)
    }
}

/// Wall-clock minutes from `then` to `now`, negative if `then` is in the future.
pub fn minutes_since(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / 60_000.0
}

/// Whether `mr` has exceeded both the creation and the update threshold.
///
/// Both comparisons are strict.
pub fn is_stale(mr: &MergeRequest, thresholds: &Thresholds, now: DateTime<Utc>) -> bool {
    minutes_since(mr.created_at, now) > thresholds.created_minutes
        && minutes_since(mr.updated_at, now) > thresholds.updated_minutes
}

/// Whether `now` falls strictly inside `window`, compared at hour:minute
/// resolution. No window means always active.
pub fn in_active_window(now: NaiveTime, window: Option<&ActiveWindow>) -> bool {
    let Some(window) = window else {
        return true;
    };
    let now = truncate_to_minute(now);
    window.start < now && now < window.end
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}
