//! Scoring availability window.
//!
//! A match opens for scoring at the unlock hour on its scheduled date and stays
//! open until the same hour on the following day. Everything here is pure: the
//! caller supplies "now" and the league's timezone.

use chrono::{DateTime, Days, NaiveDate, TimeZone, Timelike, Utc};

use crate::model::Match;
use crate::types::{MatchId, SetStatus};

/// Local hour at which the scoring window opens (and closes the next day).
pub const UNLOCK_HOUR: u32 = 8;

/// Everything about a match and set that bears on the lock decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockContext {
    pub scheduled_date: Option<NaiveDate>,
    pub manual_unlock: bool,
    pub set_status: SetStatus,
    pub has_started: bool,
}

/// Whether scoring is currently blocked for the given match/set.
pub fn is_locked<Tz: TimeZone>(ctx: &LockContext, tz: &Tz, now: DateTime<Utc>) -> bool {
    is_locked_with_hour(ctx, tz, now, UNLOCK_HOUR)
}

pub fn is_locked_with_hour<Tz: TimeZone>(
    ctx: &LockContext,
    tz: &Tz,
    now: DateTime<Utc>,
    unlock_hour: u32,
) -> bool {
    if ctx.manual_unlock {
        return false;
    }
    // An active or completed set is never re-locked.
    if matches!(ctx.set_status, SetStatus::InProgress | SetStatus::Finalized) || ctx.has_started {
        return false;
    }
    let Some(scheduled) = ctx.scheduled_date else {
        return false;
    };

    let local = now.with_timezone(tz);
    let today = local.date_naive();
    let before_unlock = local.hour() < unlock_hour;

    if today == scheduled {
        // Future match until the window opens
        return before_unlock;
    }
    if Some(today) == scheduled.checked_add_days(Days::new(1)) {
        // Late-night grace, expired once the unlock hour passes again
        return !before_unlock;
    }
    true
}

/// Evaluate the lock state of every match in a batch against one clock reading.
///
/// A match counts as started once either set has any recorded score.
pub fn lock_states<Tz: TimeZone>(
    matches: &[Match],
    tz: &Tz,
    now: DateTime<Utc>,
) -> Vec<(MatchId, bool)> {
    matches
        .iter()
        .map(|m| (m.id, m.is_locked(tz, now)))
        .collect()
}

#[cfg(test)]
#[path = "lock_window_tests.rs"]
mod lock_window_tests;
