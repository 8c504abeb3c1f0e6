//! Scoring configuration

use std::fmt;

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, Offset, Utc};
use league_core::{is_locked_with_hour, LockContext, UNLOCK_HOUR};
use serde::{Deserialize, Serialize};

/// Timezone the unlock hour is read in.
///
/// In TOML: `zone = "local"` or `zone = { fixed = -300 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeagueZone {
    /// The device's own zone, daylight saving included
    Local,
    /// Fixed offset from UTC, in minutes
    Fixed(i32),
}

impl Default for LeagueZone {
    fn default() -> Self {
        LeagueZone::Fixed(0)
    }
}

impl LeagueZone {
    /// Out-of-range offsets fall back to UTC.
    fn fixed(minutes: i32) -> FixedOffset {
        FixedOffset::east_opt(minutes * 60).unwrap_or_else(|| Utc.fix())
    }

    /// Wall-clock time in this zone.
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match *self {
            LeagueZone::Local => now.with_timezone(&Local).naive_local(),
            LeagueZone::Fixed(minutes) => now.with_timezone(&Self::fixed(minutes)).naive_local(),
        }
    }
}

impl fmt::Display for LeagueZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            LeagueZone::Local => write!(f, "local"),
            LeagueZone::Fixed(minutes) => write!(f, "UTC{}", Self::fixed(minutes)),
        }
    }
}

/// League-local time settings for the scoring lock window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub zone: LeagueZone,
    /// Local hour the scoring window opens
    pub unlock_hour: u32,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            zone: LeagueZone::default(),
            unlock_hour: UNLOCK_HOUR,
        }
    }
}

impl LockConfig {
    pub fn is_locked(&self, ctx: &LockContext, now: DateTime<Utc>) -> bool {
        match self.zone {
            LeagueZone::Local => is_locked_with_hour(ctx, &Local, now, self.unlock_hour),
            LeagueZone::Fixed(minutes) => {
                is_locked_with_hour(ctx, &LeagueZone::fixed(minutes), now, self.unlock_hour)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub lock: LockConfig,
    /// Age after which an unconfirmed optimistic rack is treated as failed
    pub pending_timeout_ms: u64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            pending_timeout_ms: 10_000,
        }
    }
}
