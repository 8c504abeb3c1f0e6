//! Race target lookup.
//!
//! Race targets come from a rating-based handicap chart maintained outside this
//! workspace; scoring only needs to know when a race is complete.

use serde::{Deserialize, Serialize};

use crate::types::{Discipline, RaceTarget};

pub trait RaceTargets: Send + Sync {
    fn race_targets(&self, rating_a: f64, rating_b: f64, discipline: Discipline) -> RaceTarget;
}

/// Same race for every pairing, per discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedRace {
    pub eight_ball: u32,
    pub nine_ball: u32,
}

impl Default for FixedRace {
    fn default() -> Self {
        Self {
            eight_ball: 5,
            nine_ball: 7,
        }
    }
}

impl RaceTargets for FixedRace {
    fn race_targets(&self, _rating_a: f64, _rating_b: f64, discipline: Discipline) -> RaceTarget {
        let race = match discipline {
            Discipline::EightBall => self.eight_ball,
            Discipline::NineBall => self.nine_ball,
        };
        RaceTarget::new(race, race)
    }
}
