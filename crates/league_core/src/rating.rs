//! Skill rating calculation
//!
//! Pure functions only. Ratings are mutated once per finalized set from the
//! set-level aggregate; per-rack deltas are computed for the audit trail only.

use serde::{Deserialize, Serialize};

use crate::types::{PlayerRating, PlayerSlot};

/// Racks played below which a player is provisional.
pub const PROVISIONAL_RACKS: u32 = 100;
/// Racks played below which a player is established (above it: stable).
pub const ESTABLISHED_RACKS: u32 = 300;

pub const K_PROVISIONAL: f64 = 28.0;
pub const K_ESTABLISHED: f64 = 20.0;
pub const K_STABLE: f64 = 14.0;

const OPPONENT_SCALING_MIN: f64 = 0.85;
const OPPONENT_SCALING_MAX: f64 = 1.15;
const SET_MODIFIER_MIN: f64 = 0.90;
const SET_MODIFIER_MAX: f64 = 1.10;

/// Probability that a player rated `rating_a` beats one rated `rating_b`.
pub fn expected_win_probability(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rating_b - rating_a) / 400.0))
}

/// Maximum swing per event, tiered by experience.
pub fn k_factor(racks_played: u32) -> f64 {
    if racks_played < PROVISIONAL_RACKS {
        K_PROVISIONAL
    } else if racks_played < ESTABLISHED_RACKS {
        K_ESTABLISHED
    } else {
        K_STABLE
    }
}

pub fn base_delta(actual: f64, expected: f64, k: f64) -> f64 {
    k * (actual - expected)
}

/// Rewards upsets and dampens farming of weaker opponents.
pub fn opponent_scaling(my_rating: f64, opp_rating: f64) -> f64 {
    (1.0 + (opp_rating - my_rating) / 1000.0).clamp(OPPONENT_SCALING_MIN, OPPONENT_SCALING_MAX)
}

/// Rack margin a player rated with `expected` win probability should produce
/// over `total_racks`.
pub fn expected_rack_diff(total_racks: u32, expected: f64) -> f64 {
    total_racks as f64 * (expected - (1.0 - expected))
}

/// Rewards winning a set by a wider margin than expected.
pub fn set_modifier(actual_rack_diff: f64, expected_rack_diff: f64) -> f64 {
    (1.0 + (actual_rack_diff - expected_rack_diff) / 20.0).clamp(SET_MODIFIER_MIN, SET_MODIFIER_MAX)
}

/// Competitive context of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[default]
    League,
    Playoffs,
    Tournament,
}

impl EventKind {
    pub fn weight(self) -> f64 {
        match self {
            EventKind::League => 1.00,
            EventKind::Playoffs => 1.05,
            EventKind::Tournament => 1.08,
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "league" => Ok(EventKind::League),
            "playoffs" | "playoff" => Ok(EventKind::Playoffs),
            "tournament" => Ok(EventKind::Tournament),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// Inputs for one player's rating change over a finished set.
///
/// `racks_played` is the count at the start of the set, so the K-factor does
/// not drift while the set is being scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetRatingInput {
    pub my_rating: f64,
    pub opp_rating: f64,
    pub racks_played: u32,
    pub racks_won: u32,
    pub racks_lost: u32,
    pub event: EventKind,
}

/// Breakdown of a set-level rating change, mostly for display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SetRatingBreakdown {
    pub expected: f64,
    pub k: f64,
    pub base: f64,
    pub opponent_scaling: f64,
    pub set_modifier: f64,
    pub event_weight: f64,
    pub delta: f64,
}

pub fn set_rating_breakdown(input: &SetRatingInput) -> SetRatingBreakdown {
    let expected = expected_win_probability(input.my_rating, input.opp_rating);
    let k = k_factor(input.racks_played);
    let actual = if input.racks_won > input.racks_lost { 1.0 } else { 0.0 };
    let base = base_delta(actual, expected, k);

    let total = input.racks_won + input.racks_lost;
    let actual_diff = input.racks_won as f64 - input.racks_lost as f64;
    let scaling = opponent_scaling(input.my_rating, input.opp_rating);
    let modifier = set_modifier(actual_diff, expected_rack_diff(total, expected));
    let weight = input.event.weight();

    SetRatingBreakdown {
        expected,
        k,
        base,
        opponent_scaling: scaling,
        set_modifier: modifier,
        event_weight: weight,
        delta: base * scaling * modifier * weight,
    }
}

/// Rating change for one player over a finished set.
pub fn set_rating_delta(input: &SetRatingInput) -> f64 {
    set_rating_breakdown(input).delta
}

/// Per-rack change, recorded for audit and history reconstruction only.
pub fn rack_rating_delta(my_rating: f64, opp_rating: f64, racks_played: u32, won: bool) -> f64 {
    let expected = expected_win_probability(my_rating, opp_rating);
    let actual = if won { 1.0 } else { 0.0 };
    base_delta(actual, expected, k_factor(racks_played)) * opponent_scaling(my_rating, opp_rating)
}

/// Ratings and expectation frozen onto a rack at the moment it is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RackSnapshot {
    pub ratings: [f64; 2],
    pub expected_one: f64,
    pub deltas: [f64; 2],
}

impl RackSnapshot {
    pub fn capture(players: [PlayerRating; 2], winner: PlayerSlot) -> Self {
        let [one, two] = players;
        let deltas = [
            rack_rating_delta(one.rating, two.rating, one.racks_played, winner == PlayerSlot::One),
            rack_rating_delta(two.rating, one.rating, two.racks_played, winner == PlayerSlot::Two),
        ];
        Self {
            ratings: [one.rating, two.rating],
            expected_one: expected_win_probability(one.rating, two.rating),
            deltas,
        }
    }
}

#[cfg(test)]
#[path = "rating_tests.rs"]
mod rating_tests;
