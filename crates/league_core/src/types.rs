use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MatchId(pub Uuid);

impl MatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

/// Which side of a match a player sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerSlot {
    One,
    Two,
}

impl PlayerSlot {
    pub const BOTH: [PlayerSlot; 2] = [PlayerSlot::One, PlayerSlot::Two];

    pub fn other(self) -> PlayerSlot {
        match self {
            PlayerSlot::One => PlayerSlot::Two,
            PlayerSlot::Two => PlayerSlot::One,
        }
    }
    pub fn idx(self) -> usize {
        match self {
            PlayerSlot::One => 0,
            PlayerSlot::Two => 1,
        }
    }
}

/// Game discipline. Each match carries exactly one set per discipline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Discipline {
    EightBall,
    NineBall,
}

impl Discipline {
    pub const ALL: [Discipline; 2] = [Discipline::EightBall, Discipline::NineBall];

    pub fn idx(self) -> usize {
        match self {
            Discipline::EightBall => 0,
            Discipline::NineBall => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Discipline::EightBall => "8-ball",
            Discipline::NineBall => "9-ball",
        }
    }
}

/// How a rack was won. Exactly one tag per rack.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeTag {
    Standard,
    BreakAndRun,
    RackAndRun,
    /// Opponent pocketed the final ball early.
    EarlyFinish,
    /// Opponent scratched while shooting the final ball.
    ScratchOnFinalBall,
    /// Nine pocketed on the break.
    SnapWin,
    /// Won without the opponent taking a shot at the table.
    ZipWin,
}

impl OutcomeTag {
    pub const ALL: [OutcomeTag; 7] = [
        OutcomeTag::Standard,
        OutcomeTag::BreakAndRun,
        OutcomeTag::RackAndRun,
        OutcomeTag::EarlyFinish,
        OutcomeTag::ScratchOnFinalBall,
        OutcomeTag::SnapWin,
        OutcomeTag::ZipWin,
    ];

    pub fn allowed_in(self, discipline: Discipline) -> bool {
        match self {
            OutcomeTag::Standard
            | OutcomeTag::BreakAndRun
            | OutcomeTag::EarlyFinish
            | OutcomeTag::ScratchOnFinalBall => true,
            OutcomeTag::RackAndRun => discipline == Discipline::EightBall,
            OutcomeTag::SnapWin | OutcomeTag::ZipWin => discipline == Discipline::NineBall,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStatus {
    #[default]
    NotStarted,
    InProgress,
    RaceComplete,
    Finalized,
}

impl SetStatus {
    /// Racks may only be appended while the set is still being played.
    pub fn accepts_racks(self) -> bool {
        matches!(self, SetStatus::NotStarted | SetStatus::InProgress)
    }
}

/// Rack wins each player needs to take the set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaceTarget {
    pub one: u32,
    pub two: u32,
}

impl RaceTarget {
    pub fn new(one: u32, two: u32) -> Self {
        Self { one, two }
    }

    pub fn for_slot(&self, slot: PlayerSlot) -> u32 {
        match slot {
            PlayerSlot::One => self.one,
            PlayerSlot::Two => self.two,
        }
    }

    /// The first player whose win count has met their target, if any.
    pub fn reached_by(&self, wins: [u32; 2]) -> Option<PlayerSlot> {
        PlayerSlot::BOTH
            .into_iter()
            .find(|slot| wins[slot.idx()] >= self.for_slot(*slot))
    }
}

/// Identity of a rack row: a local placeholder until the store assigns an id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RackKey {
    Local(u64),
    Confirmed(Uuid),
}

impl RackKey {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, RackKey::Confirmed(_))
    }
}

/// Initial rating for a player with no history.
pub const INITIAL_RATING: f64 = 500.0;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRating {
    pub rating: f64,
    pub racks_played: u32,
}

impl Default for PlayerRating {
    fn default() -> Self {
        Self {
            rating: INITIAL_RATING,
            racks_played: 0,
        }
    }
}
