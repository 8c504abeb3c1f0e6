//! Match, set and rack records as the data store holds them.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::lock_window::{is_locked, LockContext};
use crate::rating::{EventKind, RackSnapshot};
use crate::types::{
    Discipline, MatchId, OutcomeTag, PlayerId, PlayerRating, PlayerSlot, RaceTarget, RackKey,
    SetStatus,
};

/// A single scored game within a set. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rack {
    pub key: RackKey,
    pub discipline: Discipline,
    /// 1-based, increasing within its set
    pub sequence: u32,
    pub winner: PlayerSlot,
    pub outcome: OutcomeTag,
    pub snapshot: RackSnapshot,
    pub recorded_at: DateTime<Utc>,
}

/// Per-player counts derived from a set's racks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTallies {
    pub racks_won: u32,
    pub racks_lost: u32,
    pub break_and_runs: u32,
    pub rack_and_runs: u32,
    pub early_finishes: u32,
    pub scratches_on_final_ball: u32,
    pub snap_wins: u32,
    pub zip_wins: u32,
}

impl OutcomeTallies {
    pub fn from_racks<'a>(racks: impl IntoIterator<Item = &'a Rack>, slot: PlayerSlot) -> Self {
        let mut tallies = Self::default();
        for rack in racks {
            if rack.winner != slot {
                tallies.racks_lost += 1;
                continue;
            }
            tallies.racks_won += 1;
            match rack.outcome {
                OutcomeTag::Standard => {}
                OutcomeTag::BreakAndRun => tallies.break_and_runs += 1,
                OutcomeTag::RackAndRun => tallies.rack_and_runs += 1,
                OutcomeTag::EarlyFinish => tallies.early_finishes += 1,
                OutcomeTag::ScratchOnFinalBall => tallies.scratches_on_final_ball += 1,
                OutcomeTag::SnapWin => tallies.snap_wins += 1,
                OutcomeTag::ZipWin => tallies.zip_wins += 1,
            }
        }
        tallies
    }
}

/// One discipline's race within a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSet {
    pub discipline: Discipline,
    pub race: RaceTarget,
    pub wins: [u32; 2],
    pub status: SetStatus,
    pub winner: Option<PlayerSlot>,
    pub racks: Vec<Rack>,
}

impl GameSet {
    pub fn new(discipline: Discipline, race: RaceTarget) -> Self {
        Self {
            discipline,
            race,
            wins: [0, 0],
            status: SetStatus::NotStarted,
            winner: None,
            racks: Vec::new(),
        }
    }

    pub fn has_score(&self) -> bool {
        self.wins.iter().any(|&w| w > 0)
    }

    /// Status implied by a score, for a set that has not been finalized.
    pub fn status_for(&self, wins: [u32; 2]) -> SetStatus {
        if self.race.reached_by(wins).is_some() {
            SetStatus::RaceComplete
        } else if wins.iter().any(|&w| w > 0) {
            SetStatus::InProgress
        } else {
            SetStatus::NotStarted
        }
    }

    /// Player with more rack wins, `None` on a tie.
    pub fn leader(&self) -> Option<PlayerSlot> {
        let [one, two] = self.wins;
        match one.cmp(&two) {
            std::cmp::Ordering::Greater => Some(PlayerSlot::One),
            std::cmp::Ordering::Less => Some(PlayerSlot::Two),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn next_sequence(&self) -> u32 {
        self.racks.iter().map(|r| r.sequence).max().unwrap_or(0) + 1
    }

    pub fn tallies(&self, slot: PlayerSlot) -> OutcomeTallies {
        OutcomeTallies::from_racks(&self.racks, slot)
    }
}

/// Scheduling status as entered by league staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    #[default]
    Scheduled,
    Postponed,
    Cancelled,
}

/// Status shown to observers, derived from the sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Scheduled,
    Locked,
    Postponed,
    Cancelled,
    InProgress,
    Finalized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    /// Parent league night / competitive session
    pub session: String,
    pub players: [PlayerId; 2],
    pub scheduled_date: Option<NaiveDate>,
    pub schedule_status: ScheduleStatus,
    pub manual_unlock: bool,
    pub event: EventKind,
    /// Ratings frozen when the first rack of the match was recorded
    pub start_ratings: Option<[PlayerRating; 2]>,
    /// Indexed by [`Discipline::idx`]
    pub sets: [GameSet; 2],
}

impl Match {
    pub fn new(
        session: impl Into<String>,
        players: [PlayerId; 2],
        scheduled_date: Option<NaiveDate>,
        races: [RaceTarget; 2],
    ) -> Self {
        Self {
            id: MatchId::new(),
            session: session.into(),
            players,
            scheduled_date,
            schedule_status: ScheduleStatus::Scheduled,
            manual_unlock: false,
            event: EventKind::League,
            start_ratings: None,
            sets: [
                GameSet::new(Discipline::EightBall, races[0]),
                GameSet::new(Discipline::NineBall, races[1]),
            ],
        }
    }

    pub fn set(&self, discipline: Discipline) -> &GameSet {
        &self.sets[discipline.idx()]
    }

    pub fn set_mut(&mut self, discipline: Discipline) -> &mut GameSet {
        &mut self.sets[discipline.idx()]
    }

    pub fn player(&self, slot: PlayerSlot) -> &PlayerId {
        &self.players[slot.idx()]
    }

    pub fn slot_of(&self, player: &PlayerId) -> Option<PlayerSlot> {
        PlayerSlot::BOTH
            .into_iter()
            .find(|slot| &self.players[slot.idx()] == player)
    }

    pub fn has_started(&self) -> bool {
        self.sets.iter().any(GameSet::has_score)
    }

    pub fn lock_context(&self, discipline: Discipline) -> LockContext {
        LockContext {
            scheduled_date: self.scheduled_date,
            manual_unlock: self.manual_unlock,
            set_status: self.set(discipline).status,
            has_started: self.has_started(),
        }
    }

    pub fn is_set_locked<Tz: TimeZone>(
        &self,
        discipline: Discipline,
        tz: &Tz,
        now: DateTime<Utc>,
    ) -> bool {
        is_locked(&self.lock_context(discipline), tz, now)
    }

    /// Locked when no set is currently open for scoring.
    pub fn is_locked<Tz: TimeZone>(&self, tz: &Tz, now: DateTime<Utc>) -> bool {
        Discipline::ALL
            .into_iter()
            .all(|d| self.is_set_locked(d, tz, now))
    }

    pub fn derived_status<Tz: TimeZone>(&self, tz: &Tz, now: DateTime<Utc>) -> MatchStatus {
        self.status_given_lock(self.is_locked(tz, now))
    }

    /// Observer-facing status, given whether the lock window currently applies.
    pub fn status_given_lock(&self, locked: bool) -> MatchStatus {
        if self.sets.iter().all(|s| s.status == SetStatus::Finalized) {
            return MatchStatus::Finalized;
        }
        if self.has_started() {
            return MatchStatus::InProgress;
        }
        match self.schedule_status {
            ScheduleStatus::Scheduled if locked => MatchStatus::Locked,
            ScheduleStatus::Scheduled => MatchStatus::Scheduled,
            ScheduleStatus::Postponed => MatchStatus::Postponed,
            ScheduleStatus::Cancelled => MatchStatus::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate};

    fn rack(seq: u32, winner: PlayerSlot, outcome: OutcomeTag) -> Rack {
        Rack {
            key: RackKey::Local(seq as u64),
            discipline: Discipline::NineBall,
            sequence: seq,
            winner,
            outcome,
            snapshot: RackSnapshot::capture([PlayerRating::default(); 2], winner),
            recorded_at: Utc::now(),
        }
    }

    fn sample_match() -> Match {
        Match::new(
            "week-3",
            [PlayerId::new("ana"), PlayerId::new("bo")],
            NaiveDate::from_ymd_opt(2026, 3, 10),
            [RaceTarget::new(5, 4), RaceTarget::new(7, 6)],
        )
    }

    #[test]
    fn test_tallies_filter_by_winner() {
        let racks = vec![
            rack(1, PlayerSlot::One, OutcomeTag::SnapWin),
            rack(2, PlayerSlot::Two, OutcomeTag::BreakAndRun),
            rack(3, PlayerSlot::One, OutcomeTag::Standard),
            rack(4, PlayerSlot::One, OutcomeTag::ZipWin),
        ];
        let one = OutcomeTallies::from_racks(&racks, PlayerSlot::One);
        assert_eq!(one.racks_won, 3);
        assert_eq!(one.racks_lost, 1);
        assert_eq!(one.snap_wins, 1);
        assert_eq!(one.zip_wins, 1);
        assert_eq!(one.break_and_runs, 0);

        let two = OutcomeTallies::from_racks(&racks, PlayerSlot::Two);
        assert_eq!(two.racks_won, 1);
        assert_eq!(two.break_and_runs, 1);
    }

    #[test]
    fn test_set_status_from_score() {
        let set = GameSet::new(Discipline::EightBall, RaceTarget::new(3, 2));
        assert_eq!(set.status_for([0, 0]), SetStatus::NotStarted);
        assert_eq!(set.status_for([2, 1]), SetStatus::InProgress);
        assert_eq!(set.status_for([1, 2]), SetStatus::RaceComplete);
        assert_eq!(set.status_for([3, 0]), SetStatus::RaceComplete);
    }

    #[test]
    fn test_derived_status() {
        let tz = FixedOffset::east_opt(0).unwrap();
        let during = NaiveDate::from_ymd_opt(2026, 3, 10)
            .unwrap()
            .and_hms_opt(19, 0, 0)
            .unwrap()
            .and_utc();
        let week_before = during - chrono::Duration::days(7);

        let mut m = sample_match();
        assert_eq!(m.derived_status(&tz, during), MatchStatus::Scheduled);
        assert_eq!(m.derived_status(&tz, week_before), MatchStatus::Locked);

        m.schedule_status = ScheduleStatus::Postponed;
        assert_eq!(m.derived_status(&tz, during), MatchStatus::Postponed);

        m.set_mut(Discipline::NineBall).wins = [1, 0];
        assert_eq!(m.derived_status(&tz, week_before), MatchStatus::InProgress);

        for set in &mut m.sets {
            set.status = SetStatus::Finalized;
        }
        assert_eq!(m.derived_status(&tz, during), MatchStatus::Finalized);
    }

    #[test]
    fn test_slot_lookup() {
        let m = sample_match();
        assert_eq!(m.slot_of(&PlayerId::new("bo")), Some(PlayerSlot::Two));
        assert_eq!(m.slot_of(&PlayerId::new("cy")), None);
        assert_eq!(m.player(PlayerSlot::One), &PlayerId::new("ana"));
    }
}
