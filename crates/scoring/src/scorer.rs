//! Match scorer: the per-match set state machine.
//!
//! Each set moves `not_started -> in_progress -> race_complete -> finalized`.
//! Racks are recorded optimistically: a local placeholder is shown at once and
//! replaced by the stored row when the write succeeds, or dropped when it fails.
//! Ratings are only touched by `finalize`, from the set-level aggregate.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use league_core::{
    set_rating_delta, Clock, Discipline, Match, MatchId, MatchStatus, OutcomeTag, PlayerId,
    PlayerRating, PlayerSlot, RaceTarget, Rack, RackKey, RackSnapshot, SetRatingInput, SetStatus,
};
use tracing::{debug, info, warn};

use crate::config::ScoringConfig;
use crate::error::{InvariantViolation, Result, ScoringError, StoreError};
use crate::store::{FinalizeRequest, MatchStore, StoreResult};

/// A rack shown locally while its write is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRack {
    pub key: RackKey,
    pub discipline: Discipline,
    /// Sequence the rack is expected to take once stored
    pub sequence: u32,
    pub winner: PlayerSlot,
    pub outcome: OutcomeTag,
    pub created_at: DateTime<Utc>,
}

/// What the UI renders for one set.
#[derive(Debug, Clone, PartialEq)]
pub struct SetView {
    pub discipline: Discipline,
    pub race: RaceTarget,
    /// Confirmed wins plus any pending racks
    pub wins: [u32; 2],
    pub status: SetStatus,
    pub winner: Option<PlayerSlot>,
    pub racks: Vec<Rack>,
    pub pending: Vec<PendingRack>,
    pub locked: bool,
}

struct ScorerState {
    /// Last state read from the store, racks included
    confirmed: Match,
    /// Ratings as of the last read
    current: [PlayerRating; 2],
    pending: Vec<PendingRack>,
    last_synced_at: Option<DateTime<Utc>>,
}

/// A stored rack and the set's score as written alongside it.
struct WrittenRack {
    rack: Rack,
    /// Every stored rack of the set, the new one included
    racks: Vec<Rack>,
    wins: [u32; 2],
    status: SetStatus,
}

/// Clears the busy flag when an action finishes, however it finishes.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct MatchScorer {
    match_id: MatchId,
    store: Arc<dyn MatchStore>,
    clock: Arc<dyn Clock>,
    config: ScoringConfig,
    state: Mutex<ScorerState>,
    busy: AtomicBool,
    next_local: AtomicU64,
}

impl MatchScorer {
    /// Read the match and both players' ratings, and start tracking it.
    pub async fn load(
        store: Arc<dyn MatchStore>,
        clock: Arc<dyn Clock>,
        config: ScoringConfig,
        match_id: MatchId,
    ) -> StoreResult<Self> {
        let (confirmed, current) = fetch(store.as_ref(), match_id).await?;
        let now = clock.now();
        Ok(Self {
            match_id,
            store,
            clock,
            config,
            state: Mutex::new(ScorerState {
                confirmed,
                current,
                pending: Vec::new(),
                last_synced_at: Some(now),
            }),
            busy: AtomicBool::new(false),
            next_local: AtomicU64::new(1),
        })
    }

    fn state(&self) -> MutexGuard<'_, ScorerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(ScoringError::Busy);
        }
        Ok(BusyGuard(&self.busy))
    }

    pub fn match_id(&self) -> MatchId {
        self.match_id
    }

    /// True while a record or finalize call is in flight.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.state().last_synced_at
    }

    /// Copy of the last confirmed match state.
    pub fn snapshot(&self) -> Match {
        self.state().confirmed.clone()
    }

    pub fn is_set_locked(&self, discipline: Discipline) -> bool {
        let st = self.state();
        self.set_locked(&st.confirmed, discipline, self.clock.now())
    }

    /// Locked when neither set is open for scoring.
    pub fn is_locked(&self) -> bool {
        let st = self.state();
        let now = self.clock.now();
        Discipline::ALL
            .into_iter()
            .all(|d| self.set_locked(&st.confirmed, d, now))
    }

    pub fn match_status(&self) -> MatchStatus {
        let st = self.state();
        let now = self.clock.now();
        let locked = Discipline::ALL
            .into_iter()
            .all(|d| self.set_locked(&st.confirmed, d, now));
        st.confirmed.status_given_lock(locked)
    }

    pub fn set_view(&self, discipline: Discipline) -> SetView {
        let st = self.state();
        let set = st.confirmed.set(discipline);

        // A placeholder whose sequence has since been confirmed is already in `racks`.
        let pending: Vec<PendingRack> = st
            .pending
            .iter()
            .filter(|p| p.discipline == discipline)
            .filter(|p| {
                !set.racks
                    .iter()
                    .any(|r| r.sequence == p.sequence && r.winner == p.winner && r.outcome == p.outcome)
            })
            .cloned()
            .collect();

        let mut wins = set.wins;
        for p in &pending {
            wins[p.winner.idx()] += 1;
        }
        let status = match set.status {
            SetStatus::Finalized => SetStatus::Finalized,
            _ => set.status_for(wins),
        };

        SetView {
            discipline,
            race: set.race,
            wins,
            status,
            winner: set.winner,
            racks: set.racks.clone(),
            pending,
            locked: self.set_locked(&st.confirmed, discipline, self.clock.now()),
        }
    }

    fn set_locked(&self, m: &Match, discipline: Discipline, now: DateTime<Utc>) -> bool {
        self.config.lock.is_locked(&m.lock_context(discipline), now)
    }

    /// Re-read the match from the store and replace the confirmed state.
    ///
    /// Failures are transient by nature: they are logged and left for the next
    /// poll or notification to retry.
    pub async fn refresh(&self) -> StoreResult<()> {
        let (confirmed, current) = match fetch(self.store.as_ref(), self.match_id).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(match_id = %self.match_id, error = %e, "refresh failed");
                return Err(e);
            }
        };

        let now = self.clock.now();
        let timeout = chrono::Duration::milliseconds(self.config.pending_timeout_ms as i64);
        let mut st = self.state();
        st.confirmed = confirmed;
        st.current = current;
        st.pending.retain(|p| {
            let alive = now - p.created_at < timeout;
            if !alive {
                warn!(match_id = %self.match_id, sequence = p.sequence, "unconfirmed rack timed out");
            }
            alive
        });
        st.last_synced_at = Some(now);
        debug!(match_id = %self.match_id, "refreshed");
        Ok(())
    }

    fn check_recordable(
        &self,
        m: &Match,
        discipline: Discipline,
        outcome: OutcomeTag,
        now: DateTime<Utc>,
    ) -> std::result::Result<(), InvariantViolation> {
        let status = m.set(discipline).status;
        if !status.accepts_racks() {
            return Err(InvariantViolation::SetClosed { discipline, status });
        }
        if self.set_locked(m, discipline, now) {
            return Err(InvariantViolation::Locked);
        }
        if !outcome.allowed_in(discipline) {
            return Err(InvariantViolation::OutcomeNotAllowed {
                outcome,
                discipline,
            });
        }
        Ok(())
    }

    /// Record one rack won by `winner`.
    ///
    /// Returns the stored rack. On a write failure the optimistic placeholder is
    /// rolled back and the error is returned for the UI to show.
    pub async fn record_rack(
        &self,
        discipline: Discipline,
        winner: &PlayerId,
        outcome: OutcomeTag,
    ) -> Result<Rack> {
        let _busy = self.acquire()?;
        let now = self.clock.now();

        let (slot, key) = {
            let mut st = self.state();
            let slot = st
                .confirmed
                .slot_of(winner)
                .ok_or_else(|| InvariantViolation::UnknownPlayer(winner.clone()))?;
            self.check_recordable(&st.confirmed, discipline, outcome, now)?;

            let key = RackKey::Local(self.next_local.fetch_add(1, Ordering::Relaxed));
            let sequence = st.confirmed.set(discipline).next_sequence();
            st.pending.push(PendingRack {
                key,
                discipline,
                sequence,
                winner: slot,
                outcome,
                created_at: now,
            });
            (slot, key)
        };

        let written = self.write_rack(discipline, slot, outcome, key, now).await;

        let mut st = self.state();
        st.pending.retain(|p| p.key != key);
        match written {
            Ok(WrittenRack {
                rack,
                racks,
                wins,
                status,
            }) => {
                let set = st.confirmed.set_mut(discipline);
                set.racks = racks;
                set.wins = wins;
                set.status = status;
                if st.confirmed.start_ratings.is_none() {
                    st.confirmed.start_ratings = Some(st.current);
                }
                info!(
                    match_id = %self.match_id,
                    discipline = ?discipline,
                    sequence = rack.sequence,
                    score = ?wins,
                    status = ?status,
                    "rack recorded"
                );
                Ok(rack)
            }
            Err(e) => {
                warn!(match_id = %self.match_id, discipline = ?discipline, error = %e, "rack rolled back");
                Err(e)
            }
        }
    }

    async fn write_rack(
        &self,
        discipline: Discipline,
        winner: PlayerSlot,
        outcome: OutcomeTag,
        key: RackKey,
        now: DateTime<Utc>,
    ) -> Result<WrittenRack> {
        // Authoritative counts, re-read right before computing the increment
        let fresh = self.store.read_match(self.match_id).await?;
        let mut racks: Vec<Rack> = self
            .store
            .read_racks(self.match_id)
            .await?
            .into_iter()
            .filter(|r| r.discipline == discipline)
            .collect();

        let set = fresh.set(discipline);
        if !set.status.accepts_racks() {
            return Err(InvariantViolation::SetClosed {
                discipline,
                status: set.status,
            }
            .into());
        }

        // Wins come from the rack rows, so a rack whose score update was lost
        // is still counted here
        let mut wins = [0, 0];
        for r in &racks {
            wins[r.winner.idx()] += 1;
        }
        if wins != set.wins {
            warn!(
                match_id = %self.match_id,
                discipline = ?discipline,
                stored = ?set.wins,
                counted = ?wins,
                "stored score behind rack rows"
            );
            let status = set.status_for(wins);
            if status == SetStatus::RaceComplete {
                self.store
                    .update_set_score(self.match_id, discipline, wins, status)
                    .await?;
                return Err(InvariantViolation::SetClosed { discipline, status }.into());
            }
        }

        let sequence = racks.iter().map(|r| r.sequence).max().unwrap_or(0) + 1;
        wins[winner.idx()] += 1;
        let status = set.status_for(wins);

        let current = self.state().current;
        let rack = Rack {
            key,
            discipline,
            sequence,
            winner,
            outcome,
            snapshot: RackSnapshot::capture(current, winner),
            recorded_at: now,
        };

        let stored = self.store.append_rack(self.match_id, rack).await?;
        self.store
            .update_set_score(self.match_id, discipline, wins, status)
            .await?;

        racks.push(stored.clone());
        racks.sort_by_key(|r| r.sequence);
        Ok(WrittenRack {
            rack: stored,
            racks,
            wins,
            status,
        })
    }

    /// The verify step: everything `finalize` would submit, without writing.
    pub fn preview_finalize(&self, discipline: Discipline) -> Result<FinalizeRequest> {
        let st = self.state();
        build_finalize(&st, self.match_id, discipline)
    }

    /// Close a race-complete set and apply both rating deltas in one request.
    ///
    /// Requires an explicit user confirmation upstream. On failure the set stays
    /// race-complete so the user can retry.
    pub async fn finalize(&self, discipline: Discipline) -> Result<FinalizeRequest> {
        let _busy = self.acquire()?;
        let request = {
            let st = self.state();
            build_finalize(&st, self.match_id, discipline)?
        };

        if let Err(e) = self.store.finalize_set(request.clone()).await {
            warn!(match_id = %self.match_id, discipline = ?discipline, error = %e, "finalize failed");
            if let StoreError::AlreadyFinalized { .. } = e {
                let mut st = self.state();
                st.confirmed.set_mut(discipline).status = SetStatus::Finalized;
            }
            return Err(e.into());
        }

        let mut st = self.state();
        let set = st.confirmed.set_mut(discipline);
        set.status = SetStatus::Finalized;
        set.winner = Some(request.winner);
        info!(
            match_id = %self.match_id,
            discipline = ?discipline,
            winner = ?request.winner,
            deltas = ?request.deltas,
            "set finalized"
        );
        Ok(request)
    }
}

fn build_finalize(
    st: &ScorerState,
    match_id: MatchId,
    discipline: Discipline,
) -> Result<FinalizeRequest> {
    let m = &st.confirmed;
    let set = m.set(discipline);
    match set.status {
        SetStatus::Finalized => return Err(InvariantViolation::AlreadyFinalized(discipline).into()),
        SetStatus::RaceComplete => {}
        status => return Err(InvariantViolation::NotReady { discipline, status }.into()),
    }
    let winner = set.leader().ok_or(InvariantViolation::Tied(discipline))?;

    let tallies = PlayerSlot::BOTH.map(|slot| set.tallies(slot));
    let start = m.start_ratings.unwrap_or(st.current);
    let deltas = PlayerSlot::BOTH.map(|slot| {
        let me = start[slot.idx()];
        let opp = start[slot.other().idx()];
        set_rating_delta(&SetRatingInput {
            my_rating: me.rating,
            opp_rating: opp.rating,
            racks_played: me.racks_played,
            racks_won: tallies[slot.idx()].racks_won,
            racks_lost: tallies[slot.idx()].racks_lost,
            event: m.event,
        })
    });

    Ok(FinalizeRequest {
        match_id,
        discipline,
        winner,
        deltas,
        tallies,
    })
}

/// Match with racks distributed into their sets, plus both players' ratings.
async fn fetch(store: &dyn MatchStore, match_id: MatchId) -> StoreResult<(Match, [PlayerRating; 2])> {
    let mut m = store.read_match(match_id).await?;
    let racks = store.read_racks(match_id).await?;
    for set in &mut m.sets {
        set.racks.clear();
    }
    for rack in racks {
        m.set_mut(rack.discipline).racks.push(rack);
    }
    for set in &mut m.sets {
        set.racks.sort_by_key(|r| r.sequence);
    }

    let one = store.read_player_rating(&m.players[0]).await?;
    let two = store.read_player_rating(&m.players[1]).await?;
    Ok((m, [one, two]))
}

#[cfg(test)]
#[path = "scorer_tests.rs"]
mod scorer_tests;
