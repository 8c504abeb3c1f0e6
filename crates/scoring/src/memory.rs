//! In-process data store.
//!
//! A complete implementation of [`MatchStore`] backed by hash maps. Every
//! mutation is applied under a single lock, which makes `finalize_set` atomic,
//! and is announced on a broadcast channel of [`ChangeNotice`]s.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use league_core::{
    ChangeKind, ChangeNotice, Clock, Discipline, Match, MatchId, PlayerId, PlayerSlot, Rack,
    RackKey, SetStatus, SystemClock, Topic,
};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::ratings::RatingBook;
use crate::store::{FinalizeRequest, MatchStore, StoreResult};

const NOTICE_CAPACITY: usize = 256;

#[derive(Default)]
struct Inner {
    matches: HashMap<MatchId, Match>,
    racks: HashMap<MatchId, Vec<Rack>>,
    book: RatingBook,
    failing_reads: u32,
    failing_writes: u32,
}

impl Inner {
    fn match_mut(&mut self, id: MatchId) -> StoreResult<&mut Match> {
        self.matches
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("match {id}")))
    }

    fn take_read_fault(&mut self) -> StoreResult<()> {
        if self.failing_reads > 0 {
            self.failing_reads -= 1;
            return Err(StoreError::Transient("injected read failure".into()));
        }
        Ok(())
    }

    fn take_write_fault(&mut self) -> StoreResult<()> {
        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(StoreError::Rejected("injected write failure".into()));
        }
        Ok(())
    }
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
    changes: broadcast::Sender<ChangeNotice>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let (changes, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            inner: Mutex::new(Inner::default()),
            changes,
            clock,
        }
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Transient("store lock poisoned".into()))
    }

    fn notify(&self, match_id: MatchId, kind: ChangeKind, table: &str) {
        // No receivers is fine: nobody is watching this store yet.
        let _ = self.changes.send(ChangeNotice {
            topic: Topic::for_match(match_id),
            kind,
            table: table.to_string(),
        });
    }

    /// Feed of every mutation, for event channels layered on this store.
    pub fn changes(&self) -> broadcast::Sender<ChangeNotice> {
        self.changes.clone()
    }

    pub fn insert_match(&self, mut m: Match) -> StoreResult<MatchId> {
        let id = m.id;
        let racks: Vec<Rack> = m.sets.iter_mut().flat_map(|s| s.racks.drain(..)).collect();
        {
            let mut inner = self.lock()?;
            inner.matches.insert(id, m);
            inner.racks.insert(id, racks);
        }
        self.notify(id, ChangeKind::Insert, "matches");
        Ok(id)
    }

    pub fn remove_match(&self, id: MatchId) -> StoreResult<()> {
        {
            let mut inner = self.lock()?;
            inner
                .matches
                .remove(&id)
                .ok_or_else(|| StoreError::NotFound(format!("match {id}")))?;
            inner.racks.remove(&id);
        }
        self.notify(id, ChangeKind::Delete, "matches");
        Ok(())
    }

    pub fn seed_player(&self, player: PlayerId, rating: f64, racks_played: u32) -> StoreResult<()> {
        self.lock()?.book.seed(player, rating, racks_played);
        Ok(())
    }

    pub fn set_manual_unlock(&self, id: MatchId, unlocked: bool) -> StoreResult<()> {
        self.lock()?.match_mut(id)?.manual_unlock = unlocked;
        self.notify(id, ChangeKind::Update, "matches");
        Ok(())
    }

    pub fn rating_book(&self) -> StoreResult<RatingBook> {
        Ok(self.lock()?.book.clone())
    }

    /// The next `n` reads fail with a transient error.
    pub fn fail_next_reads(&self, n: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_reads = n;
        }
    }

    /// The next `n` writes are rejected.
    pub fn fail_next_writes(&self, n: u32) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.failing_writes = n;
        }
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn read_match(&self, id: MatchId) -> StoreResult<Match> {
        let mut inner = self.lock()?;
        inner.take_read_fault()?;
        inner
            .matches
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("match {id}")))
    }

    async fn read_racks(&self, match_id: MatchId) -> StoreResult<Vec<Rack>> {
        let mut inner = self.lock()?;
        inner.take_read_fault()?;
        inner
            .racks
            .get(&match_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("racks of match {match_id}")))
    }

    async fn append_rack(&self, match_id: MatchId, mut rack: Rack) -> StoreResult<Rack> {
        {
            let mut inner = self.lock()?;
            inner.take_write_fault()?;

            let players = inner.match_mut(match_id)?.players.clone();
            let ratings = [inner.book.get(&players[0]), inner.book.get(&players[1])];
            let m = inner.match_mut(match_id)?;
            let status = m.set(rack.discipline).status;
            if !status.accepts_racks() {
                return Err(StoreError::Rejected(format!(
                    "{:?} set is {:?}",
                    rack.discipline, status
                )));
            }
            if m.start_ratings.is_none() {
                m.start_ratings = Some(ratings);
            }

            let racks = inner.racks.entry(match_id).or_default();
            if racks
                .iter()
                .any(|r| r.discipline == rack.discipline && r.sequence == rack.sequence)
            {
                return Err(StoreError::Rejected(format!(
                    "rack {} already recorded",
                    rack.sequence
                )));
            }
            rack.key = RackKey::Confirmed(Uuid::new_v4());
            racks.push(rack.clone());
        }
        self.notify(match_id, ChangeKind::Insert, "racks");
        Ok(rack)
    }

    async fn update_set_score(
        &self,
        match_id: MatchId,
        discipline: Discipline,
        wins: [u32; 2],
        status: SetStatus,
    ) -> StoreResult<()> {
        {
            let mut inner = self.lock()?;
            inner.take_write_fault()?;
            let set = inner.match_mut(match_id)?.set_mut(discipline);
            if set.status == SetStatus::Finalized {
                return Err(StoreError::AlreadyFinalized {
                    match_id,
                    discipline,
                });
            }
            set.wins = wins;
            set.status = status;
        }
        self.notify(match_id, ChangeKind::Update, "matches");
        Ok(())
    }

    async fn finalize_set(&self, request: FinalizeRequest) -> StoreResult<()> {
        let now = self.clock.now();
        {
            let mut inner = self.lock()?;
            inner.take_write_fault()?;

            let m = inner.match_mut(request.match_id)?;
            let set = m.set_mut(request.discipline);
            match set.status {
                SetStatus::Finalized => {
                    return Err(StoreError::AlreadyFinalized {
                        match_id: request.match_id,
                        discipline: request.discipline,
                    });
                }
                SetStatus::RaceComplete => {}
                other => {
                    return Err(StoreError::Rejected(format!(
                        "{:?} set is {:?}, not race complete",
                        request.discipline, other
                    )));
                }
            }
            set.status = SetStatus::Finalized;
            set.winner = Some(request.winner);
            let players = m.players.clone();

            let racks = request.racks_in_set();
            for slot in PlayerSlot::BOTH {
                inner.book.apply(
                    &players[slot.idx()],
                    request.match_id,
                    request.discipline,
                    request.deltas[slot.idx()],
                    racks,
                    now,
                );
            }
        }
        debug!(match_id = %request.match_id, discipline = ?request.discipline, "set finalized");
        self.notify(request.match_id, ChangeKind::Update, "matches");
        Ok(())
    }

    async fn read_rating_state(&self, player: &PlayerId) -> StoreResult<f64> {
        let mut inner = self.lock()?;
        inner.take_read_fault()?;
        Ok(inner.book.get(player).rating)
    }

    async fn read_racks_played(&self, player: &PlayerId) -> StoreResult<u32> {
        let mut inner = self.lock()?;
        inner.take_read_fault()?;
        Ok(inner.book.get(player).racks_played)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
