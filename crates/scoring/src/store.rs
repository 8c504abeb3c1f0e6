//! Data store boundary.
//!
//! Match, set and rack records are owned by the store. The scorer only reads
//! them and submits writes; it never caches them as truth.

use async_trait::async_trait;
use league_core::{
    Discipline, Match, MatchId, OutcomeTallies, PlayerId, PlayerRating, PlayerSlot, Rack,
    SetStatus,
};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Everything a set finalization writes, submitted as one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizeRequest {
    pub match_id: MatchId,
    pub discipline: Discipline,
    pub winner: PlayerSlot,
    /// Rating change per player, indexed by [`PlayerSlot::idx`]
    pub deltas: [f64; 2],
    /// Rack wins/losses and outcome counts per player
    pub tallies: [OutcomeTallies; 2],
}

impl FinalizeRequest {
    pub fn racks_in_set(&self) -> u32 {
        self.tallies[0].racks_won + self.tallies[0].racks_lost
    }
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Match with its sets. Racks are not included; see [`MatchStore::read_racks`].
    async fn read_match(&self, id: MatchId) -> StoreResult<Match>;

    /// All racks of a match, both disciplines, in recording order.
    async fn read_racks(&self, match_id: MatchId) -> StoreResult<Vec<Rack>>;

    /// Persist a new rack. Returns the stored row with its confirmed key.
    async fn append_rack(&self, match_id: MatchId, rack: Rack) -> StoreResult<Rack>;

    async fn update_set_score(
        &self,
        match_id: MatchId,
        discipline: Discipline,
        wins: [u32; 2],
        status: SetStatus,
    ) -> StoreResult<()>;

    /// Atomically close a set and apply both rating deltas.
    ///
    /// Must reject a repeat call for a set that is already finalized without
    /// touching any rating.
    async fn finalize_set(&self, request: FinalizeRequest) -> StoreResult<()>;

    async fn read_rating_state(&self, player: &PlayerId) -> StoreResult<f64>;

    async fn read_racks_played(&self, player: &PlayerId) -> StoreResult<u32>;

    async fn read_player_rating(&self, player: &PlayerId) -> StoreResult<PlayerRating> {
        Ok(PlayerRating {
            rating: self.read_rating_state(player).await?,
            racks_played: self.read_racks_played(player).await?,
        })
    }
}
