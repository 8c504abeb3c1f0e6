//! Rating book: current rating and experience per player, plus change history

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use league_core::{Discipline, MatchId, PlayerId, PlayerRating};
use serde::{Deserialize, Serialize};

use crate::error::PersistError;

/// Ratings for every known player, as the store keeps them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RatingBook {
    pub ratings: HashMap<PlayerId, PlayerRating>,
    /// Applied changes, oldest first
    pub history: Vec<RatingChange>,
}

/// One applied set-level rating change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub player: PlayerId,
    pub match_id: MatchId,
    pub discipline: Discipline,
    pub before: f64,
    pub delta: f64,
    pub racks: u32,
    pub applied_at: DateTime<Utc>,
}

impl RatingBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Register a player with an explicit starting point.
    pub fn seed(&mut self, player: PlayerId, rating: f64, racks_played: u32) {
        self.ratings.insert(
            player,
            PlayerRating {
                rating,
                racks_played,
            },
        );
    }

    /// Rating state for a player; unknown players start at the initial rating.
    pub fn get(&self, player: &PlayerId) -> PlayerRating {
        self.ratings.get(player).copied().unwrap_or_default()
    }

    /// Apply a finalized set's delta and add its racks to the player's experience.
    pub fn apply(
        &mut self,
        player: &PlayerId,
        match_id: MatchId,
        discipline: Discipline,
        delta: f64,
        racks: u32,
        applied_at: DateTime<Utc>,
    ) {
        let entry = self.ratings.entry(player.clone()).or_default();
        let before = entry.rating;
        entry.rating += delta;
        entry.racks_played += racks;

        self.history.push(RatingChange {
            player: player.clone(),
            match_id,
            discipline,
            before,
            delta,
            racks,
            applied_at,
        });
    }

    /// Players sorted by rating, highest first
    pub fn leaderboard(&self) -> Vec<(PlayerId, f64, u32)> {
        let mut entries: Vec<_> = self
            .ratings
            .iter()
            .map(|(id, r)| (id.clone(), r.rating, r.racks_played))
            .collect();
        entries.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        entries
    }

    pub fn format_leaderboard(&self) -> String {
        let mut out = String::new();
        out.push_str("=== Leaderboard ===\n");
        out.push_str(&format!("{:<24} {:>8} {:>8}\n", "Player", "Rating", "Racks"));
        out.push_str(&"-".repeat(42));
        out.push('\n');
        for (id, rating, racks) in self.leaderboard() {
            out.push_str(&format!("{:<24} {:>8.1} {:>8}\n", id, rating, racks));
        }
        out
    }

    pub fn print_leaderboard(&self) {
        println!("\n{}", self.format_leaderboard());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use league_core::INITIAL_RATING;

    #[test]
    fn test_unknown_player_starts_at_initial() {
        let book = RatingBook::new();
        let state = book.get(&PlayerId::new("nobody"));
        assert_eq!(state.rating, INITIAL_RATING);
        assert_eq!(state.racks_played, 0);
    }

    #[test]
    fn test_apply_updates_rating_and_experience() {
        let mut book = RatingBook::new();
        let ana = PlayerId::new("ana");
        book.seed(ana.clone(), 540.0, 120);
        book.apply(
            &ana,
            MatchId::new(),
            Discipline::EightBall,
            -6.5,
            9,
            Utc::now(),
        );

        let state = book.get(&ana);
        assert!((state.rating - 533.5).abs() < 1e-9);
        assert_eq!(state.racks_played, 129);
        assert_eq!(book.history.len(), 1);
        assert_eq!(book.history[0].before, 540.0);
    }

    #[test]
    fn test_leaderboard_sorted_by_rating() {
        let mut book = RatingBook::new();
        book.seed(PlayerId::new("low"), 480.0, 10);
        book.seed(PlayerId::new("high"), 610.0, 10);
        book.seed(PlayerId::new("mid"), 500.0, 10);

        let names: Vec<_> = book.leaderboard().into_iter().map(|e| e.0 .0).collect();
        assert_eq!(names, vec!["high", "mid", "low"]);
        assert!(book.format_leaderboard().contains("high"));
    }
}
