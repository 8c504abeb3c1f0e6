//! Match reports: per-set score, winner, rating change and outcome tallies

use std::path::Path;

use league_core::{Discipline, Match, MatchId, OutcomeTallies, PlayerId, PlayerSlot, SetStatus};
use serde::{Deserialize, Serialize};

use crate::error::PersistError;
use crate::ratings::RatingBook;

/// Report for a whole match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchReport {
    pub match_id: MatchId,
    pub session: String,
    pub players: [PlayerId; 2],
    pub sets: Vec<SetReport>,
}

/// One set within the report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetReport {
    pub discipline: Discipline,
    pub race: [u32; 2],
    pub wins: [u32; 2],
    pub status: SetStatus,
    pub winner: Option<PlayerId>,
    pub tallies: [OutcomeTallies; 2],
    /// Applied rating changes; `None` until the set is finalized
    pub deltas: Option<[f64; 2]>,
}

impl MatchReport {
    /// Build from a match with its racks loaded, pulling applied deltas from `book`.
    pub fn new(m: &Match, book: &RatingBook) -> Self {
        let sets = m
            .sets
            .iter()
            .map(|set| {
                let applied = |slot: PlayerSlot| {
                    book.history
                        .iter()
                        .find(|c| {
                            c.match_id == m.id
                                && c.discipline == set.discipline
                                && &c.player == m.player(slot)
                        })
                        .map(|c| c.delta)
                };
                let deltas = match (applied(PlayerSlot::One), applied(PlayerSlot::Two)) {
                    (Some(one), Some(two)) => Some([one, two]),
                    _ => None,
                };
                SetReport {
                    discipline: set.discipline,
                    race: [set.race.one, set.race.two],
                    wins: set.wins,
                    status: set.status,
                    winner: set.winner.map(|slot| m.player(slot).clone()),
                    tallies: PlayerSlot::BOTH.map(|slot| set.tallies(slot)),
                    deltas,
                }
            })
            .collect();

        Self {
            match_id: m.id,
            session: m.session.clone(),
            players: m.players.clone(),
            sets,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Generate a text report
    pub fn generate_report(&self) -> String {
        let [one, two] = &self.players;
        let mut report = String::new();
        report.push_str(&format!("=== Match: {} vs {} ===\n", one, two));
        report.push_str(&format!("Session: {}\n\n", self.session));

        report.push_str(&format!(
            "{:<8} {:>7} {:>7} {:<12} {:>9} {:>9}\n",
            "Set", "Race", "Score", "Status", "Δ1", "Δ2"
        ));
        report.push_str(&"-".repeat(58));
        report.push('\n');

        for set in &self.sets {
            let (d1, d2) = match set.deltas {
                Some([a, b]) => (format!("{a:+.2}"), format!("{b:+.2}")),
                None => ("-".to_string(), "-".to_string()),
            };
            report.push_str(&format!(
                "{:<8} {:>7} {:>7} {:<12} {:>9} {:>9}\n",
                set.discipline.label(),
                format!("{}-{}", set.race[0], set.race[1]),
                format!("{}-{}", set.wins[0], set.wins[1]),
                format!("{:?}", set.status),
                d1,
                d2
            ));
        }

        report.push_str("\nHighlights:\n");
        for set in &self.sets {
            for (player, t) in self.players.iter().zip(set.tallies.iter()) {
                let highlights = [
                    ("break-and-run", t.break_and_runs),
                    ("rack-and-run", t.rack_and_runs),
                    ("early finish", t.early_finishes),
                    ("scratch on final ball", t.scratches_on_final_ball),
                    ("snap", t.snap_wins),
                    ("zip", t.zip_wins),
                ];
                let listed: Vec<String> = highlights
                    .iter()
                    .filter(|(_, n)| *n > 0)
                    .map(|(name, n)| format!("{n}x {name}"))
                    .collect();
                if !listed.is_empty() {
                    report.push_str(&format!(
                        "  {} {}: {}\n",
                        set.discipline.label(),
                        player,
                        listed.join(", ")
                    ));
                }
            }
        }

        report
    }

    /// Print report to stdout
    pub fn print_report(&self) {
        println!("{}", self.generate_report());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use league_core::{OutcomeTag, PlayerRating, RaceTarget, Rack, RackKey, RackSnapshot};

    fn played_match() -> Match {
        let mut m = Match::new(
            "week-2",
            [PlayerId::new("ana"), PlayerId::new("bo")],
            None,
            [RaceTarget::new(2, 2), RaceTarget::new(2, 2)],
        );
        let set = m.set_mut(Discipline::NineBall);
        for (seq, outcome) in [(1, OutcomeTag::SnapWin), (2, OutcomeTag::BreakAndRun)] {
            set.racks.push(Rack {
                key: RackKey::Local(seq as u64),
                discipline: Discipline::NineBall,
                sequence: seq,
                winner: PlayerSlot::Two,
                outcome,
                snapshot: RackSnapshot::capture([PlayerRating::default(); 2], PlayerSlot::Two),
                recorded_at: Utc::now(),
            });
        }
        set.wins = [0, 2];
        set.status = SetStatus::Finalized;
        set.winner = Some(PlayerSlot::Two);
        m
    }

    #[test]
    fn test_report_includes_applied_deltas() {
        let m = played_match();
        let mut book = RatingBook::new();
        book.apply(&PlayerId::new("ana"), m.id, Discipline::NineBall, -12.0, 2, Utc::now());
        book.apply(&PlayerId::new("bo"), m.id, Discipline::NineBall, 12.0, 2, Utc::now());

        let report = MatchReport::new(&m, &book);
        let nine = &report.sets[Discipline::NineBall.idx()];
        assert_eq!(nine.deltas, Some([-12.0, 12.0]));
        assert_eq!(nine.winner, Some(PlayerId::new("bo")));
        assert_eq!(nine.tallies[1].snap_wins, 1);
        assert_eq!(report.sets[Discipline::EightBall.idx()].deltas, None);

        let text = report.generate_report();
        assert!(text.contains("ana vs bo"));
        assert!(text.contains("+12.00"));
        assert!(text.contains("1x snap"));
    }
}
