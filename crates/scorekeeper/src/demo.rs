//! Simulated league night: one match scored at the table while a second
//! device follows along through the sync layer.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use league_core::{
    expected_win_probability, Clock, Discipline, Match, OutcomeTag, PlayerId, RaceTargets,
    SetStatus, SystemClock,
};
use live_sync::{BroadcastChannel, SyncRegistry, SyncStatus};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use scoring::{MatchReport, MatchScorer, MemoryStore, RatingBook};
use tracing::{info, warn};

use crate::config::AppConfig;

/// Probability that a rack ends with something other than a standard win
const SPECIAL_OUTCOME_RATE: f64 = 0.25;

#[derive(Debug, Clone, Default)]
pub struct DemoOptions {
    pub seed: Option<u64>,
    /// Directory for `match_report.json` and `ratings.json`
    pub save: Option<PathBuf>,
}

pub struct DemoOutcome {
    pub report: MatchReport,
    pub book: RatingBook,
    /// What the following device saw last
    pub follower: Match,
    pub follower_sync: SyncStatus,
}

fn pick_outcome(rng: &mut StdRng, discipline: Discipline) -> OutcomeTag {
    if !rng.gen_bool(SPECIAL_OUTCOME_RATE) {
        return OutcomeTag::Standard;
    }
    let specials: Vec<OutcomeTag> = OutcomeTag::ALL
        .into_iter()
        .filter(|t| *t != OutcomeTag::Standard && t.allowed_in(discipline))
        .collect();
    specials.choose(rng).copied().unwrap_or(OutcomeTag::Standard)
}

pub async fn run_demo(config: &AppConfig, options: &DemoOptions) -> Result<DemoOutcome> {
    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::with_clock(clock.clone()));

    let players = [PlayerId::new("ana"), PlayerId::new("bo")];
    store.seed_player(players[0].clone(), 540.0, 120)?;
    store.seed_player(players[1].clone(), 505.0, 40)?;
    let ratings = [540.0, 505.0];

    let races = Discipline::ALL.map(|d| config.race.race_targets(ratings[0], ratings[1], d));
    let today = config.lock.zone.local_time(Utc::now()).date();
    let mut new_match = Match::new("demo-night", players.clone(), Some(today), races);
    new_match.event = config.scoring.event;
    let match_id = store.insert_match(new_match)?;

    let scoring_config = config.scoring_config();
    let table = Arc::new(MatchScorer::load(store.clone(), clock.clone(), scoring_config, match_id).await?);
    let phone = Arc::new(MatchScorer::load(store.clone(), clock.clone(), scoring_config, match_id).await?);

    if table.is_locked() {
        info!(%match_id, "outside the scoring window, unlocking manually");
        store.set_manual_unlock(match_id, true)?;
        table.refresh().await?;
    }

    // Separate registries: the two scorers stand in for two devices
    let channel = Arc::new(BroadcastChannel::new(store.changes()));
    let table_sync = SyncRegistry::new(channel.clone(), config.sync);
    let phone_sync = SyncRegistry::new(channel.clone(), config.sync);
    let _table_handle = table_sync.attach(match_id, table.clone());
    let phone_handle = phone_sync.attach(match_id, phone.clone());

    let settle = config.sync.debounce() + Duration::from_millis(50);
    let p_one = expected_win_probability(ratings[0], ratings[1]);

    for discipline in Discipline::ALL {
        info!(discipline = discipline.label(), "set started");
        while table.set_view(discipline).status != SetStatus::RaceComplete {
            let winner = if rng.gen_bool(p_one) { &players[0] } else { &players[1] };
            let outcome = pick_outcome(&mut rng, discipline);
            if let Err(e) = table.record_rack(discipline, winner, outcome).await {
                warn!(error = %e, class = ?e.class(), "rack not recorded");
                return Err(e).context("recording rack");
            }
        }

        tokio::time::sleep(settle).await;
        let view = phone.set_view(discipline);
        info!(discipline = discipline.label(), score = ?view.wins, "follower caught up");

        let preview = table.preview_finalize(discipline)?;
        let snapshot = table.snapshot();
        info!(
            discipline = discipline.label(),
            winner = %snapshot.player(preview.winner),
            deltas = ?preview.deltas,
            "verify before finalize"
        );
        table
            .finalize(discipline)
            .await
            .with_context(|| format!("finalizing {}", discipline.label()))?;
    }

    tokio::time::sleep(settle).await;

    let book = store.rating_book()?;
    let report = MatchReport::new(&table.snapshot(), &book);
    if let Some(dir) = &options.save {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        report.save(&dir.join("match_report.json"))?;
        book.save(&dir.join("ratings.json"))?;
        info!(dir = %dir.display(), "saved report and ratings");
    }

    let outcome = DemoOutcome {
        report,
        book,
        follower: phone.snapshot(),
        follower_sync: phone_handle.status(),
    };
    table_sync.shutdown();
    phone_sync.shutdown();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use league_core::FixedRace;

    #[tokio::test(start_paused = true)]
    async fn test_demo_finalizes_both_sets() {
        let config = AppConfig {
            race: FixedRace {
                eight_ball: 3,
                nine_ball: 4,
            },
            ..Default::default()
        };
        let options = DemoOptions {
            seed: Some(7),
            save: None,
        };

        let outcome = run_demo(&config, &options).await.unwrap();
        for set in &outcome.report.sets {
            assert_eq!(set.status, SetStatus::Finalized);
            assert!(set.deltas.is_some());
            assert!(set.wins.iter().any(|&w| w == set.race[0]));
        }
        assert_eq!(outcome.book.history.len(), 4);

        // The follower learned about both finalizations through sync alone
        assert!(outcome
            .follower
            .sets
            .iter()
            .all(|s| s.status == SetStatus::Finalized));
        assert!(outcome.follower_sync.refresh_count >= 3);
    }

    #[test]
    fn test_outcomes_respect_discipline() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            assert!(pick_outcome(&mut rng, Discipline::EightBall).allowed_in(Discipline::EightBall));
            assert!(pick_outcome(&mut rng, Discipline::NineBall).allowed_in(Discipline::NineBall));
        }
    }
}
