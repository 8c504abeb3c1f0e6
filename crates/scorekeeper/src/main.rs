//! Scorekeeper CLI
//!
//! Run a simulated match, and work out rating changes and lock windows by hand.

mod config;
mod demo;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use league_core::{set_rating_breakdown, EventKind, LockContext, SetRatingInput, SetStatus};
use scoring::{LeagueZone, LockConfig, RatingBook};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;
use crate::demo::{run_demo, DemoOptions};

#[derive(Parser, Debug)]
#[command(name = "scorekeeper")]
#[command(about = "Live scoring and ratings for head-to-head pool league matches")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./scorekeeper.toml when present)
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score a simulated match while a second device follows along
    Demo {
        /// Seed for reproducible racks
        #[arg(long)]
        seed: Option<u64>,

        /// Write match_report.json and ratings.json into this directory
        #[arg(long, value_name = "DIR")]
        save: Option<PathBuf>,
    },

    /// Rating change for player A over a finished set against player B
    Rating {
        #[arg(long)]
        a: f64,
        #[arg(long)]
        b: f64,
        /// Player A's racks played before the set
        #[arg(long, default_value_t = 0)]
        racks_played_a: u32,
        /// Racks won by A
        #[arg(long)]
        won: u32,
        /// Racks lost by A
        #[arg(long)]
        lost: u32,
        /// league, playoffs or tournament
        #[arg(long, default_value = "league")]
        event: EventKind,
    },

    /// Whether scoring is locked for a match scheduled on DATE
    Lock {
        /// Scheduled date, YYYY-MM-DD
        #[arg(long)]
        date: NaiveDate,
        /// Instant to evaluate, RFC 3339 (defaults to now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// League timezone offset in minutes (overrides config)
        #[arg(long, allow_negative_numbers = true, conflicts_with = "local")]
        utc_offset: Option<i32>,
        /// Use this machine's timezone, daylight saving included (overrides config)
        #[arg(long)]
        local: bool,
        #[arg(long)]
        manual_unlock: bool,
        /// Either set already has a score
        #[arg(long)]
        started: bool,
    },

    /// Print a saved rating book
    Leaderboard {
        #[arg(long, default_value = "ratings.json")]
        file: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_rating(input: SetRatingInput) {
    let b = set_rating_breakdown(&input);
    println!("=== Set rating change ===");
    println!("Expected win probability: {:.3}", b.expected);
    println!("K-factor:                 {:.0}", b.k);
    println!("Base delta:               {:+.2}", b.base);
    println!("Opponent scaling:         {:.3}", b.opponent_scaling);
    println!("Set modifier:             {:.3}", b.set_modifier);
    println!("Event weight:             {:.2}", b.event_weight);
    println!("Delta:                    {:+.2}", b.delta);
}

fn print_lock(date: NaiveDate, now: DateTime<Utc>, lock: LockConfig, manual_unlock: bool, started: bool) {
    let ctx = LockContext {
        scheduled_date: Some(date),
        manual_unlock,
        set_status: SetStatus::NotStarted,
        has_started: started,
    };
    let locked = lock.is_locked(&ctx, now);
    println!(
        "{} at {} ({}): {}",
        date,
        lock.zone.local_time(now).format("%Y-%m-%d %H:%M"),
        lock.zone,
        if locked { "locked" } else { "unlocked" }
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Demo { seed, save } => {
            info!(?seed, "starting demo");
            let outcome = run_demo(&config, &DemoOptions { seed, save }).await?;
            outcome.report.print_report();
            outcome.book.print_leaderboard();
        }
        Command::Rating {
            a,
            b,
            racks_played_a,
            won,
            lost,
            event,
        } => print_rating(SetRatingInput {
            my_rating: a,
            opp_rating: b,
            racks_played: racks_played_a,
            racks_won: won,
            racks_lost: lost,
            event,
        }),
        Command::Lock {
            date,
            now,
            utc_offset,
            local,
            manual_unlock,
            started,
        } => {
            let mut lock = config.lock;
            if let Some(minutes) = utc_offset {
                lock.zone = LeagueZone::Fixed(minutes);
            }
            if local {
                lock.zone = LeagueZone::Local;
            }
            print_lock(date, now.unwrap_or_else(Utc::now), lock, manual_unlock, started);
        }
        Command::Leaderboard { file } => {
            let book = RatingBook::load(&file)
                .with_context(|| format!("loading rating book from {}", file.display()))?;
            book.print_leaderboard();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from([
            "scorekeeper",
            "rating",
            "--a",
            "550",
            "--b",
            "500",
            "--won",
            "5",
            "--lost",
            "3",
            "--event",
            "playoffs",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Command::Rating {
                event: EventKind::Playoffs,
                racks_played_a: 0,
                ..
            }
        ));

        let cli = Cli::try_parse_from([
            "scorekeeper",
            "-v",
            "lock",
            "--date",
            "2026-10-16",
            "--utc-offset",
            "-300",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Command::Lock {
                utc_offset: Some(-300),
                ..
            }
        ));
    }

    #[test]
    fn test_zone_flags_conflict() {
        let parsed = Cli::try_parse_from([
            "scorekeeper", "lock", "--date", "2026-10-16", "--utc-offset", "60", "--local",
        ]);
        assert!(parsed.is_err());

        let cli = Cli::try_parse_from(["scorekeeper", "lock", "--date", "2026-10-16", "--local"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Lock {
                local: true,
                utc_offset: None,
                ..
            }
        ));
    }

    #[test]
    fn test_unknown_event_rejected() {
        let parsed = Cli::try_parse_from([
            "scorekeeper", "rating", "--a", "1", "--b", "1", "--won", "1", "--lost", "0", "--event",
            "exhibition",
        ]);
        assert!(parsed.is_err());
    }
}
