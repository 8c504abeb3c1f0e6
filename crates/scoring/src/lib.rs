//! Live scoring for head-to-head league matches
//!
//! This crate provides:
//! - The data store contract and an in-process implementation
//! - A per-match scorer that records racks and finalizes sets
//! - The rating book that finalized sets are applied to
//! - Match reports
//!
//! # Usage
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use league_core::{Discipline, Match, OutcomeTag, PlayerId, RaceTarget, SystemClock};
//! use scoring::{MatchScorer, MemoryStore, ScoringConfig};
//!
//! let store = Arc::new(MemoryStore::new());
//! let players = [PlayerId::new("ana"), PlayerId::new("bo")];
//! let races = [RaceTarget::new(5, 5), RaceTarget::new(7, 7)];
//! let id = store.insert_match(Match::new("week-1", players, None, races))?;
//!
//! let scorer = MatchScorer::load(store, Arc::new(SystemClock), ScoringConfig::default(), id).await?;
//! scorer
//!     .record_rack(Discipline::EightBall, &PlayerId::new("ana"), OutcomeTag::BreakAndRun)
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod memory;
mod ratings;
mod report;
mod scorer;
mod store;

pub use config::*;
pub use error::*;
pub use memory::*;
pub use ratings::*;
pub use report::*;
pub use scorer::*;
pub use store::*;
