//! Core domain for head-to-head league matches.
//!
//! Apart from the clock, everything in this crate is pure: no I/O and no timers.
//! - Match, set and rack records
//! - Skill rating engine
//! - Scoring lock window

pub mod clock;
pub mod events;
pub mod lock_window;
pub mod model;
pub mod race;
pub mod rating;
pub mod types;

pub use clock::*;
pub use events::*;
pub use lock_window::*;
pub use model::*;
pub use race::*;
pub use rating::*;
pub use types::*;
