//! Live synchronization for viewed matches
//!
//! Keeps every viewer of a match fresh:
//! - Change notices trigger a debounced refresh
//! - Repeated channel failures trip a one-way switch to fixed-interval polling
//! - A coarse safety-net poll runs regardless of channel health
//!
//! Sessions are shared per match through [`SyncRegistry`], and the bookkeeping
//! behind each one lives in [`SubscriptionSession`], which has no timers of its own.

mod channel;
mod config;
mod driver;
mod error;
mod registry;
mod session;
mod target;

pub use channel::*;
pub use config::*;
pub use driver::SyncStatus;
pub use error::*;
pub use registry::*;
pub use session::*;
pub use target::*;
