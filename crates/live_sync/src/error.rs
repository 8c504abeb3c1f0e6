use thiserror::Error;

/// Failures at the event boundary. Always transient: the session retries or
/// degrades to polling, and nothing is surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("event channel unavailable: {0}")]
    Unavailable(String),

    #[error("event channel closed")]
    Closed,
}
