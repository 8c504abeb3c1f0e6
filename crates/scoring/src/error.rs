use league_core::{Discipline, MatchId, OutcomeTag, PlayerId, SetStatus};
use thiserror::Error;

/// Failures reported by the data store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Network failure, expired token, timeout. Worth retrying.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The store refused the write.
    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("{discipline:?} set of match {match_id} is already finalized")]
    AlreadyFinalized {
        match_id: MatchId,
        discipline: Discipline,
    },

    #[error("not found: {0}")]
    NotFound(String),
}

/// An action the UI should never have offered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("{discipline:?} set is {status:?} and takes no more racks")]
    SetClosed {
        discipline: Discipline,
        status: SetStatus,
    },

    #[error("scoring is locked for this match")]
    Locked,

    #[error("{outcome:?} is not a {discipline:?} outcome")]
    OutcomeNotAllowed {
        outcome: OutcomeTag,
        discipline: Discipline,
    },

    #[error("{discipline:?} set is {status:?}, not race complete")]
    NotReady {
        discipline: Discipline,
        status: SetStatus,
    },

    #[error("{0:?} set is already finalized")]
    AlreadyFinalized(Discipline),

    #[error("{0:?} set is tied and has no winner")]
    Tied(Discipline),

    #[error("{0} is not playing in this match")]
    UnknownPlayer(PlayerId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    #[error(transparent)]
    Invariant(#[from] InvariantViolation),

    #[error(transparent)]
    Write(#[from] StoreError),

    #[error("another scoring action is still in flight")]
    Busy,
}

/// How a failure should be handled by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Log and let the next poll or reconnect retry.
    Transient,
    /// Surface to the user.
    WriteFailure,
    /// Rejected locally; the action should not have been reachable.
    Invariant,
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

impl ScoringError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ScoringError::Invariant(_) | ScoringError::Busy => ErrorClass::Invariant,
            ScoringError::Write(_) => ErrorClass::WriteFailure,
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoringError>;

/// Failure to load or save a JSON artifact (rating book, match report).
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
