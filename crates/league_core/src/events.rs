//! Change notifications emitted by the data store.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::MatchId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub topic: Topic,
    pub kind: ChangeKind,
    /// Table or record family that changed ("racks", "matches", ...)
    pub table: String,
}

/// Subscription topic for a single match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Topic(String);

impl Topic {
    pub fn for_match(id: MatchId) -> Self {
        Self(format!("match:{id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}
