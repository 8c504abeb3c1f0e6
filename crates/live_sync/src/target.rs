use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scoring::{MatchScorer, StoreError};

/// Something a sync session keeps fresh.
#[async_trait]
pub trait RefreshTarget: Send + Sync {
    async fn refresh(&self) -> Result<(), StoreError>;

    /// Safety-net polls are skipped while this is true.
    fn is_busy(&self) -> bool;

    fn last_synced_at(&self) -> Option<DateTime<Utc>>;
}

#[async_trait]
impl RefreshTarget for MatchScorer {
    async fn refresh(&self) -> Result<(), StoreError> {
        MatchScorer::refresh(self).await
    }

    fn is_busy(&self) -> bool {
        MatchScorer::is_busy(self)
    }

    fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        MatchScorer::last_synced_at(self)
    }
}
