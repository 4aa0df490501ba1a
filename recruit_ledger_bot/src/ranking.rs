use std::sync::Arc;

use crate::{
    store::{RecordStore, StoreError},
    types::RankingEntry,
};

/// Recruiter leaderboard, recomputed from the stored records on every call.
#[derive(Clone)]
pub struct RankingAggregator {
    store: Arc<dyn RecordStore>,
}

impl RankingAggregator {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        RankingAggregator { store }
    }

    /// Up to `limit` recruiters with the most approved recruits.
    pub async fn top_recruiters(&self, limit: usize) -> Result<Vec<RankingEntry>, StoreError> {
        Ok(rank(self.store.approved_counts().await?, limit))
    }
}

/// Sorts by total, highest first, and keeps the first `limit`.
/// Equal totals are ordered by recruiter ID.
#[must_use]
pub fn rank(mut counts: Vec<RankingEntry>, limit: usize) -> Vec<RankingEntry> {
    counts.retain(|entry| entry.total > 0);
    counts.sort_by(|a, b| {
        b.total
            .cmp(&a.total)
            .then_with(|| a.recruiter_id.cmp(&b.recruiter_id))
    });
    counts.truncate(limit);
    counts
}
