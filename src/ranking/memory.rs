//! In-memory ranking index.
//!
//! One [`RankedSet`] per set identifier behind its own lock, so writes to
//! different games never contend. The outer map lock is only taken for
//! writing when a set is first created.

use std::collections::BTreeMap;
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::core::ids::{SetId, UserId};
use super::ranked_set::{RankedEntry, RankedSet};
use super::{page_bounds, IndexError, RankingIndex};

/// Reference [`RankingIndex`] backed by order-statistic treaps.
pub struct MemoryRankingIndex {
    sets: RwLock<BTreeMap<SetId, Arc<RwLock<RankedSet>>>>,
}

impl MemoryRankingIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of sets that have at least one entry.
    pub async fn set_count(&self) -> usize {
        self.sets.read().await.len()
    }

    /// Number of members in a set.
    pub async fn member_count(&self, set: &SetId) -> usize {
        match self.get(set).await {
            Some(ranked) => ranked.read().await.len(),
            None => 0,
        }
    }

    async fn get(&self, set: &SetId) -> Option<Arc<RwLock<RankedSet>>> {
        let sets = self.sets.read().await;
        sets.get(set).cloned()
    }

    async fn get_or_create(&self, set: &SetId) -> Arc<RwLock<RankedSet>> {
        if let Some(existing) = self.get(set).await {
            return existing;
        }

        let mut sets = self.sets.write().await;
        sets.entry(set.clone())
            .or_insert_with(|| {
                debug!(set = %set, "creating ranked set");
                Arc::new(RwLock::new(RankedSet::new(&set.key())))
            })
            .clone()
    }
}

impl Default for MemoryRankingIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RankingIndex for MemoryRankingIndex {
    async fn increment(&self, set: &SetId, member: &UserId, delta: i64) -> Result<i64, IndexError> {
        let ranked = self.get_or_create(set).await;
        let mut ranked = ranked.write().await;
        ranked.increment(member, delta).map_err(|source| IndexError::ScoreOverflow {
            set: set.key(),
            member: member.clone(),
            source,
        })
    }

    async fn rank_of(&self, set: &SetId, member: &UserId) -> Result<Option<u64>, IndexError> {
        match self.get(set).await {
            Some(ranked) => Ok(ranked.read().await.rank_of(member)),
            None => Ok(None),
        }
    }

    async fn score_of(&self, set: &SetId, member: &UserId) -> Result<Option<i64>, IndexError> {
        match self.get(set).await {
            Some(ranked) => Ok(ranked.read().await.score_of(member)),
            None => Ok(None),
        }
    }

    async fn range(&self, set: &SetId, offset: i64, limit: i64) -> Result<Vec<RankedEntry>, IndexError> {
        let Some((offset, limit)) = page_bounds(offset, limit) else {
            return Ok(Vec::new());
        };
        match self.get(set).await {
            Some(ranked) => Ok(ranked.read().await.range(offset, limit)),
            None => Ok(Vec::new()),
        }
    }
}
