//! Ranking Index
//!
//! A keyed collection of ranked sets: one per game plus one global set.
//! Services only see the [`RankingIndex`] trait; [`MemoryRankingIndex`] is
//! the in-process reference implementation.
//!
//! ## Contract
//!
//! - `increment` is atomic per `(set, member)`: concurrent deltas for the
//!   same member are all reflected.
//! - `rank_of` returns `None` for a member with no entry, never rank 0.
//! - `range` never fails on bad bounds: negative offset or `limit <= 0`
//!   yields an empty page.

pub mod memory;
pub mod ranked_set;

use std::time::Duration;
use async_trait::async_trait;
use thiserror::Error;

use crate::core::ids::{SetId, UserId};
use crate::service::scope::Interrupted;

pub use memory::MemoryRankingIndex;
pub use ranked_set::{RankedEntry, RankedSet, ScoreOverflow};

/// Ranking index failures.
#[derive(Debug, Clone, Error)]
pub enum IndexError {
    /// Backing store could not serve the request.
    #[error("ranking index unavailable: {0}")]
    Unavailable(String),

    /// Increment would overflow the accumulated score.
    #[error("score overflow in {set} for {member}")]
    ScoreOverflow {
        /// Set key.
        set: String,
        /// Member whose score overflowed.
        member: UserId,
        /// Offending values.
        #[source]
        source: ScoreOverflow,
    },

    /// Operation exceeded the request timeout.
    #[error("ranking index operation timed out after {0:?}")]
    TimedOut(Duration),

    /// Caller cancelled the request.
    #[error("ranking index operation cancelled")]
    Cancelled,
}

impl IndexError {
    /// Whether repeating the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexError::Unavailable(_) | IndexError::TimedOut(_))
    }

    /// True for timeouts and cancellations raised by the request scope.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, IndexError::TimedOut(_) | IndexError::Cancelled)
    }
}

impl From<Interrupted> for IndexError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::TimedOut(after) => IndexError::TimedOut(after),
            Interrupted::Cancelled => IndexError::Cancelled,
        }
    }
}

/// Ranked sets addressed by [`SetId`].
#[async_trait]
pub trait RankingIndex: Send + Sync {
    /// Add `delta` to `member` in `set`, creating the entry if absent.
    /// Returns the new accumulated score.
    async fn increment(&self, set: &SetId, member: &UserId, delta: i64) -> Result<i64, IndexError>;

    /// 1-based descending rank, `None` if the member has no entry.
    async fn rank_of(&self, set: &SetId, member: &UserId) -> Result<Option<u64>, IndexError>;

    /// Accumulated score, `None` if the member has no entry.
    async fn score_of(&self, set: &SetId, member: &UserId) -> Result<Option<i64>, IndexError>;

    /// Entries ordered by rank starting at 0-based `offset`, at most `limit`.
    async fn range(&self, set: &SetId, offset: i64, limit: i64) -> Result<Vec<RankedEntry>, IndexError>;

    /// Every entry of `set` in rank order.
    async fn full(&self, set: &SetId) -> Result<Vec<RankedEntry>, IndexError> {
        self.range(set, 0, i64::MAX).await
    }
}

/// Convert signed page bounds; `None` means the page is empty.
pub(crate) fn page_bounds(offset: i64, limit: i64) -> Option<(usize, usize)> {
    if offset < 0 || limit <= 0 {
        return None;
    }
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    Some((offset, limit))
}
