//! Test doubles for the ledger and ranking index seams.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;

use crate::core::ids::{GameId, SetId, UserId};
use crate::ledger::{Ledger, LedgerError, MemoryLedger, ScoreEvent};
use crate::service::scope::RequestScope;
use crate::ranking::{IndexError, MemoryRankingIndex, RankedEntry, RankingIndex};

/// Ledger that refuses every append.
#[derive(Default)]
pub(crate) struct FailingLedger {
    pub attempts: AtomicUsize,
}

#[async_trait]
impl Ledger for FailingLedger {
    async fn append(
        &self,
        _user_id: &UserId,
        _game_id: &GameId,
        _score: i64,
        _scope: &RequestScope,
    ) -> Result<ScoreEvent, LedgerError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(LedgerError::Unavailable("ledger offline".into()))
    }
}

/// Memory ledger that waits, interruptibly, before persisting.
pub(crate) struct SlowLedger {
    pub inner: MemoryLedger,
    pub delay: Duration,
}

#[async_trait]
impl Ledger for SlowLedger {
    async fn append(
        &self,
        user_id: &UserId,
        game_id: &GameId,
        score: i64,
        scope: &RequestScope,
    ) -> Result<ScoreEvent, LedgerError> {
        scope.run(tokio::time::sleep(self.delay)).await?;
        self.inner.append(user_id, game_id, score, scope).await
    }
}

/// Memory index with switchable faults.
#[derive(Default)]
pub(crate) struct FlakyIndex {
    pub inner: MemoryRankingIndex,
    /// Fail increments on `game:*` sets with a positive delta.
    pub fail_game: AtomicBool,
    /// Fail increments on the global set.
    pub fail_global: AtomicBool,
    /// Fail negative (compensating) increments.
    pub fail_negative: AtomicBool,
    /// Never complete increments on the global set.
    pub stall_global: AtomicBool,
    /// Fail every read.
    pub fail_reads: AtomicBool,
    /// Increments that reached the backing index.
    pub applied: AtomicUsize,
}

impl FlakyIndex {
    fn check_read(&self) -> Result<(), IndexError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("index read refused".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RankingIndex for FlakyIndex {
    async fn increment(&self, set: &SetId, member: &UserId, delta: i64) -> Result<i64, IndexError> {
        if delta < 0 && self.fail_negative.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("compensation refused".into()));
        }
        match set {
            SetId::Global => {
                if self.stall_global.load(Ordering::SeqCst) {
                    std::future::pending::<()>().await;
                }
                if self.fail_global.load(Ordering::SeqCst) {
                    return Err(IndexError::Unavailable("global set offline".into()));
                }
            }
            SetId::Game(_) => {
                if delta >= 0 && self.fail_game.load(Ordering::SeqCst) {
                    return Err(IndexError::Unavailable("game set offline".into()));
                }
            }
        }
        let score = self.inner.increment(set, member, delta).await?;
        self.applied.fetch_add(1, Ordering::SeqCst);
        Ok(score)
    }

    async fn rank_of(&self, set: &SetId, member: &UserId) -> Result<Option<u64>, IndexError> {
        self.check_read()?;
        self.inner.rank_of(set, member).await
    }

    async fn score_of(&self, set: &SetId, member: &UserId) -> Result<Option<i64>, IndexError> {
        self.check_read()?;
        self.inner.score_of(set, member).await
    }

    async fn range(&self, set: &SetId, offset: i64, limit: i64) -> Result<Vec<RankedEntry>, IndexError> {
        self.check_read()?;
        self.inner.range(set, offset, limit).await
    }
}
