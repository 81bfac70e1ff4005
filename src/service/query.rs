//! Ranking Queries
//!
//! Read-only facade over the ranking index. Pagination input is clamped,
//! never rejected; an unranked user is an outcome, never an error.

use std::sync::Arc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::core::ids::{GameId, SetId, UserId};
use crate::core::validation::ValidationError;
use crate::ranking::{IndexError, RankedEntry, RankingIndex};
use super::scope::RequestScope;

/// Wire value for a user with no recorded score.
pub const NOT_RANKED: i64 = -1;

/// Query behaviour.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Upper bound for a page of the global leaderboard.
    pub max_page_size: i64,
    /// Page size used when the caller's limit is missing or unusable.
    pub default_page_size: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            default_page_size: 50,
        }
    }
}

impl QueryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let max_page_size = lookup("LEADERBOARD_MAX_PAGE_SIZE")
            .and_then(|v| v.parse().ok())
            .filter(|&v: &i64| v > 0)
            .unwrap_or(defaults.max_page_size);
        let default_page_size = lookup("LEADERBOARD_DEFAULT_PAGE_SIZE")
            .and_then(|v| v.parse().ok())
            .filter(|&v: &i64| v > 0)
            .unwrap_or(defaults.default_page_size)
            .min(max_page_size);

        Self { max_page_size, default_page_size }
    }
}

/// Pagination as received from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 0-based offset.
    pub offset: i64,
    /// Page size.
    pub limit: i64,
}

impl PageRequest {
    /// Parse raw query-string values.
    ///
    /// A missing, unparsable or negative offset becomes 0. A missing,
    /// unparsable or out-of-range limit becomes the default page size.
    pub fn parse(offset: Option<&str>, limit: Option<&str>, config: &QueryConfig) -> Self {
        let offset = offset
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|&v| v >= 0)
            .unwrap_or(0);
        let limit = limit
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|&v| v > 0 && v <= config.max_page_size)
            .unwrap_or(config.default_page_size);

        Self { offset, limit }
    }
}

/// One row of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardUser {
    /// Ranked user.
    pub user_id: UserId,
    /// Accumulated score.
    pub score: i64,
    /// 1-based rank.
    pub rank: u64,
}

impl From<RankedEntry> for LeaderboardUser {
    fn from(entry: RankedEntry) -> Self {
        Self {
            user_id: entry.member,
            score: entry.score,
            rank: entry.rank,
        }
    }
}

/// A user's position on the global leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "i64")]
pub enum MyRank {
    /// 1-based rank.
    Ranked(u64),
    /// User has never scored.
    NotRanked,
}

impl MyRank {
    /// Numeric rank, if any.
    pub fn rank(self) -> Option<u64> {
        match self {
            MyRank::Ranked(rank) => Some(rank),
            MyRank::NotRanked => None,
        }
    }
}

impl From<Option<u64>> for MyRank {
    fn from(rank: Option<u64>) -> Self {
        rank.map_or(MyRank::NotRanked, MyRank::Ranked)
    }
}

impl From<MyRank> for i64 {
    fn from(rank: MyRank) -> Self {
        match rank {
            MyRank::Ranked(r) => i64::try_from(r).unwrap_or(i64::MAX),
            MyRank::NotRanked => NOT_RANKED,
        }
    }
}

/// Query errors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed identifier.
    #[error("invalid query: {0}")]
    Validation(#[from] ValidationError),

    /// Index could not answer.
    #[error("ranking index read failed: {0}")]
    IndexRead(#[from] IndexError),
}

impl QueryError {
    /// Index failures may succeed on retry; validation never will.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QueryError::IndexRead(_))
    }
}

/// Global and per-game leaderboard reads.
pub struct QueryService {
    index: Arc<dyn RankingIndex>,
    config: QueryConfig,
}

impl QueryService {
    /// Create a query service over the given index.
    pub fn new(index: Arc<dyn RankingIndex>, config: QueryConfig) -> Self {
        Self { index, config }
    }

    /// Active configuration.
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// One page of the global leaderboard.
    ///
    /// `limit` is clamped to `[1, max_page_size]`, `offset` to `>= 0`.
    #[instrument(skip(self, scope))]
    pub async fn global_page(
        &self,
        offset: i64,
        limit: i64,
        scope: &RequestScope,
    ) -> Result<Vec<LeaderboardUser>, QueryError> {
        let limit = limit.clamp(1, self.config.max_page_size.max(1));
        let offset = offset.max(0);

        let entries = self.read(scope, self.index.range(&SetId::Global, offset, limit)).await?;
        debug!(offset, limit, returned = entries.len(), "global page served");
        Ok(entries.into_iter().map(LeaderboardUser::from).collect())
    }

    /// Global page from raw request pagination.
    pub async fn page(&self, request: PageRequest, scope: &RequestScope) -> Result<Vec<LeaderboardUser>, QueryError> {
        self.global_page(request.offset, request.limit, scope).await
    }

    /// A user's global rank.
    #[instrument(skip(self, scope))]
    pub async fn my_rank(&self, user_id: &str, scope: &RequestScope) -> Result<MyRank, QueryError> {
        let user_id = UserId::parse(user_id)?;
        let rank = self.read(scope, self.index.rank_of(&SetId::Global, &user_id)).await?;
        Ok(MyRank::from(rank))
    }

    /// Full leaderboard of one game.
    #[instrument(skip(self, scope))]
    pub async fn game_leaderboard(
        &self,
        game_id: &str,
        scope: &RequestScope,
    ) -> Result<Vec<LeaderboardUser>, QueryError> {
        let game_id = GameId::parse(game_id)?;
        let entries = self.read(scope, self.index.full(&SetId::game(&game_id))).await?;
        Ok(entries.into_iter().map(LeaderboardUser::from).collect())
    }

    async fn read<T, F>(&self, scope: &RequestScope, op: F) -> Result<T, QueryError>
    where
        F: std::future::Future<Output = Result<T, IndexError>>,
    {
        let result = match scope.run(op).await {
            Ok(result) => result,
            Err(interrupted) => Err(IndexError::from(interrupted)),
        };
        result.map_err(|e| {
            warn!(error = %e, "ranking read failed");
            QueryError::IndexRead(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use crate::ranking::MemoryRankingIndex;
    use crate::testing::FlakyIndex;

    fn uid(s: &str) -> UserId {
        UserId::parse(s).unwrap()
    }

    async fn seeded(n: i64) -> Arc<MemoryRankingIndex> {
        let index = Arc::new(MemoryRankingIndex::new());
        for i in 0..n {
            index
                .increment(&SetId::Global, &uid(&format!("user{:03}", i)), i)
                .await
                .unwrap();
        }
        index
    }

    #[tokio::test]
    async fn test_global_page_clamps_limit() {
        let index = seeded(150).await;
        let svc = QueryService::new(index, QueryConfig::default());
        let scope = RequestScope::unbounded();

        assert_eq!(svc.global_page(0, 1000, &scope).await.unwrap().len(), 100);
        assert_eq!(svc.global_page(0, 0, &scope).await.unwrap().len(), 1);
        assert_eq!(svc.global_page(0, -7, &scope).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_global_page_clamps_offset() {
        let index = seeded(5).await;
        let svc = QueryService::new(index, QueryConfig::default());
        let scope = RequestScope::unbounded();

        let page = svc.global_page(-3, 2, &scope).await.unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].rank, 1);
        assert_eq!(page[0].user_id, uid("user004"));
        assert_eq!(page[0].score, 4);
    }

    #[tokio::test]
    async fn test_pages_slice_full_ordering() {
        let index = seeded(37).await;
        let full = index.full(&SetId::Global).await.unwrap();
        let svc = QueryService::new(index, QueryConfig::default());
        let scope = RequestScope::unbounded();

        for offset in [0usize, 5, 30, 36, 37, 50] {
            let page = svc.global_page(offset as i64, 10, &scope).await.unwrap();
            let start = offset.min(full.len());
            let end = (offset + 10).min(full.len());
            let expected: Vec<LeaderboardUser> =
                full[start..end].iter().cloned().map(LeaderboardUser::from).collect();
            assert_eq!(page, expected);
        }
    }

    #[tokio::test]
    async fn test_my_rank_not_ranked() {
        let index = seeded(3).await;
        let svc = QueryService::new(index, QueryConfig::default());
        let scope = RequestScope::unbounded();

        assert_eq!(svc.my_rank("ghost", &scope).await.unwrap(), MyRank::NotRanked);
        assert_eq!(svc.my_rank("user000", &scope).await.unwrap(), MyRank::Ranked(3));
        assert!(matches!(
            svc.my_rank("", &scope).await,
            Err(QueryError::Validation(ValidationError::EmptyUserId))
        ));
    }

    #[tokio::test]
    async fn test_game_leaderboard_requires_game_id() {
        let svc = QueryService::new(Arc::new(MemoryRankingIndex::new()), QueryConfig::default());
        let err = svc.game_leaderboard("  ", &RequestScope::unbounded()).await.unwrap_err();
        assert!(matches!(err, QueryError::Validation(ValidationError::EmptyGameId)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unknown_game_is_empty() {
        let svc = QueryService::new(Arc::new(MemoryRankingIndex::new()), QueryConfig::default());
        let board = svc.game_leaderboard("nope", &RequestScope::unbounded()).await.unwrap();
        assert!(board.is_empty());
    }

    #[tokio::test]
    async fn test_read_failure_is_retryable_error() {
        let index = Arc::new(FlakyIndex::default());
        index.inner.increment(&SetId::Global, &uid("a"), 1).await.unwrap();
        index.fail_reads.store(true, Ordering::SeqCst);
        let svc = QueryService::new(index, QueryConfig::default());
        let scope = RequestScope::unbounded();

        let err = svc.global_page(0, 10, &scope).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(err, QueryError::IndexRead(IndexError::Unavailable(_))));
        assert!(svc.my_rank("a", &scope).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_read_is_error_not_empty() {
        let svc = QueryService::new(Arc::new(MemoryRankingIndex::new()), QueryConfig::default());
        let (scope, handle) = RequestScope::with_timeout(Duration::from_secs(1)).cancellable();
        handle.cancel();

        let err = svc.global_page(0, 10, &scope).await.unwrap_err();
        assert!(matches!(err, QueryError::IndexRead(IndexError::Cancelled)));
    }

    #[test]
    fn test_page_request_parse() {
        let config = QueryConfig::default();
        assert_eq!(PageRequest::parse(None, None, &config), PageRequest { offset: 0, limit: 50 });
        assert_eq!(
            PageRequest::parse(Some("20"), Some("10"), &config),
            PageRequest { offset: 20, limit: 10 }
        );
        assert_eq!(
            PageRequest::parse(Some("-4"), Some("abc"), &config),
            PageRequest { offset: 0, limit: 50 }
        );
        assert_eq!(PageRequest::parse(None, Some("101"), &config).limit, 50);
        assert_eq!(PageRequest::parse(None, Some("0"), &config).limit, 50);
        assert_eq!(PageRequest::parse(None, Some("100"), &config).limit, 100);
    }

    #[test]
    fn test_my_rank_wire_format() {
        assert_eq!(serde_json::to_string(&MyRank::NotRanked).unwrap(), "-1");
        assert_eq!(serde_json::to_string(&MyRank::Ranked(2)).unwrap(), "2");
        assert_eq!(MyRank::from(None).rank(), None);
        assert_eq!(i64::from(MyRank::Ranked(7)), 7);
    }

    #[test]
    fn test_leaderboard_user_json() {
        let row = LeaderboardUser { user_id: uid("alice"), score: 150, rank: 1 };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json, serde_json::json!({"user_id": "alice", "score": 150, "rank": 1}));
    }
}
