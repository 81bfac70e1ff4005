//! Leaderboard Engine
//!
//! Wires a ledger and a ranking index into the submission and query
//! services, and exposes the four operations the HTTP layer calls. Every
//! call runs under a fresh [`RequestScope`] bounded by the configured
//! per-operation timeout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::core::validation::ScoreSubmission;
use crate::ledger::{FileLedger, Ledger, LedgerError, MemoryLedger, ScoreEvent};
use crate::ranking::{MemoryRankingIndex, RankingIndex};
use crate::service::{
    LeaderboardUser, MyRank, QueryConfig, QueryError, QueryService, RequestScope,
    SubmissionConfig, SubmissionService, SubmitError,
};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// JSON-lines ledger file. In-memory ledger when `None`.
    pub ledger_path: Option<PathBuf>,
    /// Bound on each ledger or index call. Unbounded when `None`.
    pub op_timeout: Option<Duration>,
    /// Read path settings.
    pub query: QueryConfig,
    /// Write path settings.
    pub submission: SubmissionConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger_path: None,
            op_timeout: Some(Duration::from_millis(2000)),
            query: QueryConfig::default(),
            submission: SubmissionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    ///
    /// `LEADERBOARD_OP_TIMEOUT_MS=0` disables the timeout.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let op_timeout = match lookup("LEADERBOARD_OP_TIMEOUT_MS").and_then(|v| v.parse::<u64>().ok()) {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.op_timeout,
        };

        Self {
            ledger_path: lookup("LEADERBOARD_LEDGER_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            op_timeout,
            query: QueryConfig::from_lookup(lookup),
            submission: SubmissionConfig::from_lookup(lookup),
        }
    }
}

/// Score submission and ranking queries over one ledger and one index.
pub struct LeaderboardEngine {
    submissions: SubmissionService,
    queries: QueryService,
    op_timeout: Option<Duration>,
}

impl LeaderboardEngine {
    /// Build over explicit collaborators.
    pub fn new(ledger: Arc<dyn Ledger>, index: Arc<dyn RankingIndex>, config: &EngineConfig) -> Self {
        Self {
            submissions: SubmissionService::new(ledger, index.clone(), config.submission.clone()),
            queries: QueryService::new(index, config.query.clone()),
            op_timeout: config.op_timeout,
        }
    }

    /// In-memory ledger and index.
    pub fn in_memory(config: &EngineConfig) -> Self {
        Self::new(Arc::new(MemoryLedger::new()), Arc::new(MemoryRankingIndex::new()), config)
    }

    /// Build from config: file ledger when a path is set, memory otherwise.
    pub async fn from_config(config: &EngineConfig) -> Result<Self, LedgerError> {
        let ledger: Arc<dyn Ledger> = match &config.ledger_path {
            Some(path) => Arc::new(FileLedger::open(path).await?),
            None => Arc::new(MemoryLedger::new()),
        };
        info!(
            file_ledger = config.ledger_path.is_some(),
            timeout_ms = config.op_timeout.map(|d| d.as_millis() as u64),
            max_page_size = config.query.max_page_size,
            "leaderboard engine ready"
        );
        Ok(Self::new(ledger, Arc::new(MemoryRankingIndex::new()), config))
    }

    /// Fresh scope carrying the configured timeout.
    pub fn scope(&self) -> RequestScope {
        match self.op_timeout {
            Some(timeout) => RequestScope::with_timeout(timeout),
            None => RequestScope::unbounded(),
        }
    }

    /// Write path.
    pub fn submissions(&self) -> &SubmissionService {
        &self.submissions
    }

    /// Read path.
    pub fn queries(&self) -> &QueryService {
        &self.queries
    }

    /// Record a score for a user in a game.
    pub async fn submit(&self, user_id: &str, game_id: &str, score: i64) -> Result<ScoreEvent, SubmitError> {
        self.submissions
            .submit(&ScoreSubmission::new(user_id, game_id, score), &self.scope())
            .await
    }

    /// One page of the global leaderboard.
    pub async fn global_page(&self, offset: i64, limit: i64) -> Result<Vec<LeaderboardUser>, QueryError> {
        self.queries.global_page(offset, limit, &self.scope()).await
    }

    /// A user's global rank.
    pub async fn my_rank(&self, user_id: &str) -> Result<MyRank, QueryError> {
        self.queries.my_rank(user_id, &self.scope()).await
    }

    /// Full leaderboard of one game.
    pub async fn game_leaderboard(&self, game_id: &str) -> Result<Vec<LeaderboardUser>, QueryError> {
        self.queries.game_leaderboard(game_id, &self.scope()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use rand::{Rng, SeedableRng};
    use rand::rngs::StdRng;
    use crate::core::ids::{GameId, SetId, UserId};
    use crate::core::validation::ValidationError;

    fn engine_with_parts() -> (LeaderboardEngine, Arc<MemoryLedger>, Arc<MemoryRankingIndex>) {
        let ledger = Arc::new(MemoryLedger::new());
        let index = Arc::new(MemoryRankingIndex::new());
        let engine = LeaderboardEngine::new(ledger.clone(), index.clone(), &EngineConfig::default());
        (engine, ledger, index)
    }

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[tokio::test]
    async fn test_two_player_scenario() {
        let (engine, _, _) = engine_with_parts();

        engine.submit("A", "G", 100).await.unwrap();
        let page = engine.global_page(0, 10).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].user_id.as_str(), "A");
        assert_eq!(page[0].score, 100);
        assert_eq!(page[0].rank, 1);

        engine.submit("B", "G", 150).await.unwrap();
        let page = engine.global_page(0, 10).await.unwrap();
        let ids: Vec<_> = page.iter().map(|u| (u.user_id.as_str(), u.rank)).collect();
        assert_eq!(ids, vec![("B", 1), ("A", 2)]);

        let board = engine.game_leaderboard("G").await.unwrap();
        assert_eq!(board, page);

        assert_eq!(engine.my_rank("A").await.unwrap(), MyRank::Ranked(2));
        assert_eq!(engine.my_rank("nobody").await.unwrap(), MyRank::NotRanked);
    }

    #[tokio::test]
    async fn test_negative_score_rejected_without_writes() {
        let (engine, ledger, index) = engine_with_parts();

        let err = engine.submit("A", "G", -5).await.unwrap_err();
        assert!(matches!(err, SubmitError::Validation(ValidationError::NegativeScore(-5))));
        assert!(ledger.is_empty().await);
        assert_eq!(index.set_count().await, 0);
        assert_eq!(engine.my_rank("A").await.unwrap(), MyRank::NotRanked);
    }

    #[tokio::test]
    async fn test_ledger_sums_match_index() {
        let (engine, ledger, index) = engine_with_parts();
        let mut rng = StdRng::seed_from_u64(7);
        let users = ["ana", "ben", "cy", "dee", "eli"];
        let games = ["chess", "go", "shogi"];

        for _ in 0..300 {
            let user = users[rng.gen_range(0..users.len())];
            let game = games[rng.gen_range(0..games.len())];
            engine.submit(user, game, rng.gen_range(0..1000)).await.unwrap();
        }

        for user in users {
            let user_id = UserId::parse(user).unwrap();
            let mut global = 0;
            for game in games {
                let game_id = GameId::parse(game).unwrap();
                let recorded = ledger.total_for(&user_id, &game_id).await;
                let ranked = index.score_of(&SetId::game(&game_id), &user_id).await.unwrap();
                if recorded > 0 {
                    assert_eq!(ranked, Some(recorded));
                }
                global += recorded;
            }
            let ranked_global = index.score_of(&SetId::Global, &user_id).await.unwrap();
            assert_eq!(ranked_global.unwrap_or(0), global);
        }
    }

    #[tokio::test]
    async fn test_rank_of_consistent_with_full() {
        let (engine, _, index) = engine_with_parts();
        for (i, user) in ["p", "q", "r", "s", "t", "u"].iter().enumerate() {
            engine.submit(user, "G", (i as i64 % 3) * 10).await.unwrap();
        }

        let full = index.full(&SetId::Global).await.unwrap();
        for (pos, entry) in full.iter().enumerate() {
            let rank = engine.my_rank(entry.member.as_str()).await.unwrap();
            assert_eq!(rank, MyRank::Ranked(pos as u64 + 1));
        }

        // Repeated reads with no writes in between are identical.
        assert_eq!(engine.game_leaderboard("G").await.unwrap(), engine.game_leaderboard("G").await.unwrap());
    }

    #[tokio::test]
    async fn test_file_backed_engine() {
        let path = std::env::temp_dir().join(format!("leaderboard-engine-{}.jsonl", uuid::Uuid::new_v4()));
        let config = EngineConfig {
            ledger_path: Some(path.clone()),
            ..Default::default()
        };

        let engine = LeaderboardEngine::from_config(&config).await.unwrap();
        let event = engine.submit("A", "G", 12).await.unwrap();
        assert_eq!(engine.my_rank("A").await.unwrap(), MyRank::Ranked(1));

        let persisted = FileLedger::open(&path).await.unwrap().read_all().await.unwrap();
        assert_eq!(persisted, vec![event]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_config_defaults() {
        let config = EngineConfig::from_lookup(&lookup_from(&[]));
        assert!(config.ledger_path.is_none());
        assert_eq!(config.op_timeout, Some(Duration::from_millis(2000)));
        assert_eq!(config.query.max_page_size, 100);
        assert_eq!(config.query.default_page_size, 50);
        assert!(!config.submission.compensate_partial_index);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = EngineConfig::from_lookup(&lookup_from(&[
            ("LEADERBOARD_LEDGER_PATH", "/var/lib/leaderboard/scores.jsonl"),
            ("LEADERBOARD_OP_TIMEOUT_MS", "0"),
            ("LEADERBOARD_MAX_PAGE_SIZE", "25"),
            ("LEADERBOARD_DEFAULT_PAGE_SIZE", "40"),
            ("LEADERBOARD_COMPENSATE", "1"),
        ]));
        assert_eq!(config.ledger_path, Some(PathBuf::from("/var/lib/leaderboard/scores.jsonl")));
        assert_eq!(config.op_timeout, None);
        assert_eq!(config.query.max_page_size, 25);
        assert_eq!(config.query.default_page_size, 25);
        assert!(config.submission.compensate_partial_index);
    }

    #[test]
    fn test_config_ignores_garbage() {
        let config = EngineConfig::from_lookup(&lookup_from(&[
            ("LEADERBOARD_OP_TIMEOUT_MS", "soon"),
            ("LEADERBOARD_MAX_PAGE_SIZE", "-3"),
            ("LEADERBOARD_LEDGER_PATH", "  "),
        ]));
        assert_eq!(config.op_timeout, Some(Duration::from_millis(2000)));
        assert_eq!(config.query.max_page_size, 100);
        assert!(config.ledger_path.is_none());
    }
}
