//! Score Submission
//!
//! Records one score event with a strict three-step write:
//!
//! 1. append to the ledger (failure aborts, nothing else is touched)
//! 2. increment `game:{game_id}`
//! 3. increment `global`
//!
//! A failure after step 1 leaves the ledger ahead of the index. That window
//! is reported as a typed [`SubmitOutcome`] and surfaced to the caller as
//! [`SubmitError::IndexWrite`]; reconciliation is an operator task.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::core::ids::{SetId, UserId};
use crate::core::validation::{ScoreSubmission, ValidSubmission, ValidationError};
use crate::ledger::{Ledger, LedgerError, ScoreEvent};
use crate::ranking::{IndexError, RankingIndex};
use super::scope::RequestScope;

/// Submission behaviour.
#[derive(Debug, Clone, Default)]
pub struct SubmissionConfig {
    /// On a failed global increment, undo the game increment in the same
    /// request. Never applied after a timeout or cancellation.
    pub compensate_partial_index: bool,
}

impl SubmissionConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(&|key: &str| std::env::var(key).ok())
    }

    /// Create config from an arbitrary variable source.
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Self {
        Self {
            compensate_partial_index: lookup("LEADERBOARD_COMPENSATE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }
}

/// Which index writes were missed after the ledger append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialStage {
    /// Neither index was incremented.
    LedgerOnly,
    /// Game set incremented, global set not.
    PartialIndex,
}

impl fmt::Display for PartialStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartialStage::LedgerOnly => f.write_str("ledger only"),
            PartialStage::PartialIndex => f.write_str("game set only"),
        }
    }
}

/// Result of a compensating decrement.
#[derive(Debug, Clone)]
pub enum Compensation {
    /// Disabled, not applicable, or request already interrupted.
    NotAttempted,
    /// Game increment reversed by a compensating decrement. A member's
    /// first submission to the game leaves a zero-score entry behind.
    Applied,
    /// The decrement itself failed; game and global sets diverge.
    Failed(IndexError),
}

/// Typed result of the dual write.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Ledger and both sets updated.
    FullSuccess(ScoreEvent),
    /// Ledger persisted, game increment failed, global not attempted.
    LedgerOnly {
        /// Persisted event.
        event: ScoreEvent,
        /// Failure from the game increment.
        error: IndexError,
    },
    /// Ledger and game set updated, global increment failed.
    PartialIndex {
        /// Persisted event.
        event: ScoreEvent,
        /// Failure from the global increment.
        error: IndexError,
        /// Whether the game increment was undone.
        compensation: Compensation,
    },
}

impl SubmitOutcome {
    /// The ledger event, persisted in every outcome.
    pub fn event(&self) -> &ScoreEvent {
        match self {
            SubmitOutcome::FullSuccess(event) => event,
            SubmitOutcome::LedgerOnly { event, .. } => event,
            SubmitOutcome::PartialIndex { event, .. } => event,
        }
    }

    /// True when every write landed.
    pub fn is_full_success(&self) -> bool {
        matches!(self, SubmitOutcome::FullSuccess(_))
    }

    /// Collapse to success or [`SubmitError::IndexWrite`].
    pub fn into_result(self) -> Result<ScoreEvent, SubmitError> {
        let partial = match self {
            SubmitOutcome::FullSuccess(event) => return Ok(event),
            SubmitOutcome::LedgerOnly { event, error } => PartialWrite {
                event,
                stage: PartialStage::LedgerOnly,
                source: error,
                compensation: Compensation::NotAttempted,
            },
            SubmitOutcome::PartialIndex { event, error, compensation } => PartialWrite {
                event,
                stage: PartialStage::PartialIndex,
                source: error,
                compensation,
            },
        };
        Err(SubmitError::IndexWrite(Box::new(partial)))
    }
}

/// Ledger persisted, ranking index stale.
#[derive(Debug, Error)]
#[error("event {} persisted but ranking index is stale ({}): {}", .event.event_id, .stage, .source)]
pub struct PartialWrite {
    /// Persisted event; replaying it repairs the index.
    pub event: ScoreEvent,
    /// Which writes were missed.
    pub stage: PartialStage,
    /// Index failure that stopped the sequence.
    pub source: IndexError,
    /// Compensation applied to the game set, if any.
    pub compensation: Compensation,
}

/// Submission errors. Kinds pass through unmodified.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Rejected before any write.
    #[error("invalid submission: {0}")]
    Validation(#[from] ValidationError),

    /// Ledger did not persist; nothing else was attempted.
    #[error("ledger write failed: {0}")]
    LedgerWrite(#[from] LedgerError),

    /// Ledger persisted, an index increment failed.
    #[error(transparent)]
    IndexWrite(Box<PartialWrite>),
}

/// Orchestrates the ledger append and both index increments.
pub struct SubmissionService {
    ledger: Arc<dyn Ledger>,
    index: Arc<dyn RankingIndex>,
    config: SubmissionConfig,
}

impl SubmissionService {
    /// Create a submission service over the given ledger and index.
    pub fn new(ledger: Arc<dyn Ledger>, index: Arc<dyn RankingIndex>, config: SubmissionConfig) -> Self {
        Self { ledger, index, config }
    }

    /// Record a score. Anything short of full success is an error.
    pub async fn submit(&self, submission: &ScoreSubmission, scope: &RequestScope) -> Result<ScoreEvent, SubmitError> {
        self.submit_tracked(submission, scope).await?.into_result()
    }

    /// Record a score and report exactly which writes landed.
    ///
    /// `Err` means nothing was persisted; `Ok` carries the persisted event
    /// and the state of the index writes.
    #[instrument(skip(self, submission, scope), fields(user_id = %submission.user_id, game_id = %submission.game_id))]
    pub async fn submit_tracked(
        &self,
        submission: &ScoreSubmission,
        scope: &RequestScope,
    ) -> Result<SubmitOutcome, SubmitError> {
        let valid = submission.validate().map_err(|e| {
            warn!(error = %e, "rejected score submission");
            e
        })?;
        let ValidSubmission { user_id, game_id, score } = valid;

        let event = match self.ledger.append(&user_id, &game_id, score, scope).await {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "ledger append failed, index untouched");
                return Err(SubmitError::LedgerWrite(e));
            }
        };

        let game_set = SetId::game(&game_id);
        let game_score = match self.increment(&game_set, &user_id, score, scope).await {
            Ok(total) => total,
            Err(e) => {
                error!(event_id = %event.event_id, set = %game_set, error = %e,
                    "game increment failed after ledger append");
                return Ok(SubmitOutcome::LedgerOnly { event, error: e });
            }
        };

        let global_score = match self.increment(&SetId::Global, &user_id, score, scope).await {
            Ok(total) => total,
            Err(e) => {
                error!(event_id = %event.event_id, error = %e,
                    "global increment failed after game increment");
                let compensation = self.compensate(&game_set, &user_id, score, &e, scope).await;
                return Ok(SubmitOutcome::PartialIndex { event, error: e, compensation });
            }
        };

        info!(event_id = %event.event_id, score, game_score, global_score, "score recorded");
        Ok(SubmitOutcome::FullSuccess(event))
    }

    async fn increment(
        &self,
        set: &SetId,
        member: &UserId,
        delta: i64,
        scope: &RequestScope,
    ) -> Result<i64, IndexError> {
        scope.run(self.index.increment(set, member, delta)).await?
    }

    /// Undo the game increment while the request is still live.
    async fn compensate(
        &self,
        game_set: &SetId,
        member: &UserId,
        score: i64,
        cause: &IndexError,
        scope: &RequestScope,
    ) -> Compensation {
        if !self.config.compensate_partial_index || cause.is_interrupted() || scope.is_cancelled() {
            return Compensation::NotAttempted;
        }

        match self.increment(game_set, member, -score, scope).await {
            Ok(_) => {
                warn!(set = %game_set, "game increment compensated");
                Compensation::Applied
            }
            Err(e) => {
                error!(set = %game_set, error = %e, "compensation failed, game and global sets diverge");
                Compensation::Failed(e)
            }
        }
    }
}
