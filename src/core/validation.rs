//! Input Validation
//!
//! Everything a caller hands the engine is checked here before any write.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use super::ids::{GameId, UserId};

/// Rejected input. Returned before any ledger or index write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Score below zero.
    #[error("score must be non-negative, got {0}")]
    NegativeScore(i64),
    /// Score absent from the request.
    #[error("score is required")]
    MissingScore,
    /// Empty or whitespace-only user id.
    #[error("user_id must not be empty")]
    EmptyUserId,
    /// Empty or whitespace-only game id.
    #[error("game_id must not be empty")]
    EmptyGameId,
    /// Set identifier is neither `global` nor `game:{id}`.
    #[error("invalid set identifier: {0}")]
    InvalidSetId(String),
}

/// A raw score submission as bound from a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreSubmission {
    /// Submitting user.
    pub user_id: String,
    /// Game the score was earned in.
    pub game_id: String,
    /// Points earned. `None` when the field was absent.
    #[serde(default)]
    pub score: Option<i64>,
}

impl ScoreSubmission {
    /// Build a submission with a present score.
    pub fn new(user_id: impl Into<String>, game_id: impl Into<String>, score: i64) -> Self {
        Self {
            user_id: user_id.into(),
            game_id: game_id.into(),
            score: Some(score),
        }
    }

    /// Check every field and produce typed values.
    pub fn validate(&self) -> Result<ValidSubmission, ValidationError> {
        let user_id = UserId::parse(&self.user_id)?;
        let game_id = GameId::parse(&self.game_id)?;
        let score = match self.score {
            None => return Err(ValidationError::MissingScore),
            Some(s) if s < 0 => return Err(ValidationError::NegativeScore(s)),
            Some(s) => s,
        };
        Ok(ValidSubmission { user_id, game_id, score })
    }
}

/// A submission that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSubmission {
    /// Submitting user.
    pub user_id: UserId,
    /// Game the score was earned in.
    pub game_id: GameId,
    /// Non-negative points.
    pub score: i64,
}
