//! Score Ledger
//!
//! Append-only record of every accepted score submission. The ledger is the
//! system of record: an append is acknowledged only once persisted, and
//! nothing on the request path ever reads it back.
//!
//! - `memory.rs` - in-process ledger with audit helpers
//! - `file.rs`   - JSON-lines file, fsynced per append

pub mod file;
pub mod memory;

use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::ids::{GameId, UserId};
use crate::service::scope::{Interrupted, RequestScope};

pub use file::FileLedger;
pub use memory::MemoryLedger;

/// One persisted score submission. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreEvent {
    /// Generated unique id.
    pub event_id: Uuid,
    /// Submitting user.
    pub user_id: UserId,
    /// Game the score belongs to.
    pub game_id: GameId,
    /// Non-negative points.
    pub score: i64,
    /// When the ledger accepted the event.
    pub recorded_at: DateTime<Utc>,
}

impl ScoreEvent {
    /// Stamp a new event with a fresh id and the current time.
    pub fn new(user_id: UserId, game_id: GameId, score: i64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            user_id,
            game_id,
            score,
            recorded_at: Utc::now(),
        }
    }
}

/// Ledger failures. Any of these means the event was not acknowledged.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Underlying storage I/O failed.
    #[error("ledger I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Event could not be encoded or decoded.
    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record could not be read back.
    #[error("corrupt ledger record at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },

    /// Ledger refused or could not serve the request.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Timed out before the write was issued; nothing persisted.
    #[error("ledger append timed out after {0:?}")]
    TimedOut(Duration),

    /// Cancelled before the write was issued; nothing persisted.
    #[error("ledger append cancelled")]
    Cancelled,
}

impl From<Interrupted> for LedgerError {
    fn from(interrupted: Interrupted) -> Self {
        match interrupted {
            Interrupted::TimedOut(after) => LedgerError::TimedOut(after),
            Interrupted::Cancelled => LedgerError::Cancelled,
        }
    }
}

/// Durable append-only store of score events.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Persist a new event and return it once durable.
    ///
    /// `scope` may interrupt the append only while nothing has been handed
    /// to storage yet. Once the write is issued it runs to completion and the
    /// event is returned, so `TimedOut` and `Cancelled` always mean the event
    /// was not persisted.
    async fn append(
        &self,
        user_id: &UserId,
        game_id: &GameId,
        score: i64,
        scope: &RequestScope,
    ) -> Result<ScoreEvent, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_unique() {
        let user = UserId::parse("alice").unwrap();
        let game = GameId::parse("chess").unwrap();
        let a = ScoreEvent::new(user.clone(), game.clone(), 1);
        let b = ScoreEvent::new(user, game, 1);
        assert_ne!(a.event_id, b.event_id);
    }

    #[test]
    fn test_event_json_shape() {
        let event = ScoreEvent::new(
            UserId::parse("alice").unwrap(),
            GameId::parse("chess").unwrap(),
            42,
        );
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["user_id"], "alice");
        assert_eq!(json["game_id"], "chess");
        assert_eq!(json["score"], 42);

        let back: ScoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
