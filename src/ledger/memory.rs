//! In-process ledger.
//!
//! Durable only for the life of the process. Used by the demo binary, by
//! tests, and as the default when no ledger path is configured.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::ids::{GameId, UserId};
use crate::service::scope::RequestScope;
use super::{Ledger, LedgerError, ScoreEvent};

/// Append-only vector of events.
#[derive(Default)]
pub struct MemoryLedger {
    events: Mutex<Vec<ScoreEvent>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events.
    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    /// True when nothing has been recorded.
    pub async fn is_empty(&self) -> bool {
        self.events.lock().await.is_empty()
    }

    /// Snapshot of every event in append order.
    pub async fn events(&self) -> Vec<ScoreEvent> {
        self.events.lock().await.clone()
    }

    /// Events submitted by one user, in append order.
    pub async fn events_for_user(&self, user_id: &UserId) -> Vec<ScoreEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| &e.user_id == user_id)
            .cloned()
            .collect()
    }

    /// Sum of a user's recorded scores in one game.
    pub async fn total_for(&self, user_id: &UserId, game_id: &GameId) -> i64 {
        self.events
            .lock()
            .await
            .iter()
            .filter(|e| &e.user_id == user_id && &e.game_id == game_id)
            .map(|e| e.score)
            .sum()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn append(
        &self,
        user_id: &UserId,
        game_id: &GameId,
        score: i64,
        scope: &RequestScope,
    ) -> Result<ScoreEvent, LedgerError> {
        let mut events = scope.run(self.events.lock()).await?;
        let event = ScoreEvent::new(user_id.clone(), game_id.clone(), score);
        events.push(event.clone());
        Ok(event)
    }
}
