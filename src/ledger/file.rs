//! File-backed ledger.
//!
//! One JSON object per line. Appends are serialized by an async lock; the
//! wait for that lock is the only interruptible part. Once held, the line is
//! written and `sync_data`ed on a blocking worker that is always awaited to
//! the end, so an acknowledged event is durable and an interrupted one was
//! never written.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::ids::{GameId, UserId};
use crate::service::scope::RequestScope;
use super::{Ledger, LedgerError, ScoreEvent};

/// Append-only JSON-lines ledger.
pub struct FileLedger {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl FileLedger {
    /// Open (creating if needed) a ledger file for appending.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let open_path = path.clone();

        let file = tokio::task::spawn_blocking(move || {
            OpenOptions::new().create(true).append(true).open(&open_path)
        })
        .await
        .map_err(|e| LedgerError::Unavailable(format!("open worker failed: {}", e)))??;

        info!(path = %path.display(), "opened score ledger");

        Ok(Self {
            path,
            file: Arc::new(Mutex::new(file)),
        })
    }

    /// Ledger file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every persisted event, in append order.
    ///
    /// Audit and reporting only; never called on the request path.
    pub async fn read_all(&self) -> Result<Vec<ScoreEvent>, LedgerError> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let mut events = Vec::new();

        for (idx, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event = serde_json::from_str(line).map_err(|e| LedgerError::Corrupt {
                line: idx + 1,
                reason: e.to_string(),
            })?;
            events.push(event);
        }

        Ok(events)
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn append(
        &self,
        user_id: &UserId,
        game_id: &GameId,
        score: i64,
        scope: &RequestScope,
    ) -> Result<ScoreEvent, LedgerError> {
        let mut file = scope.run(self.file.clone().lock_owned()).await?;

        let event = ScoreEvent::new(user_id.clone(), game_id.clone(), score);
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        // Past this point the write is issued; the scope no longer applies.
        tokio::task::spawn_blocking(move || -> Result<(), LedgerError> {
            file.write_all(&line)?;
            file.sync_data()?;
            Ok(())
        })
        .await
        .map_err(|e| LedgerError::Unavailable(format!("append worker failed: {}", e)))??;

        debug!(event_id = %event.event_id, "ledger append persisted");
        Ok(event)
    }
}
