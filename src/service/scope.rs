//! Request Scope
//!
//! Bounds every suspension point of a request (ledger append, each index
//! call) with the caller's timeout and cancellation signal. An interrupted
//! operation is dropped, never retried.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Why an operation stopped before completing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    /// Per-operation timeout elapsed.
    TimedOut(Duration),
    /// Caller cancelled the request.
    Cancelled,
}

/// Timeout and cancellation applied to each operation of one request.
#[derive(Debug, Clone, Default)]
pub struct RequestScope {
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
}

impl RequestScope {
    /// No timeout, no cancellation.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Bound each operation by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: None,
        }
    }

    /// Tie the scope to an existing token, e.g. a child of a server-wide one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Attach a fresh token, returning a handle that fires it.
    pub fn cancellable(self) -> (Self, CancellationToken) {
        let token = CancellationToken::new();
        (self.with_cancellation(token.clone()), token)
    }

    /// Per-operation timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }

    /// Drive `op` to completion unless the timeout or cancellation wins.
    pub async fn run<F, T>(&self, op: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        if self.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }

        let timeout = self.timeout;
        let deadline = async move {
            match timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            out = op => Ok(out),
            _ = cancelled => Err(Interrupted::Cancelled),
            _ = deadline => Err(Interrupted::TimedOut(timeout.unwrap_or_default())),
        }
    }
}
