//! # Leaderboard Server
//!
//! Score ledger and ranking engine behind a game leaderboard service.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    LEADERBOARD SERVER                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/              - Identifiers and input validation       │
//! │  ├── ids.rs         - UserId, GameId, SetId                  │
//! │  ├── validation.rs  - Score submission checks                │
//! │  └── rng.rs         - Seeded SplitMix64 for treap priorities │
//! │                                                              │
//! │  ledger/            - System of record (append-only)         │
//! │  ├── memory.rs      - In-process ledger                      │
//! │  └── file.rs        - JSON-lines file ledger                 │
//! │                                                              │
//! │  ranking/           - Ranked sets (derived, rebuildable)     │
//! │  ├── ranked_set.rs  - Order-statistic treap                  │
//! │  └── memory.rs      - Per-set locked in-memory index         │
//! │                                                              │
//! │  service/           - Request-facing operations              │
//! │  ├── scope.rs       - Timeout and cancellation               │
//! │  ├── submission.rs  - Ledger then game set then global set   │
//! │  └── query.rs       - Pages, ranks, game leaderboards        │
//! │                                                              │
//! │  engine.rs          - Config and wiring                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering
//!
//! Every ranked set orders members by score descending, then by member id
//! ascending. Rank 1 is the highest score. Identical index state always
//! yields identical pages.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod engine;
pub mod ledger;
pub mod ranking;
pub mod service;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use crate::core::ids::{GameId, SetId, UserId};
pub use crate::core::validation::{ScoreSubmission, ValidationError};
pub use engine::{EngineConfig, LeaderboardEngine};
pub use ledger::{FileLedger, Ledger, LedgerError, MemoryLedger, ScoreEvent};
pub use ranking::{IndexError, MemoryRankingIndex, RankedEntry, RankingIndex};
pub use service::{
    LeaderboardUser, MyRank, QueryError, QueryService, RequestScope, SubmissionService,
    SubmitError, SubmitOutcome,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
