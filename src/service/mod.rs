//! Services
//!
//! The write path ([`SubmissionService`]) and read path ([`QueryService`])
//! exposed to the HTTP layer. Both depend only on the `Ledger` and
//! `RankingIndex` traits.

pub mod query;
pub mod scope;
pub mod submission;

pub use query::{LeaderboardUser, MyRank, PageRequest, QueryConfig, QueryError, QueryService, NOT_RANKED};
pub use scope::{Interrupted, RequestScope};
pub use submission::{
    Compensation, PartialStage, PartialWrite, SubmissionConfig, SubmissionService,
    SubmitError, SubmitOutcome,
};
