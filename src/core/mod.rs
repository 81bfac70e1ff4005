//! Core primitives.
//!
//! Identifiers, input validation and the deterministic generator used by
//! ranked sets.

pub mod ids;
pub mod rng;
pub mod validation;

// Re-export core types
pub use ids::{GameId, SetId, UserId};
pub use rng::DeterministicRng;
pub use validation::{ScoreSubmission, ValidSubmission, ValidationError};
