//! Identifiers
//!
//! Users and games are identified by opaque non-empty strings (typically
//! UUIDs issued by the auth and catalog services). Ranked sets are addressed
//! by `global` or `game:{game_id}`.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use super::validation::ValidationError;

/// Prefix of per-game set identifiers.
pub const GAME_SET_PREFIX: &str = "game:";

/// Identifier of the global set.
pub const GLOBAL_SET: &str = "global";

// =============================================================================
// USER ID
// =============================================================================

/// Unique user identifier.
///
/// Ordering is lexicographic byte order; ranked sets use it to break ties.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Parse a user id. Surrounding whitespace is trimmed; empty is rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// GAME ID
// =============================================================================

/// Unique game identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GameId(String);

impl GameId {
    /// Parse a game id. Surrounding whitespace is trimmed; empty is rejected.
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyGameId);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow as str.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for GameId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GameId> for String {
    fn from(id: GameId) -> Self {
        id.0
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// SET ID
// =============================================================================

/// Logical partition of the ranking index.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SetId {
    /// The single global set.
    Global,
    /// One set per game.
    Game(GameId),
}

impl SetId {
    /// Set for a game.
    pub fn game(game_id: &GameId) -> Self {
        Self::Game(game_id.clone())
    }

    /// String key (`global` or `game:{id}`).
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetId::Global => f.write_str(GLOBAL_SET),
            SetId::Game(id) => write!(f, "{}{}", GAME_SET_PREFIX, id),
        }
    }
}

impl FromStr for SetId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == GLOBAL_SET {
            return Ok(SetId::Global);
        }
        match s.strip_prefix(GAME_SET_PREFIX) {
            Some(rest) if rest == rest.trim() => GameId::parse(rest)
                .map(SetId::Game)
                .map_err(|_| ValidationError::InvalidSetId(s.to_string())),
            _ => Err(ValidationError::InvalidSetId(s.to_string())),
        }
    }
}
