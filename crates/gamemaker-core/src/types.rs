use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// The known, ordered stages a game-making session moves through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Working out which book the child wants to play.
    Identifying,
    /// Talking about the story, characters and settings.
    Discussing,
    /// Agreeing on the game mechanics.
    Designing,
    /// The backend is building the game.
    Generating,
    /// The game is ready to play.
    Complete,
}

impl Phase {
    /// Every known phase in progression order.
    pub const ALL: [Phase; 5] = [
        Phase::Identifying,
        Phase::Discussing,
        Phase::Designing,
        Phase::Generating,
        Phase::Complete,
    ];

    /// Wire identifier used by the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Identifying => "identifying",
            Phase::Discussing => "discussing",
            Phase::Designing => "designing",
            Phase::Generating => "generating",
            Phase::Complete => "complete",
        }
    }

    /// Zero-based position within [`Phase::ALL`].
    pub fn ordinal(&self) -> usize {
        match self {
            Phase::Identifying => 0,
            Phase::Discussing => 1,
            Phase::Designing => 2,
            Phase::Generating => 3,
            Phase::Complete => 4,
        }
    }

    /// Parse a wire identifier. Returns `None` for anything unrecognized.
    pub fn parse(raw: &str) -> Option<Phase> {
        Phase::ALL.into_iter().find(|p| p.as_str() == raw)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Newtype Wrappers - Identifiers
// =============================================================================

/// Phase label as reported by the backend.
///
/// Kept as an opaque string: the backend may introduce phases this client does
/// not know about, and those must flow through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseId(pub String);

impl PhaseId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The known phase this label refers to, if any.
    pub fn known(&self) -> Option<Phase> {
        Phase::parse(&self.0)
    }
}

impl From<Phase> for PhaseId {
    fn from(phase: Phase) -> Self {
        Self(phase.as_str().to_string())
    }
}

impl From<&str> for PhaseId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for PhaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-issued session identifier. Opaque to the client.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Newtype Wrappers - Time
// =============================================================================

/// Unix timestamp in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }
}
