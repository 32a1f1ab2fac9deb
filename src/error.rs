use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BoardError>;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Sprint not found: {0}")]
    SprintNotFound(String),

    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Invalid sprint status transition from {from} to {to}")]
    InvalidSprintTransition { from: String, to: String },

    #[error("Board is not yet active. Start the sprint to update the board")]
    SprintNotActive,

    #[error("Sprint has ended. The board can no longer be updated")]
    SprintCompleted,

    #[error("Stale move: issue {issue} is no longer at {column}[{index}]")]
    StaleMove {
        issue: String,
        column: String,
        index: usize,
    },

    #[error("Stale revision: expected {expected}, store is at {actual}")]
    StaleRevision { expected: u64, actual: u64 },

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("User {user} is not a member of organization {org}")]
    NotAMember { org: String, user: String },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Ordering corrupted in column {status}: {detail}")]
    OrderingCorrupted { status: String, detail: String },

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    Other(String),
}

impl BoardError {
    /// Maps recoverable, user-facing failures onto a rejection reason.
    ///
    /// Returns `None` for failures the caller cannot resolve by refetching
    /// or waiting for the sprint to change state.
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::SprintNotActive => Some(Rejection::SprintNotActive),
            Self::SprintCompleted => Some(Rejection::SprintCompleted),
            Self::StaleMove { .. } => Some(Rejection::StaleMove),
            Self::StaleRevision { .. } => Some(Rejection::StaleRevision),
            _ => None,
        }
    }
}

/// Reason a move was refused without touching storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rejection {
    SprintNotActive,
    SprintCompleted,
    StaleMove,
    StaleRevision,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SprintNotActive => "sprint-not-active",
            Self::SprintCompleted => "sprint-completed",
            Self::StaleMove => "stale-move",
            Self::StaleRevision => "stale-revision",
        }
    }

    /// Stale rejections mean the local snapshot must be refetched
    pub fn requires_refetch(&self) -> bool {
        matches!(self, Self::StaleMove | Self::StaleRevision)
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
