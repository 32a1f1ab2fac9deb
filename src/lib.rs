//! # Sprintboard Core
//!
//! Ordering engine for sprint boards.
//!
//! Every column of a sprint board keeps a dense order (`0..n`). This crate
//! validates drag-and-drop moves against the sprint lifecycle, recomputes the
//! order of the affected columns and persists the result in a single
//! all-or-nothing write. It also carries the client side of the protocol:
//! an optimistic view that is reconciled against each authoritative
//! response.
//!
//! Storage backends and the membership directory are pluggable through the
//! [`Storage`] and [`access::Membership`] traits.

pub mod access;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod storage;

// Re-export commonly used types
pub use config::{EngineConfig, RevisionPolicy};
pub use domain::{
    board::{BoardConfig, BoardSummary, Column},
    issue::{Issue, IssueId, IssuePriority, IssueStatus, NewIssue, OrderAssignment},
    moves::{Location, Move, MoveOutcome},
    sprint::{Sprint, SprintId, SprintStatus},
    view::{ClientView, Reconciliation, ServerView},
};
pub use engine::{BoardEngine, SprintBoard};
pub use error::{BoardError, Rejection, Result};
pub use storage::{FileStorage, Storage};
