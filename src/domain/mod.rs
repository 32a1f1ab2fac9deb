pub mod board;
pub mod issue;
pub mod moves;
pub mod reorder;
pub mod sorting;
pub mod sprint;
pub mod view;

pub use board::{BoardConfig, BoardSummary, Column, ColumnStats};
pub use issue::{Issue, IssueId, IssuePriority, IssueStatus, NewIssue, OrderAssignment};
pub use moves::{validate_move, Location, Move, MoveDecision, MoveOutcome};
pub use reorder::{check_density, compact_all, compute_reorder, Reorder};
pub use sorting::{sort_issues, SortField, SortOrder};
pub use sprint::{Sprint, SprintId, SprintStatus};
pub use view::{ClientView, Reconciliation, ServerView};
