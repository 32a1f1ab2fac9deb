use crate::{
    domain::{Issue, IssueId, OrderAssignment, Sprint, SprintId},
    error::Result,
};
use async_trait::async_trait;

pub mod file_storage;

#[cfg(feature = "sqlite-storage")]
pub mod sqlite_storage;

pub use file_storage::FileStorage;

#[cfg(feature = "sqlite-storage")]
pub use sqlite_storage::SqliteStorage;

/// The board as it stands right after a committed write
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted {
    pub issues: Vec<Issue>,
    pub revision: u64,
}

/// Storage trait for persisting sprints and their issues.
///
/// Every board write advances the sprint's revision by one. Writes that take
/// an `expected_revision` are refused with `StaleRevision`, leaving storage
/// untouched, when the stored revision differs. Sprint status checks made by
/// a backend happen against the stored sprint, inside the same critical
/// section as the write.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Initializes the storage backend
    async fn initialize(&self) -> Result<()>;

    /// Checks if the storage has been initialized
    async fn is_initialized(&self) -> bool;

    /// Creates a sprint or updates its metadata.
    ///
    /// The stored revision is kept; only board writes advance it.
    async fn save_sprint(&self, sprint: &Sprint) -> Result<()>;

    /// Loads a sprint by ID
    async fn load_sprint(&self, id: &SprintId) -> Result<Sprint>;

    /// Lists all sprint IDs
    async fn list_sprint_ids(&self) -> Result<Vec<SprintId>>;

    /// Every issue of the sprint, sorted by `(status, order)`
    async fn fetch_issues_for_sprint(&self, id: &SprintId) -> Result<Vec<Issue>>;

    /// Adds an issue as given; returns the new revision
    async fn insert_issue(&self, issue: &Issue) -> Result<u64>;

    /// Adds an issue at the end of its status column.
    ///
    /// The issue's `order` is replaced by the column length read inside the
    /// write. Returns the stored issue and the new revision.
    async fn append_issue(&self, issue: &Issue) -> Result<(Issue, u64)>;

    /// Removes an issue and applies `compaction` to its siblings in the same
    /// write; returns the new revision.
    ///
    /// Refused with `SprintCompleted` once the sprint has ended.
    async fn delete_issue(
        &self,
        sprint_id: &SprintId,
        id: &IssueId,
        expected_revision: Option<u64>,
        compaction: &[OrderAssignment],
    ) -> Result<u64>;

    /// Applies every placement or none of them.
    ///
    /// Fails without writing when the sprint is not active, or when any id
    /// is unknown or belongs to another sprint. Returns the refreshed issue
    /// list of the sprint and its new revision.
    async fn batch_update_order(
        &self,
        sprint_id: &SprintId,
        expected_revision: Option<u64>,
        changes: &[OrderAssignment],
    ) -> Result<Persisted>;
}
