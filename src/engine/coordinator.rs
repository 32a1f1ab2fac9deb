use crate::{
    config::RevisionPolicy,
    domain::{Issue, OrderAssignment, Reorder, SprintId},
    error::{BoardError, Result},
    storage::{Persisted, Storage},
};
use tracing::{debug, warn};

/// Writes computed placements to the store in one batch.
///
/// The batch holds only the placements that differ from the snapshot the
/// reorder was computed from. A failed write is never retried row by row.
pub struct PersistenceCoordinator<'a> {
    storage: &'a dyn Storage,
    policy: RevisionPolicy,
}

impl<'a> PersistenceCoordinator<'a> {
    pub fn new(storage: &'a dyn Storage, policy: RevisionPolicy) -> Self {
        Self { storage, policy }
    }

    /// Revision a write must match, if any
    pub fn expected_revision(&self, base: Option<u64>, current: u64) -> Option<u64> {
        match self.policy {
            RevisionPolicy::Enforce => Some(base.unwrap_or(current)),
            RevisionPolicy::LastWriteWins => None,
        }
    }

    /// Persists `reorder` for the sprint whose stored revision was `current`.
    ///
    /// Refusals the store makes against the current board (stale revision,
    /// locked sprint) are passed through; every other store failure becomes
    /// `PersistenceFailed`.
    pub async fn persist(
        &self,
        sprint_id: &SprintId,
        snapshot: &[Issue],
        reorder: &Reorder,
        base_revision: Option<u64>,
        current: u64,
    ) -> Result<Persisted> {
        let changes = reorder.changes(snapshot);
        self.write(sprint_id, &changes, base_revision, current).await
    }

    pub async fn write(
        &self,
        sprint_id: &SprintId,
        changes: &[OrderAssignment],
        base_revision: Option<u64>,
        current: u64,
    ) -> Result<Persisted> {
        let expected = self.expected_revision(base_revision, current);

        let persisted = match self
            .storage
            .batch_update_order(sprint_id, expected, changes)
            .await
        {
            Ok(persisted) => persisted,
            Err(err) if err.rejection().is_some() => return Err(err),
            Err(err) => {
                warn!(sprint = %sprint_id, changed = changes.len(), error = %err, "batch write failed");
                return Err(BoardError::PersistenceFailed(err.to_string()));
            }
        };

        debug!(
            sprint = %sprint_id,
            changed = changes.len(),
            revision = persisted.revision,
            "persisted placements"
        );
        Ok(persisted)
    }
}
