//! Board engine.
//!
//! Ties authorization, move validation, reordering and persistence together
//! into the operations a board client calls. Each call is one request and
//! response cycle against the store; the engine keeps no board state of its
//! own between calls.

pub mod coordinator;

use crate::{
    access::{require_member, Membership, Role, UserId},
    config::{EngineConfig, RevisionPolicy},
    domain::{
        check_density, compact_all, compute_reorder,
        reorder::compaction_after_removal,
        sort_issues, validate_move, BoardSummary, Issue, IssueId, Move, MoveDecision,
        MoveOutcome, NewIssue, ServerView, SortField, SortOrder, Sprint, SprintId, SprintStatus,
    },
    error::{BoardError, Result},
    storage::Storage,
};
use coordinator::PersistenceCoordinator;
use std::sync::Arc;
use tracing::{debug, info};

/// A sprint together with its board, sorted by `(status, order)`
#[derive(Debug, Clone, PartialEq)]
pub struct SprintBoard {
    pub sprint: Sprint,
    pub issues: Vec<Issue>,
}

impl SprintBoard {
    pub fn revision(&self) -> u64 {
        self.sprint.revision
    }

    /// Authoritative snapshot for seeding a `ClientView`
    pub fn server_view(&self) -> ServerView {
        ServerView::new(self.sprint.revision, self.issues.clone())
    }
}

pub struct BoardEngine {
    storage: Arc<dyn Storage>,
    membership: Arc<dyn Membership>,
    config: EngineConfig,
}

impl BoardEngine {
    pub fn new(
        storage: Arc<dyn Storage>,
        membership: Arc<dyn Membership>,
        config: EngineConfig,
    ) -> Self {
        Self {
            storage,
            membership,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn coordinator(&self) -> PersistenceCoordinator<'_> {
        PersistenceCoordinator::new(self.storage.as_ref(), self.config.revision_policy)
    }

    /// Loads the sprint and checks the caller belongs to its organization
    async fn authorize(&self, caller: &UserId, sprint_id: &SprintId) -> Result<(Sprint, Role)> {
        let sprint = self.storage.load_sprint(sprint_id).await?;
        let role =
            require_member(self.membership.as_ref(), &sprint.organization_id, caller).await?;
        Ok((sprint, role))
    }

    /// Member-only read of a sprint and its board
    pub async fn board(&self, caller: &UserId, sprint_id: &SprintId) -> Result<SprintBoard> {
        let (sprint, _) = self.authorize(caller, sprint_id).await?;
        let issues = self.storage.fetch_issues_for_sprint(sprint_id).await?;
        Ok(SprintBoard { sprint, issues })
    }

    /// Member-only read of a sprint's issues in a display order of the
    /// caller's choosing. Positions are left as stored.
    pub async fn sorted_issues(
        &self,
        caller: &UserId,
        sprint_id: &SprintId,
        field: SortField,
        order: SortOrder,
    ) -> Result<Vec<Issue>> {
        let mut issues = self.board(caller, sprint_id).await?.issues;
        sort_issues(&mut issues, field, order);
        Ok(issues)
    }

    /// Applies a drag-and-drop move reported by a board client.
    ///
    /// Refusals the client can recover from (inactive or completed sprint,
    /// stale position, stale revision) come back as `MoveOutcome::Rejected`
    /// and leave the store untouched. A failed write is returned as
    /// `PersistenceFailed`.
    pub async fn submit_move(
        &self,
        caller: &UserId,
        sprint_id: &SprintId,
        mv: Move,
    ) -> Result<MoveOutcome> {
        let (sprint, _) = self.authorize(caller, sprint_id).await?;

        if !self.config.board.has_column(&mv.destination.status) {
            return Err(BoardError::InvalidStatus(format!(
                "{} is not a column of board '{}'",
                mv.destination.status.as_str(),
                self.config.board.name
            )));
        }

        let decision = match validate_move(sprint.status, &mv) {
            Ok(decision) => decision,
            Err(err) => return reject(sprint_id, &mv, err),
        };

        if decision == MoveDecision::NoOp {
            debug!(sprint = %sprint_id, issue = %mv.issue_id, "no-op move");
            let issues = self.storage.fetch_issues_for_sprint(sprint_id).await?;
            return Ok(MoveOutcome::Unchanged {
                issues,
                revision: sprint.revision,
            });
        }

        if self.config.revision_policy == RevisionPolicy::Enforce {
            if let Some(base) = mv.base_revision.filter(|base| *base != sprint.revision) {
                let err = BoardError::StaleRevision {
                    expected: base,
                    actual: sprint.revision,
                };
                return reject(sprint_id, &mv, err);
            }
        }

        let snapshot = self.storage.fetch_issues_for_sprint(sprint_id).await?;
        let reorder = match compute_reorder(&snapshot, &mv) {
            Ok(reorder) => reorder,
            Err(err) => return reject(sprint_id, &mv, err),
        };

        if reorder.changes(&snapshot).is_empty() {
            debug!(sprint = %sprint_id, issue = %mv.issue_id, "move changes no placement");
            return Ok(MoveOutcome::Unchanged {
                issues: snapshot,
                revision: sprint.revision,
            });
        }

        let persisted = match self
            .coordinator()
            .persist(sprint_id, &snapshot, &reorder, mv.base_revision, sprint.revision)
            .await
        {
            Ok(persisted) => persisted,
            // The board moved on, or was locked, after it was read
            Err(err) if err.rejection().is_some() => return reject(sprint_id, &mv, err),
            Err(err) => return Err(err),
        };

        info!(
            sprint = %sprint_id,
            issue = %mv.issue_id,
            from = mv.source.status.as_str(),
            to = mv.destination.status.as_str(),
            revision = persisted.revision,
            "move applied"
        );
        Ok(MoveOutcome::Applied {
            issues: persisted.issues,
            revision: persisted.revision,
        })
    }

    /// Adds an issue at the end of the `TODO` column
    pub async fn create_issue(
        &self,
        caller: &UserId,
        sprint_id: &SprintId,
        fields: NewIssue,
    ) -> Result<Issue> {
        let (sprint, _) = self.authorize(caller, sprint_id).await?;
        if fields.title.trim().is_empty() {
            return Err(BoardError::Other("Issue title cannot be empty".to_string()));
        }

        // The store picks the position while holding the board
        let (issue, revision) = self
            .storage
            .append_issue(&Issue::new(sprint.id, caller.clone(), fields, 0))
            .await?;
        info!(
            sprint = %sprint_id,
            issue = %issue.id,
            order = issue.order,
            revision,
            "issue created"
        );
        Ok(issue)
    }

    /// Deletes an issue and closes the gap it leaves in its column.
    ///
    /// Only the reporter or an organization admin may delete. Returns the
    /// sprint's new revision.
    pub async fn delete_issue(
        &self,
        caller: &UserId,
        sprint_id: &SprintId,
        issue_id: &IssueId,
    ) -> Result<u64> {
        let (sprint, role) = self.authorize(caller, sprint_id).await?;
        if sprint.status == SprintStatus::Completed {
            return Err(BoardError::SprintCompleted);
        }
        let snapshot = self.storage.fetch_issues_for_sprint(sprint_id).await?;

        let issue = snapshot
            .iter()
            .find(|issue| &issue.id == issue_id)
            .ok_or_else(|| BoardError::IssueNotFound(issue_id.to_string()))?;
        if &issue.reporter != caller && !role.is_admin() {
            return Err(BoardError::Forbidden(
                "Only the reporter or an organization admin can delete an issue".to_string(),
            ));
        }

        let compaction = compaction_after_removal(&snapshot, issue_id)?;
        let expected = self.coordinator().expected_revision(None, sprint.revision);
        let revision = self
            .storage
            .delete_issue(sprint_id, issue_id, expected, &compaction)
            .await?;

        info!(
            sprint = %sprint_id,
            issue = %issue_id,
            compacted = compaction.len(),
            revision,
            "issue deleted"
        );
        Ok(revision)
    }

    /// Renumbers every column densely, keeping relative order
    pub async fn compact_sprint(&self, caller: &UserId, sprint_id: &SprintId) -> Result<SprintBoard> {
        let (mut sprint, _) = self.authorize(caller, sprint_id).await?;
        let snapshot = self.storage.fetch_issues_for_sprint(sprint_id).await?;

        if check_density(&snapshot).is_ok() {
            return Ok(SprintBoard {
                sprint,
                issues: snapshot,
            });
        }

        sprint.status.ensure_board_open()?;
        let reorder = compact_all(&snapshot);
        let persisted = self
            .coordinator()
            .persist(sprint_id, &snapshot, &reorder, None, sprint.revision)
            .await?;

        info!(sprint = %sprint_id, revision = persisted.revision, "sprint compacted");
        sprint.revision = persisted.revision;
        Ok(SprintBoard {
            sprint,
            issues: persisted.issues,
        })
    }

    /// Moves a sprint along its lifecycle; admins only
    pub async fn set_sprint_status(
        &self,
        caller: &UserId,
        sprint_id: &SprintId,
        status: SprintStatus,
    ) -> Result<Sprint> {
        let (mut sprint, role) = self.authorize(caller, sprint_id).await?;
        if !role.is_admin() {
            return Err(BoardError::Forbidden(
                "Only organization admins can change sprint status".to_string(),
            ));
        }

        let previous = sprint.status;
        sprint.transition_to(status)?;
        self.storage.save_sprint(&sprint).await?;

        info!(sprint = %sprint_id, from = %previous, to = %status, "sprint status changed");
        Ok(sprint)
    }

    pub async fn summary(&self, caller: &UserId, sprint_id: &SprintId) -> Result<BoardSummary> {
        let board = self.board(caller, sprint_id).await?;
        Ok(BoardSummary::from_issues(&board.issues))
    }
}

fn reject(sprint_id: &SprintId, mv: &Move, err: BoardError) -> Result<MoveOutcome> {
    match err.rejection() {
        Some(reason) => {
            info!(sprint = %sprint_id, issue = %mv.issue_id, %reason, "move rejected");
            Ok(MoveOutcome::Rejected { reason })
        }
        None => Err(err),
    }
}
