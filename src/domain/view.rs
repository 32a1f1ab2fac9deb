//! Optimistic board state held by a client.
//!
//! The client applies a move to its own copy of the board before the engine
//! confirms it. `ServerView` is the last authoritative snapshot and
//! `ClientView` layers at most one speculative change on top of it. Every
//! response goes through [`ClientView::reconcile`]; the two views are never
//! merged implicitly.

use crate::{
    domain::{
        issue::Issue,
        moves::{validate_move, Move, MoveDecision, MoveOutcome},
        reorder::compute_reorder,
        sprint::SprintStatus,
    },
    error::{BoardError, Result},
};
use tracing::warn;

/// Authoritative board as last returned by the engine
#[derive(Debug, Clone, PartialEq)]
pub struct ServerView {
    pub revision: u64,
    pub issues: Vec<Issue>,
}

impl ServerView {
    pub fn new(revision: u64, issues: Vec<Issue>) -> Self {
        Self { revision, issues }
    }
}

/// How a response was folded into the client view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The engine's board was adopted
    Confirmed,
    /// The speculative change was dropped; the last good board is shown
    Reverted,
    /// The speculative change was dropped and the board must be refetched
    /// before another move is allowed
    RefetchRequired,
}

#[derive(Debug, Clone)]
pub struct ClientView {
    server: ServerView,
    speculative: Option<Vec<Issue>>,
    pending: Option<Move>,
    needs_refetch: bool,
}

impl ClientView {
    pub fn new(server: ServerView) -> Self {
        Self {
            server,
            speculative: None,
            pending: None,
            needs_refetch: false,
        }
    }

    /// The board as the user should see it right now
    pub fn issues(&self) -> &[Issue] {
        self.speculative.as_deref().unwrap_or(&self.server.issues)
    }

    pub fn server(&self) -> &ServerView {
        &self.server
    }

    pub fn pending(&self) -> Option<&Move> {
        self.pending.as_ref()
    }

    pub fn needs_refetch(&self) -> bool {
        self.needs_refetch
    }

    /// Applies a move locally ahead of confirmation.
    ///
    /// Returns the move to submit, stamped with the revision it was computed
    /// against, or `None` when the move changes nothing.
    pub fn apply_optimistic(&mut self, sprint_status: SprintStatus, mv: Move) -> Result<Option<Move>> {
        if self.pending.is_some() {
            return Err(BoardError::Other(
                "Another move is still waiting for confirmation".to_string(),
            ));
        }
        if self.needs_refetch {
            return Err(BoardError::Other(
                "Board must be refetched before the next move".to_string(),
            ));
        }

        if validate_move(sprint_status, &mv)? == MoveDecision::NoOp {
            return Ok(None);
        }

        let reorder = match compute_reorder(&self.server.issues, &mv) {
            Ok(reorder) => reorder,
            Err(err) => {
                self.needs_refetch = err.rejection().is_some_and(|r| r.requires_refetch());
                return Err(err);
            }
        };

        let stamped = mv.at_revision(self.server.revision);
        self.speculative = Some(reorder.apply(&self.server.issues));
        self.pending = Some(stamped);
        Ok(Some(stamped))
    }

    /// Folds the engine's response to the pending move into the view
    pub fn reconcile(&mut self, response: Result<MoveOutcome>) -> Reconciliation {
        self.pending = None;
        self.speculative = None;

        match response {
            Ok(MoveOutcome::Applied { issues, revision })
            | Ok(MoveOutcome::Unchanged { issues, revision }) => {
                self.server = ServerView::new(revision, issues);
                Reconciliation::Confirmed
            }
            Ok(MoveOutcome::Rejected { reason }) if reason.requires_refetch() => {
                self.needs_refetch = true;
                Reconciliation::RefetchRequired
            }
            Ok(MoveOutcome::Rejected { .. }) => Reconciliation::Reverted,
            Err(err) => match err.rejection() {
                Some(reason) if reason.requires_refetch() => {
                    self.needs_refetch = true;
                    Reconciliation::RefetchRequired
                }
                Some(_) => Reconciliation::Reverted,
                None => {
                    // Local state may already be stale after a failed write
                    warn!(error = %err, "move failed; reverting optimistic board");
                    self.needs_refetch = true;
                    Reconciliation::Reverted
                }
            },
        }
    }

    /// Replaces the authoritative snapshot with a freshly fetched one
    pub fn refresh(&mut self, server: ServerView) {
        self.server = server;
        self.speculative = None;
        self.pending = None;
        self.needs_refetch = false;
    }
}
