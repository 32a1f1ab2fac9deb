use crate::{
    domain::{
        issue::{Issue, IssueId, IssueStatus},
        sprint::SprintStatus,
    },
    error::{Rejection, Result},
};
use serde::{Deserialize, Serialize};

/// A position on the board: column and index within it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub status: IssueStatus,
    pub index: usize,
}

impl Location {
    pub fn new(status: IssueStatus, index: usize) -> Self {
        Self { status, index }
    }
}

/// A drag-and-drop relocation reported by the board view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Move {
    pub issue_id: IssueId,
    pub source: Location,
    pub destination: Location,
    /// Sprint revision the client computed this move against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_revision: Option<u64>,
}

impl Move {
    pub fn new(issue_id: IssueId, source: Location, destination: Location) -> Self {
        Self {
            issue_id,
            source,
            destination,
            base_revision: None,
        }
    }

    pub fn at_revision(mut self, revision: u64) -> Self {
        self.base_revision = Some(revision);
        self
    }

    /// Dropping an issue back where it was picked up
    pub fn is_noop(&self) -> bool {
        self.source == self.destination
    }

    pub fn is_intra_column(&self) -> bool {
        self.source.status == self.destination.status
    }
}

/// What to do with a move that passed validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveDecision {
    Apply,
    NoOp,
}

/// Result of submitting a move to the board engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum MoveOutcome {
    /// The move was persisted; `issues` is the authoritative board
    Applied { issues: Vec<Issue>, revision: u64 },
    /// Nothing to persist; `issues` is the current board
    Unchanged { issues: Vec<Issue>, revision: u64 },
    /// The move was refused and storage was not touched
    Rejected { reason: Rejection },
}

impl MoveOutcome {
    pub fn issues(&self) -> Option<&[Issue]> {
        match self {
            Self::Applied { issues, .. } | Self::Unchanged { issues, .. } => Some(issues),
            Self::Rejected { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Self::Rejected { reason } => Some(*reason),
            _ => None,
        }
    }
}

/// Decides whether a move may touch the board of a sprint in `sprint_status`
pub fn validate_move(sprint_status: SprintStatus, mv: &Move) -> Result<MoveDecision> {
    sprint_status.ensure_board_open()?;
    if mv.is_noop() {
        Ok(MoveDecision::NoOp)
    } else {
        Ok(MoveDecision::Apply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoardError;

    fn sample_move(from: Location, to: Location) -> Move {
        Move::new(IssueId::new(), from, to)
    }

    #[test]
    fn test_rejects_planned_sprint() {
        let mv = sample_move(
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::Done, 0),
        );
        let err = validate_move(SprintStatus::Planned, &mv).unwrap_err();
        assert!(matches!(err, BoardError::SprintNotActive));
    }

    #[test]
    fn test_rejects_completed_sprint() {
        let mv = sample_move(
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::Todo, 1),
        );
        let err = validate_move(SprintStatus::Completed, &mv).unwrap_err();
        assert!(matches!(err, BoardError::SprintCompleted));
    }

    #[test]
    fn test_rejects_noop_on_inactive_sprint() {
        let here = Location::new(IssueStatus::Todo, 0);
        let mv = sample_move(here, here);
        assert!(validate_move(SprintStatus::Planned, &mv).is_err());
    }

    #[test]
    fn test_same_location_is_noop() {
        let here = Location::new(IssueStatus::InReview, 2);
        let mv = sample_move(here, here);
        assert!(mv.is_noop());
        assert_eq!(
            validate_move(SprintStatus::Active, &mv).unwrap(),
            MoveDecision::NoOp
        );
    }

    #[test]
    fn test_same_column_different_index_applies() {
        let mv = sample_move(
            Location::new(IssueStatus::Todo, 1),
            Location::new(IssueStatus::Todo, 0),
        );
        assert!(mv.is_intra_column());
        assert_eq!(
            validate_move(SprintStatus::Active, &mv).unwrap(),
            MoveDecision::Apply
        );
    }

    #[test]
    fn test_move_wire_format() {
        let mv = sample_move(
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::InProgress, 1),
        )
        .at_revision(4);
        let json = serde_json::to_value(mv).unwrap();
        assert_eq!(json["destination"]["status"], "IN_PROGRESS");
        assert_eq!(json["baseRevision"], 4);
    }
}
