use crate::{access::UserId, domain::sprint::SprintId, error::BoardError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Unique identifier for an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IssueId(Uuid);

impl IssueId {
    /// Generates a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for IssueId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for IssueId {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| BoardError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Column an issue occupies on the sprint board.
///
/// Variant order is the left-to-right board order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Todo,
    InProgress,
    InReview,
    Done,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 4] = [
        IssueStatus::Todo,
        IssueStatus::InProgress,
        IssueStatus::InReview,
        IssueStatus::Done,
    ];

    /// Column key as stored and exchanged with the board view
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::InReview => "IN_REVIEW",
            Self::Done => "DONE",
        }
    }
}

impl FromStr for IssueStatus {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace(['-', ' '], "_").as_str() {
            "TODO" => Ok(Self::Todo),
            "IN_PROGRESS" => Ok(Self::InProgress),
            "IN_REVIEW" => Ok(Self::InReview),
            "DONE" => Ok(Self::Done),
            _ => Err(BoardError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Todo => write!(f, "Todo"),
            Self::InProgress => write!(f, "In Progress"),
            Self::InReview => write!(f, "In Review"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// Issue priority, lowest first
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuePriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl FromStr for IssuePriority {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "URGENT" => Ok(Self::Urgent),
            _ => Err(BoardError::Other(format!("Invalid priority '{}'", s))),
        }
    }
}

impl fmt::Display for IssuePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Urgent => write!(f, "URGENT"),
        }
    }
}

/// Fields supplied when creating an issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: IssuePriority,
    #[serde(default)]
    pub assignee: Option<UserId>,
}

impl NewIssue {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            priority: IssuePriority::default(),
            assignee: None,
        }
    }

    pub fn with_priority(mut self, priority: IssuePriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_assignee(mut self, assignee: UserId) -> Self {
        self.assignee = Some(assignee);
        self
    }
}

/// An issue on a sprint board.
///
/// Only `status` and `order` are ever changed by the ordering engine; every
/// other field is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    pub id: IssueId,
    pub sprint_id: SprintId,
    pub status: IssueStatus,
    pub order: u32,
    pub priority: IssuePriority,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<UserId>,
    pub reporter: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Issue {
    /// Creates a new issue at the given position of the `TODO` column
    pub fn new(sprint_id: SprintId, reporter: UserId, fields: NewIssue, order: u32) -> Self {
        let now = Utc::now();
        Self {
            id: IssueId::new(),
            sprint_id,
            status: IssueStatus::Todo,
            order,
            priority: fields.priority,
            title: fields.title,
            description: fields.description,
            assignee: fields.assignee,
            reporter,
            created_at: now,
            updated_at: now,
        }
    }

    /// The `(id, status, order)` triple for this issue
    pub fn assignment(&self) -> OrderAssignment {
        OrderAssignment {
            id: self.id,
            status: self.status,
            order: self.order,
        }
    }

    /// Applies a placement, leaving every other field as is
    pub fn apply(&mut self, assignment: &OrderAssignment) {
        self.status = assignment.status;
        self.order = assignment.order;
    }
}

/// Placement of one issue: which column, at which position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderAssignment {
    pub id: IssueId,
    pub status: IssueStatus,
    pub order: u32,
}
