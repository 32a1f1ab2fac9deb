use crate::{access::OrgId, error::BoardError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;

/// Unique identifier for a sprint
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SprintId(Uuid);

impl SprintId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SprintId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for SprintId {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| BoardError::InvalidId(s.to_string()))
    }
}

impl fmt::Display for SprintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a sprint; only an active sprint's board accepts moves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SprintStatus {
    Planned,
    Active,
    Completed,
}

impl SprintStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "PLANNED",
            Self::Active => "ACTIVE",
            Self::Completed => "COMPLETED",
        }
    }

    /// Sprints only move forward: planned, then active, then completed
    pub fn can_transition_to(&self, target: &SprintStatus) -> bool {
        match (self, target) {
            (Self::Planned, Self::Active) => true,
            (Self::Active, Self::Completed) => true,
            _ if self == target => true,
            _ => false,
        }
    }

    /// The board only takes moves while the sprint is active
    pub fn ensure_board_open(&self) -> Result<(), BoardError> {
        match self {
            Self::Active => Ok(()),
            Self::Planned => Err(BoardError::SprintNotActive),
            Self::Completed => Err(BoardError::SprintCompleted),
        }
    }
}

impl FromStr for SprintStatus {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PLANNED" => Ok(Self::Planned),
            "ACTIVE" => Ok(Self::Active),
            "COMPLETED" => Ok(Self::Completed),
            _ => Err(BoardError::InvalidStatus(s.to_string())),
        }
    }
}

impl fmt::Display for SprintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sprint and the board it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sprint {
    pub id: SprintId,
    pub organization_id: OrgId,
    pub project_id: String,
    pub name: String,
    pub status: SprintStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Bumped on every board write; used for compare-and-swap
    #[serde(default)]
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sprint {
    /// Creates a planned sprint at revision zero
    pub fn new(organization_id: OrgId, project_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SprintId::new(),
            organization_id,
            project_id: project_id.into(),
            name: name.into(),
            status: SprintStatus::Planned,
            start_date: None,
            end_date: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets both dates with validation
    pub fn set_date_range(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), BoardError> {
        if start > end {
            return Err(BoardError::Other(format!(
                "Sprint start {} is after its end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        self.start_date = Some(start);
        self.end_date = Some(end);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Changes the sprint status
    pub fn transition_to(&mut self, new_status: SprintStatus) -> Result<(), BoardError> {
        if !self.status.can_transition_to(&new_status) {
            return Err(BoardError::InvalidSprintTransition {
                from: self.status.to_string(),
                to: new_status.to_string(),
            });
        }
        if self.status != new_status {
            self.status = new_status;
            self.updated_at = Utc::now();
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == SprintStatus::Active
    }
}
