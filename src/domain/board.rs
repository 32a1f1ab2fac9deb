use crate::domain::issue::{Issue, IssuePriority, IssueStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a sprint board column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub status: IssueStatus,
}

impl Column {
    pub fn new(name: impl Into<String>, status: IssueStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }
}

/// Board configuration: the closed set of columns, left to right
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "Sprint Board".to_string(),
            columns: vec![
                Column::new("Todo", IssueStatus::Todo),
                Column::new("In Progress", IssueStatus::InProgress),
                Column::new("In Review", IssueStatus::InReview),
                Column::new("Done", IssueStatus::Done),
            ],
        }
    }
}

impl BoardConfig {
    /// Gets the column configuration for a status
    pub fn column_for_status(&self, status: &IssueStatus) -> Option<&Column> {
        self.columns.iter().find(|col| &col.status == status)
    }

    /// Checks whether the board shows a column for the status
    pub fn has_column(&self, status: &IssueStatus) -> bool {
        self.column_for_status(status).is_some()
    }
}

/// Per-column counters shown in the column header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub count: usize,
    pub urgent_count: usize,
    pub high_count: usize,
}

/// Aggregate view of a sprint board
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardSummary {
    pub columns: BTreeMap<IssueStatus, ColumnStats>,
    pub total_issues: usize,
    pub completed_issues: usize,
    pub in_progress_issues: usize,
    pub todo_issues: usize,
    /// Share of issues in `DONE`, between 0.0 and 1.0
    pub completion_rate: f64,
}

impl BoardSummary {
    pub fn from_issues(issues: &[Issue]) -> Self {
        let mut columns: BTreeMap<IssueStatus, ColumnStats> = IssueStatus::ALL
            .iter()
            .map(|status| (*status, ColumnStats::default()))
            .collect();

        for issue in issues {
            let stats = columns.entry(issue.status).or_default();
            stats.count += 1;
            match issue.priority {
                IssuePriority::Urgent => stats.urgent_count += 1,
                IssuePriority::High => stats.high_count += 1,
                _ => {}
            }
        }

        let count = |status: IssueStatus| columns.get(&status).map(|s| s.count).unwrap_or(0);
        let total_issues = issues.len();
        let completed_issues = count(IssueStatus::Done);
        let in_progress_issues = count(IssueStatus::InProgress);
        let todo_issues = count(IssueStatus::Todo);

        let completion_rate = if total_issues == 0 {
            0.0
        } else {
            completed_issues as f64 / total_issues as f64
        };

        Self {
            columns,
            total_issues,
            completed_issues,
            in_progress_issues,
            todo_issues,
            completion_rate,
        }
    }

    pub fn column(&self, status: IssueStatus) -> ColumnStats {
        self.columns.get(&status).copied().unwrap_or_default()
    }
}
