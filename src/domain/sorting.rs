use crate::domain::issue::Issue;
use std::str::FromStr;

/// Fields available for sorting issues
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Position,
    Priority,
    Title,
    Status,
    Created,
    Updated,
}

/// Sort order direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl FromStr for SortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "position" | "order" => Ok(SortField::Position),
            "priority" => Ok(SortField::Priority),
            "title" => Ok(SortField::Title),
            "status" => Ok(SortField::Status),
            "created" => Ok(SortField::Created),
            "updated" => Ok(SortField::Updated),
            _ => Err(format!(
                "Invalid sort field '{}'. Valid fields: position, priority, title, status, created, updated",
                s
            )),
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(SortOrder::Ascending),
            "desc" => Ok(SortOrder::Descending),
            _ => Err(format!(
                "Invalid sort order '{}'. Valid orders: asc, desc",
                s
            )),
        }
    }
}

/// Sorts issues in place by the given field and direction.
///
/// `Position` sorts by column, then by order within the column, which is the
/// board's top-to-bottom reading order.
///
/// # Examples
/// ```
/// use sprintboard_core::access::UserId;
/// use sprintboard_core::domain::sorting::{sort_issues, SortField, SortOrder};
/// use sprintboard_core::domain::{Issue, IssuePriority, NewIssue, SprintId};
///
/// let sprint = SprintId::new();
/// let reporter = UserId::new("user_1");
/// let mut issues = vec![
///     Issue::new(sprint, reporter.clone(), NewIssue::new("Low").with_priority(IssuePriority::Low), 0),
///     Issue::new(sprint, reporter.clone(), NewIssue::new("Urgent").with_priority(IssuePriority::Urgent), 1),
/// ];
///
/// sort_issues(&mut issues, SortField::Priority, SortOrder::Descending);
/// assert_eq!(issues[0].title, "Urgent");
/// ```
pub fn sort_issues(issues: &mut [Issue], field: SortField, order: SortOrder) {
    issues.sort_by(|a, b| {
        let cmp = match field {
            SortField::Position => (a.status, a.order).cmp(&(b.status, b.order)),
            SortField::Priority => a.priority.cmp(&b.priority),
            SortField::Title => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
            SortField::Status => a.status.cmp(&b.status),
            SortField::Created => a.created_at.cmp(&b.created_at),
            SortField::Updated => a.updated_at.cmp(&b.updated_at),
        };

        match order {
            SortOrder::Ascending => cmp,
            SortOrder::Descending => cmp.reverse(),
        }
    });
}
