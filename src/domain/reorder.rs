//! Column reordering for the sprint board.
//!
//! Every `(sprint, status)` group keeps a dense order: the issues of a column
//! carry exactly `0..n`. A move rebuilds the order of the columns it touches
//! and leaves every other column as it was.

use crate::{
    domain::{
        issue::{Issue, IssueId, IssueStatus, OrderAssignment},
        moves::Move,
    },
    error::{BoardError, Result},
};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

type Columns = BTreeMap<IssueStatus, Vec<OrderAssignment>>;

/// The outcome of reordering a sprint snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reorder {
    /// Placement of every issue in the snapshot, sorted by `(status, order)`
    pub assignments: Vec<OrderAssignment>,
    /// Columns whose order was rebuilt
    pub touched: Vec<IssueStatus>,
}

impl Reorder {
    /// Assignments that differ from the snapshot they were computed from
    pub fn changes(&self, snapshot: &[Issue]) -> Vec<OrderAssignment> {
        let before: HashMap<IssueId, OrderAssignment> = snapshot
            .iter()
            .map(|issue| (issue.id, issue.assignment()))
            .collect();

        self.assignments
            .iter()
            .filter(|a| before.get(&a.id) != Some(*a))
            .copied()
            .collect()
    }

    /// Returns the snapshot with the new placements applied
    pub fn apply(&self, snapshot: &[Issue]) -> Vec<Issue> {
        let placements: HashMap<IssueId, &OrderAssignment> =
            self.assignments.iter().map(|a| (a.id, a)).collect();

        let mut issues: Vec<Issue> = snapshot
            .iter()
            .filter_map(|issue| {
                placements.get(&issue.id).map(|placement| {
                    let mut issue = issue.clone();
                    issue.apply(placement);
                    issue
                })
            })
            .collect();
        sort_by_position(&mut issues);
        issues
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// Computes the placements produced by a validated move.
///
/// Fails with `StaleMove` when the issue is not at the move's source
/// location in `issues`; the caller must refetch before trying again.
pub fn compute_reorder(issues: &[Issue], mv: &Move) -> Result<Reorder> {
    let mut columns = partition(issues);

    let source = columns.entry(mv.source.status).or_default();
    match source.get(mv.source.index) {
        Some(found) if found.id == mv.issue_id => {}
        _ => {
            return Err(BoardError::StaleMove {
                issue: mv.issue_id.to_string(),
                column: mv.source.status.as_str().to_string(),
                index: mv.source.index,
            })
        }
    }

    // Splice: remove then insert, never swap
    let mut moving = source.remove(mv.source.index);
    moving.status = mv.destination.status;

    let destination = columns.entry(mv.destination.status).or_default();
    let at = mv.destination.index.min(destination.len());
    destination.insert(at, moving);

    let mut touched = vec![mv.source.status];
    if mv.destination.status != mv.source.status {
        touched.push(mv.destination.status);
    }
    for status in &touched {
        if let Some(column) = columns.get_mut(status) {
            renumber(column);
        }
    }

    debug!(
        issue = %mv.issue_id,
        from = mv.source.status.as_str(),
        to = mv.destination.status.as_str(),
        index = at,
        "computed reorder"
    );

    Ok(Reorder {
        assignments: flatten(columns),
        touched,
    })
}

/// Renumbers every column densely, keeping each column's relative order
pub fn compact_all(issues: &[Issue]) -> Reorder {
    let mut columns = partition(issues);
    let touched: Vec<IssueStatus> = columns.keys().copied().collect();
    for column in columns.values_mut() {
        renumber(column);
    }
    Reorder {
        assignments: flatten(columns),
        touched,
    }
}

/// Placements that close the gap left by removing `removed` from `issues`.
///
/// Only the removed issue's former column is renumbered; the returned list
/// holds just the issues whose order changes.
pub fn compaction_after_removal(issues: &[Issue], removed: &IssueId) -> Result<Vec<OrderAssignment>> {
    let target = issues
        .iter()
        .find(|issue| &issue.id == removed)
        .ok_or_else(|| BoardError::IssueNotFound(removed.to_string()))?;

    let remaining: Vec<Issue> = issues
        .iter()
        .filter(|issue| &issue.id != removed)
        .cloned()
        .collect();

    let mut columns = partition(&remaining);
    let status = target.status;
    let Some(column) = columns.get_mut(&status) else {
        return Ok(Vec::new());
    };
    renumber(column);

    let reorder = Reorder {
        assignments: flatten(columns),
        touched: vec![status],
    };
    Ok(reorder.changes(&remaining))
}

/// Position a newly created issue takes: the end of its column
pub fn next_order(issues: &[Issue], status: IssueStatus) -> u32 {
    issues.iter().filter(|issue| issue.status == status).count() as u32
}

/// Verifies that every column carries exactly `0..n`
pub fn check_density(issues: &[Issue]) -> Result<()> {
    let mut orders: BTreeMap<IssueStatus, Vec<u32>> = BTreeMap::new();
    for issue in issues {
        orders.entry(issue.status).or_default().push(issue.order);
    }

    for (status, mut column) in orders {
        column.sort_unstable();
        for (expected, actual) in column.iter().enumerate() {
            if *actual != expected as u32 {
                return Err(BoardError::OrderingCorrupted {
                    status: status.as_str().to_string(),
                    detail: format!("expected order {} but found {}", expected, actual),
                });
            }
        }
    }
    Ok(())
}

/// Sorts issues by `(status, order)`, keeping input order on ties
pub fn sort_by_position(issues: &mut [Issue]) {
    issues.sort_by_key(|issue| (issue.status, issue.order));
}

/// Splits issues into columns sorted by current order.
///
/// Ties keep their position in `issues` so the result is deterministic.
fn partition(issues: &[Issue]) -> Columns {
    let mut columns = Columns::new();
    for issue in issues {
        columns
            .entry(issue.status)
            .or_default()
            .push(issue.assignment());
    }
    for column in columns.values_mut() {
        column.sort_by_key(|a| a.order);
    }
    columns
}

fn renumber(column: &mut [OrderAssignment]) {
    for (position, assignment) in column.iter_mut().enumerate() {
        assignment.order = position as u32;
    }
}

fn flatten(columns: Columns) -> Vec<OrderAssignment> {
    let mut flat: Vec<OrderAssignment> = columns.into_values().flatten().collect();
    flat.sort_by_key(|a| (a.status, a.order));
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        access::UserId,
        domain::{
            issue::NewIssue,
            moves::{Location, Move},
            sprint::SprintId,
        },
    };

    fn issue(sprint: SprintId, title: &str, status: IssueStatus, order: u32) -> Issue {
        let mut issue = Issue::new(sprint, UserId::new("user_1"), NewIssue::new(title), order);
        issue.status = status;
        issue
    }

    fn titles(issues: &[Issue], status: IssueStatus) -> Vec<(String, u32)> {
        let mut column: Vec<&Issue> = issues.iter().filter(|i| i.status == status).collect();
        column.sort_by_key(|i| i.order);
        column.iter().map(|i| (i.title.clone(), i.order)).collect()
    }

    fn pairs(items: &[(&str, u32)]) -> Vec<(String, u32)> {
        items.iter().map(|(t, o)| (t.to_string(), *o)).collect()
    }

    #[test]
    fn test_intra_column_move() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 1),
            issue(sprint, "C", IssueStatus::Todo, 2),
        ];
        let mv = Move::new(
            issues[1].id,
            Location::new(IssueStatus::Todo, 1),
            Location::new(IssueStatus::Todo, 0),
        );

        let reorder = compute_reorder(&issues, &mv).unwrap();
        let after = reorder.apply(&issues);

        assert_eq!(
            titles(&after, IssueStatus::Todo),
            pairs(&[("B", 0), ("A", 1), ("C", 2)])
        );
        assert_eq!(reorder.touched, vec![IssueStatus::Todo]);
        assert_eq!(reorder.changes(&issues).len(), 2);
    }

    #[test]
    fn test_intra_column_move_is_splice_not_swap() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 1),
            issue(sprint, "C", IssueStatus::Todo, 2),
            issue(sprint, "D", IssueStatus::Todo, 3),
        ];
        let mv = Move::new(
            issues[0].id,
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::Todo, 2),
        );

        let after = compute_reorder(&issues, &mv).unwrap().apply(&issues);

        assert_eq!(
            titles(&after, IssueStatus::Todo),
            pairs(&[("B", 0), ("C", 1), ("A", 2), ("D", 3)])
        );
    }

    #[test]
    fn test_inter_column_move() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 1),
            issue(sprint, "C", IssueStatus::InProgress, 0),
        ];
        let mv = Move::new(
            issues[0].id,
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::InProgress, 1),
        );

        let reorder = compute_reorder(&issues, &mv).unwrap();
        let after = reorder.apply(&issues);

        assert_eq!(titles(&after, IssueStatus::Todo), pairs(&[("B", 0)]));
        assert_eq!(
            titles(&after, IssueStatus::InProgress),
            pairs(&[("C", 0), ("A", 1)])
        );
        assert_eq!(
            reorder.touched,
            vec![IssueStatus::Todo, IssueStatus::InProgress]
        );
    }

    #[test]
    fn test_move_into_empty_column() {
        let sprint = SprintId::new();
        let issues = vec![issue(sprint, "A", IssueStatus::Todo, 0)];
        let mv = Move::new(
            issues[0].id,
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::Done, 0),
        );

        let after = compute_reorder(&issues, &mv).unwrap().apply(&issues);

        assert!(titles(&after, IssueStatus::Todo).is_empty());
        assert_eq!(titles(&after, IssueStatus::Done), pairs(&[("A", 0)]));
    }

    #[test]
    fn test_destination_index_clamps_to_end() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Done, 0),
        ];
        let mv = Move::new(
            issues[0].id,
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::Done, 42),
        );

        let after = compute_reorder(&issues, &mv).unwrap().apply(&issues);

        assert_eq!(
            titles(&after, IssueStatus::Done),
            pairs(&[("B", 0), ("A", 1)])
        );
    }

    #[test]
    fn test_stale_move_wrong_index() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 1),
        ];
        let mv = Move::new(
            issues[0].id,
            Location::new(IssueStatus::Todo, 1),
            Location::new(IssueStatus::Done, 0),
        );

        let err = compute_reorder(&issues, &mv).unwrap_err();
        assert!(matches!(err, BoardError::StaleMove { index: 1, .. }));
    }

    #[test]
    fn test_stale_move_unknown_issue_or_column() {
        let sprint = SprintId::new();
        let issues = vec![issue(sprint, "A", IssueStatus::Todo, 0)];

        let unknown = Move::new(
            IssueId::new(),
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::Done, 0),
        );
        assert!(compute_reorder(&issues, &unknown).is_err());

        let wrong_column = Move::new(
            issues[0].id,
            Location::new(IssueStatus::InReview, 0),
            Location::new(IssueStatus::Done, 0),
        );
        assert!(compute_reorder(&issues, &wrong_column).is_err());

        let past_end = Move::new(
            issues[0].id,
            Location::new(IssueStatus::Todo, 5),
            Location::new(IssueStatus::Done, 0),
        );
        assert!(compute_reorder(&issues, &past_end).is_err());
    }

    #[test]
    fn test_untouched_columns_keep_their_orders() {
        let sprint = SprintId::new();
        // The review column carries a gap; a move elsewhere must not repair it
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 1),
            issue(sprint, "R1", IssueStatus::InReview, 0),
            issue(sprint, "R2", IssueStatus::InReview, 5),
        ];
        let mv = Move::new(
            issues[1].id,
            Location::new(IssueStatus::Todo, 1),
            Location::new(IssueStatus::Todo, 0),
        );

        let reorder = compute_reorder(&issues, &mv).unwrap();
        let changes = reorder.changes(&issues);

        assert!(changes.iter().all(|c| c.status == IssueStatus::Todo));
        let after = reorder.apply(&issues);
        assert_eq!(
            titles(&after, IssueStatus::InReview),
            pairs(&[("R1", 0), ("R2", 5)])
        );
    }

    #[test]
    fn test_touched_column_with_gaps_becomes_dense() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 3),
            issue(sprint, "B", IssueStatus::Todo, 7),
            issue(sprint, "C", IssueStatus::Todo, 9),
        ];
        let mv = Move::new(
            issues[2].id,
            Location::new(IssueStatus::Todo, 2),
            Location::new(IssueStatus::Todo, 0),
        );

        let after = compute_reorder(&issues, &mv).unwrap().apply(&issues);

        assert_eq!(
            titles(&after, IssueStatus::Todo),
            pairs(&[("C", 0), ("A", 1), ("B", 2)])
        );
    }

    #[test]
    fn test_duplicate_orders_break_ties_by_input_position() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 0),
            issue(sprint, "C", IssueStatus::Todo, 1),
        ];

        let reorder = compact_all(&issues);
        let after = reorder.apply(&issues);

        assert_eq!(
            titles(&after, IssueStatus::Todo),
            pairs(&[("A", 0), ("B", 1), ("C", 2)])
        );
    }

    #[test]
    fn test_output_sorted_by_status_then_order() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "D", IssueStatus::Done, 0),
            issue(sprint, "B", IssueStatus::Todo, 1),
            issue(sprint, "P", IssueStatus::InProgress, 0),
            issue(sprint, "A", IssueStatus::Todo, 0),
        ];
        let mv = Move::new(
            issues[2].id,
            Location::new(IssueStatus::InProgress, 0),
            Location::new(IssueStatus::Todo, 1),
        );

        let reorder = compute_reorder(&issues, &mv).unwrap();
        let keys: Vec<_> = reorder
            .assignments
            .iter()
            .map(|a| (a.status, a.order))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(reorder.assignments.len(), issues.len());
    }

    #[test]
    fn test_payload_preserved_by_apply() {
        let sprint = SprintId::new();
        let mut a = issue(sprint, "A", IssueStatus::Todo, 0);
        a.description = Some("details".to_string());
        a.assignee = Some(UserId::new("user_2"));
        let issues = vec![a.clone(), issue(sprint, "B", IssueStatus::Todo, 1)];
        let mv = Move::new(
            a.id,
            Location::new(IssueStatus::Todo, 0),
            Location::new(IssueStatus::InReview, 0),
        );

        let after = compute_reorder(&issues, &mv).unwrap().apply(&issues);
        let moved = after.iter().find(|i| i.id == a.id).unwrap();

        let mut expected = a.clone();
        expected.status = IssueStatus::InReview;
        expected.order = 0;
        assert_eq!(moved, &expected);
    }

    #[test]
    fn test_density_holds_across_move_sequence() {
        let sprint = SprintId::new();
        let mut issues: Vec<Issue> = (0..8)
            .map(|n| issue(sprint, &format!("I{}", n), IssueStatus::Todo, n))
            .collect();

        // Deterministic pseudo-random walk over the board
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;

            let picked = &issues[(seed % issues.len() as u64) as usize];
            let source_column: Vec<&Issue> = {
                let mut column: Vec<&Issue> =
                    issues.iter().filter(|i| i.status == picked.status).collect();
                column.sort_by_key(|i| i.order);
                column
            };
            let source_index = source_column
                .iter()
                .position(|i| i.id == picked.id)
                .unwrap();
            let destination = IssueStatus::ALL[((seed >> 8) % 4) as usize];
            let destination_index = ((seed >> 16) % 10) as usize;

            let mv = Move::new(
                picked.id,
                Location::new(picked.status, source_index),
                Location::new(destination, destination_index),
            );
            issues = compute_reorder(&issues, &mv).unwrap().apply(&issues);
            check_density(&issues).unwrap();
        }
        assert_eq!(issues.len(), 8);
    }

    #[test]
    fn test_check_density() {
        let sprint = SprintId::new();
        let dense = vec![
            issue(sprint, "A", IssueStatus::Todo, 1),
            issue(sprint, "B", IssueStatus::Todo, 0),
            issue(sprint, "C", IssueStatus::Done, 0),
        ];
        assert!(check_density(&dense).is_ok());

        let gap = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 2),
        ];
        assert!(matches!(
            check_density(&gap),
            Err(BoardError::OrderingCorrupted { .. })
        ));

        let duplicate = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 0),
        ];
        assert!(check_density(&duplicate).is_err());
    }

    #[test]
    fn test_compaction_after_removal() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 1),
            issue(sprint, "C", IssueStatus::Todo, 2),
            issue(sprint, "D", IssueStatus::Done, 0),
        ];

        let changes = compaction_after_removal(&issues, &issues[0].id).unwrap();

        assert_eq!(changes.len(), 2);
        assert!(changes.contains(&OrderAssignment {
            id: issues[1].id,
            status: IssueStatus::Todo,
            order: 0,
        }));
        assert!(changes.contains(&OrderAssignment {
            id: issues[2].id,
            status: IssueStatus::Todo,
            order: 1,
        }));

        let last = compaction_after_removal(&issues, &issues[2].id).unwrap();
        assert!(last.is_empty());

        assert!(compaction_after_removal(&issues, &IssueId::new()).is_err());
    }

    #[test]
    fn test_next_order() {
        let sprint = SprintId::new();
        let issues = vec![
            issue(sprint, "A", IssueStatus::Todo, 0),
            issue(sprint, "B", IssueStatus::Todo, 1),
            issue(sprint, "C", IssueStatus::Done, 0),
        ];
        assert_eq!(next_order(&issues, IssueStatus::Todo), 2);
        assert_eq!(next_order(&issues, IssueStatus::InReview), 0);
    }
}
