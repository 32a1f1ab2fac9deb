use crate::{
    access::{OrgId, UserId},
    domain::{
        reorder::sort_by_position, Issue, IssueId, IssuePriority, IssueStatus, OrderAssignment,
        Sprint, SprintId, SprintStatus,
    },
    error::{BoardError, Result},
    storage::{Persisted, Storage},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::{
    str::FromStr,
    sync::{Arc, Mutex},
};
use tracing::debug;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sprints (
    id              TEXT PRIMARY KEY,
    organization_id TEXT NOT NULL,
    project_id      TEXT NOT NULL,
    name            TEXT NOT NULL,
    status          TEXT NOT NULL,
    start_date      TEXT,
    end_date        TEXT,
    revision        INTEGER NOT NULL DEFAULT 0,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS issues (
    id          TEXT PRIMARY KEY,
    sprint_id   TEXT NOT NULL REFERENCES sprints(id) ON DELETE CASCADE,
    status      TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    priority    TEXT NOT NULL,
    title       TEXT NOT NULL,
    description TEXT,
    assignee    TEXT,
    reporter    TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_issues_board ON issues(sprint_id, status, order_index);
";

const ISSUE_COLUMNS: &str = "id, sprint_id, status, order_index, priority, title, description, \
                             assignee, reporter, created_at, updated_at";

/// SQLite-based storage backend.
///
/// The connection sits behind a mutex and every call runs on tokio's
/// blocking pool, so synchronous SQLite I/O never stalls async workers.
/// Each board write is a single transaction.
#[derive(Clone)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Opens (or creates) a SQLite database at the given path
    pub fn new(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path).map_err(storage_err)?;
        Self::with_connection(conn)
    }

    /// Creates an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(storage_err)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| BoardError::StorageError(format!("Connection lock poisoned: {}", e)))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| BoardError::StorageError(format!("Storage task failed: {}", e)))?
    }
}

fn storage_err(err: rusqlite::Error) -> BoardError {
    BoardError::StorageError(err.to_string())
}

fn parse_time(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| BoardError::StorageError(format!("Invalid timestamp '{}': {}", value, e)))
}

fn parse_optional_time(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(parse_time).transpose()
}

/// Row as stored, before domain validation
struct IssueRow {
    id: String,
    sprint_id: String,
    status: String,
    order: u32,
    priority: String,
    title: String,
    description: Option<String>,
    assignee: Option<String>,
    reporter: String,
    created_at: String,
    updated_at: String,
}

impl IssueRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            sprint_id: row.get(1)?,
            status: row.get(2)?,
            order: row.get(3)?,
            priority: row.get(4)?,
            title: row.get(5)?,
            description: row.get(6)?,
            assignee: row.get(7)?,
            reporter: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn into_issue(self) -> Result<Issue> {
        Ok(Issue {
            id: IssueId::from_str(&self.id)?,
            sprint_id: SprintId::from_str(&self.sprint_id)?,
            status: IssueStatus::from_str(&self.status)?,
            order: self.order,
            priority: IssuePriority::from_str(&self.priority)?,
            title: self.title,
            description: self.description,
            assignee: self.assignee.map(UserId::new),
            reporter: UserId::new(self.reporter),
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

struct SprintRow {
    id: String,
    organization_id: String,
    project_id: String,
    name: String,
    status: String,
    start_date: Option<String>,
    end_date: Option<String>,
    revision: i64,
    created_at: String,
    updated_at: String,
}

impl SprintRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            project_id: row.get(2)?,
            name: row.get(3)?,
            status: row.get(4)?,
            start_date: row.get(5)?,
            end_date: row.get(6)?,
            revision: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_sprint(self) -> Result<Sprint> {
        Ok(Sprint {
            id: SprintId::from_str(&self.id)?,
            organization_id: OrgId::new(self.organization_id),
            project_id: self.project_id,
            name: self.name,
            status: SprintStatus::from_str(&self.status)?,
            start_date: parse_optional_time(self.start_date)?,
            end_date: parse_optional_time(self.end_date)?,
            revision: self.revision as u64,
            created_at: parse_time(&self.created_at)?,
            updated_at: parse_time(&self.updated_at)?,
        })
    }
}

fn current_revision(conn: &Connection, sprint_id: &SprintId) -> Result<u64> {
    let revision: Option<i64> = conn
        .query_row(
            "SELECT revision FROM sprints WHERE id = ?1",
            params![sprint_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err)?;

    revision
        .map(|r| r as u64)
        .ok_or_else(|| BoardError::SprintNotFound(sprint_id.to_string()))
}

fn check_revision(conn: &Connection, sprint_id: &SprintId, expected: Option<u64>) -> Result<()> {
    let actual = current_revision(conn, sprint_id)?;
    match expected {
        Some(expected) if expected != actual => Err(BoardError::StaleRevision { expected, actual }),
        _ => Ok(()),
    }
}

fn stored_status(conn: &Connection, sprint_id: &SprintId) -> Result<SprintStatus> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM sprints WHERE id = ?1",
            params![sprint_id.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err)?;

    let status = status.ok_or_else(|| BoardError::SprintNotFound(sprint_id.to_string()))?;
    SprintStatus::from_str(&status)
}

fn bump_revision(conn: &Connection, sprint_id: &SprintId) -> Result<u64> {
    conn.execute(
        "UPDATE sprints SET revision = revision + 1 WHERE id = ?1",
        params![sprint_id.to_string()],
    )
    .map_err(storage_err)?;
    current_revision(conn, sprint_id)
}

fn insert_row(conn: &Connection, issue: &Issue) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO issues ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            ISSUE_COLUMNS
        ),
        params![
            issue.id.to_string(),
            issue.sprint_id.to_string(),
            issue.status.as_str(),
            issue.order,
            issue.priority.to_string(),
            issue.title,
            issue.description,
            issue.assignee.as_ref().map(|a| a.as_str().to_string()),
            issue.reporter.as_str(),
            issue.created_at.to_rfc3339(),
            issue.updated_at.to_rfc3339(),
        ],
    )
    .map_err(storage_err)?;
    Ok(())
}

fn apply_assignments(conn: &Connection, sprint_id: &SprintId, changes: &[OrderAssignment]) -> Result<()> {
    let mut stmt = conn
        .prepare("UPDATE issues SET status = ?1, order_index = ?2 WHERE id = ?3 AND sprint_id = ?4")
        .map_err(storage_err)?;

    for change in changes {
        let updated = stmt
            .execute(params![
                change.status.as_str(),
                change.order,
                change.id.to_string(),
                sprint_id.to_string()
            ])
            .map_err(storage_err)?;
        if updated != 1 {
            return Err(BoardError::IssueNotFound(change.id.to_string()));
        }
    }
    Ok(())
}

fn select_issues(conn: &Connection, sprint_id: &SprintId) -> Result<Vec<Issue>> {
    current_revision(conn, sprint_id)?;

    let mut stmt = conn
        .prepare(&format!(
            "SELECT {} FROM issues WHERE sprint_id = ?1 ORDER BY order_index ASC",
            ISSUE_COLUMNS
        ))
        .map_err(storage_err)?;

    let rows = stmt
        .query_map(params![sprint_id.to_string()], IssueRow::read)
        .map_err(storage_err)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(storage_err)?;

    let mut issues = rows
        .into_iter()
        .map(IssueRow::into_issue)
        .collect::<Result<Vec<_>>>()?;
    sort_by_position(&mut issues);
    Ok(issues)
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn initialize(&self) -> Result<()> {
        self.call(|conn| conn.execute_batch(SCHEMA).map_err(storage_err))
            .await
    }

    async fn is_initialized(&self) -> bool {
        self.call(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'sprints'",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map_err(storage_err)
        })
        .await
        .map(|count| count > 0)
        .unwrap_or(false)
    }

    async fn save_sprint(&self, sprint: &Sprint) -> Result<()> {
        let sprint = sprint.clone();
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO sprints (id, organization_id, project_id, name, status, start_date,
                                      end_date, revision, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                 ON CONFLICT(id) DO UPDATE SET
                    organization_id = excluded.organization_id,
                    project_id = excluded.project_id,
                    name = excluded.name,
                    status = excluded.status,
                    start_date = excluded.start_date,
                    end_date = excluded.end_date,
                    updated_at = excluded.updated_at",
                params![
                    sprint.id.to_string(),
                    sprint.organization_id.as_str(),
                    sprint.project_id,
                    sprint.name,
                    sprint.status.as_str(),
                    sprint.start_date.map(|t| t.to_rfc3339()),
                    sprint.end_date.map(|t| t.to_rfc3339()),
                    sprint.revision as i64,
                    sprint.created_at.to_rfc3339(),
                    sprint.updated_at.to_rfc3339(),
                ],
            )
            .map_err(storage_err)?;
            Ok(())
        })
        .await
    }

    async fn load_sprint(&self, id: &SprintId) -> Result<Sprint> {
        let id = *id;
        self.call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT id, organization_id, project_id, name, status, start_date, end_date,
                            revision, created_at, updated_at
                     FROM sprints WHERE id = ?1",
                    params![id.to_string()],
                    SprintRow::read,
                )
                .optional()
                .map_err(storage_err)?
                .ok_or_else(|| BoardError::SprintNotFound(id.to_string()))?;
            row.into_sprint()
        })
        .await
    }

    async fn list_sprint_ids(&self) -> Result<Vec<SprintId>> {
        self.call(|conn| {
            let mut stmt = conn
                .prepare("SELECT id FROM sprints")
                .map_err(storage_err)?;
            let raw = stmt
                .query_map([], |row| row.get::<_, String>(0))
                .map_err(storage_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(storage_err)?;

            let mut ids = raw
                .iter()
                .map(|id| SprintId::from_str(id))
                .collect::<Result<Vec<_>>>()?;
            ids.sort();
            Ok(ids)
        })
        .await
    }

    async fn fetch_issues_for_sprint(&self, id: &SprintId) -> Result<Vec<Issue>> {
        let id = *id;
        self.call(move |conn| select_issues(conn, &id)).await
    }

    async fn insert_issue(&self, issue: &Issue) -> Result<u64> {
        let issue = issue.clone();
        self.call(move |conn| {
            let tx = conn.transaction().map_err(storage_err)?;
            current_revision(&tx, &issue.sprint_id)?;
            insert_row(&tx, &issue)?;

            let revision = bump_revision(&tx, &issue.sprint_id)?;
            tx.commit().map_err(storage_err)?;
            Ok(revision)
        })
        .await
    }

    async fn append_issue(&self, issue: &Issue) -> Result<(Issue, u64)> {
        let mut issue = issue.clone();
        self.call(move |conn| {
            let tx = conn.transaction().map_err(storage_err)?;
            current_revision(&tx, &issue.sprint_id)?;

            let column_len: i64 = tx
                .query_row(
                    "SELECT COUNT(*) FROM issues WHERE sprint_id = ?1 AND status = ?2",
                    params![issue.sprint_id.to_string(), issue.status.as_str()],
                    |row| row.get(0),
                )
                .map_err(storage_err)?;
            issue.order = column_len as u32;
            insert_row(&tx, &issue)?;

            let revision = bump_revision(&tx, &issue.sprint_id)?;
            tx.commit().map_err(storage_err)?;
            Ok((issue, revision))
        })
        .await
    }

    async fn delete_issue(
        &self,
        sprint_id: &SprintId,
        id: &IssueId,
        expected_revision: Option<u64>,
        compaction: &[OrderAssignment],
    ) -> Result<u64> {
        let (sprint_id, id) = (*sprint_id, *id);
        let compaction = compaction.to_vec();
        self.call(move |conn| {
            let tx = conn.transaction().map_err(storage_err)?;
            if stored_status(&tx, &sprint_id)? == SprintStatus::Completed {
                return Err(BoardError::SprintCompleted);
            }
            check_revision(&tx, &sprint_id, expected_revision)?;

            let deleted = tx
                .execute(
                    "DELETE FROM issues WHERE id = ?1 AND sprint_id = ?2",
                    params![id.to_string(), sprint_id.to_string()],
                )
                .map_err(storage_err)?;
            if deleted != 1 {
                return Err(BoardError::IssueNotFound(id.to_string()));
            }

            apply_assignments(&tx, &sprint_id, &compaction)?;
            let revision = bump_revision(&tx, &sprint_id)?;
            tx.commit().map_err(storage_err)?;
            Ok(revision)
        })
        .await
    }

    async fn batch_update_order(
        &self,
        sprint_id: &SprintId,
        expected_revision: Option<u64>,
        changes: &[OrderAssignment],
    ) -> Result<Persisted> {
        let sprint_id = *sprint_id;
        let changes = changes.to_vec();
        self.call(move |conn| {
            // Dropping the transaction on any early return rolls it back
            let tx = conn.transaction().map_err(storage_err)?;
            stored_status(&tx, &sprint_id)?.ensure_board_open()?;
            check_revision(&tx, &sprint_id, expected_revision)?;
            apply_assignments(&tx, &sprint_id, &changes)?;
            let revision = bump_revision(&tx, &sprint_id)?;
            let issues = select_issues(&tx, &sprint_id)?;
            tx.commit().map_err(storage_err)?;

            debug!(sprint = %sprint_id, changed = changes.len(), revision, "wrote board");
            Ok(Persisted { issues, revision })
        })
        .await
    }
}
