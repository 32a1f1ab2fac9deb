use crate::{
    config::EngineConfig,
    domain::{
        reorder::{next_order, sort_by_position},
        Issue, IssueId, OrderAssignment, Sprint, SprintId, SprintStatus,
    },
    error::{BoardError, Result},
    storage::{Persisted, Storage},
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::{fs, sync::Mutex};
use tracing::debug;

/// On-disk document for one sprint: its metadata and its whole board
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SprintRecord {
    sprint: Sprint,
    issues: Vec<Issue>,
}

impl SprintRecord {
    fn check_revision(&self, expected: Option<u64>) -> Result<()> {
        match expected {
            Some(expected) if expected != self.sprint.revision => Err(BoardError::StaleRevision {
                expected,
                actual: self.sprint.revision,
            }),
            _ => Ok(()),
        }
    }

    /// Applies placements to the in-memory copy, all or nothing
    fn apply(&mut self, changes: &[OrderAssignment]) -> Result<()> {
        let positions: HashMap<IssueId, usize> = self
            .issues
            .iter()
            .enumerate()
            .map(|(index, issue)| (issue.id, index))
            .collect();

        // Resolve everything before mutating anything
        let mut resolved = Vec::with_capacity(changes.len());
        for change in changes {
            let index = positions
                .get(&change.id)
                .ok_or_else(|| BoardError::IssueNotFound(change.id.to_string()))?;
            resolved.push((*index, change));
        }

        for (index, change) in resolved {
            self.issues[index].apply(change);
        }
        Ok(())
    }

    fn push(&mut self, issue: Issue) -> Result<()> {
        if self.issues.iter().any(|existing| existing.id == issue.id) {
            return Err(BoardError::StorageError(format!(
                "Issue {} already exists",
                issue.id
            )));
        }
        self.issues.push(issue);
        Ok(())
    }

    fn bump_revision(&mut self) -> u64 {
        self.sprint.revision += 1;
        self.sprint.revision
    }
}

/// File-based storage implementation.
///
/// Each sprint lives in one JSON document that is replaced atomically
/// (write to a temporary file, then rename), so a board write is either
/// fully visible or not at all.
pub struct FileStorage {
    root_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    const STORAGE_DIR: &'static str = ".sprintboard";
    const SPRINTS_DIR: &'static str = "sprints";

    /// Creates a new FileStorage instance for the given project root
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root_path: project_root.as_ref().join(Self::STORAGE_DIR),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the engine configuration file
    pub fn config_file(&self) -> PathBuf {
        self.root_path.join(EngineConfig::FILE_NAME)
    }

    fn sprints_dir(&self) -> PathBuf {
        self.root_path.join(Self::SPRINTS_DIR)
    }

    fn sprint_file(&self, id: &SprintId) -> PathBuf {
        self.sprints_dir().join(format!("{}.json", id))
    }

    async fn ensure_directory_exists(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            fs::create_dir_all(path).await?;
        }
        Ok(())
    }

    async fn read_record(&self, id: &SprintId) -> Result<SprintRecord> {
        let file_path = self.sprint_file(id);

        if !file_path.exists() {
            return Err(BoardError::SprintNotFound(id.to_string()));
        }

        let contents = fs::read_to_string(&file_path).await?;
        let record: SprintRecord = serde_json::from_str(&contents)?;
        Ok(record)
    }

    async fn write_record(&self, record: &SprintRecord) -> Result<()> {
        self.ensure_directory_exists(&self.sprints_dir()).await?;

        let json = serde_json::to_string_pretty(record)?;
        let file_path = self.sprint_file(&record.sprint.id);
        let tmp_path = file_path.with_extension("json.tmp");

        fs::write(&tmp_path, json).await?;
        fs::rename(&tmp_path, &file_path).await?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn initialize(&self) -> Result<()> {
        self.ensure_directory_exists(&self.root_path).await?;
        self.ensure_directory_exists(&self.sprints_dir()).await?;

        if !self.config_file().exists() {
            let config = EngineConfig::default().to_toml_string()?;
            fs::write(self.config_file(), config).await?;
        }

        let gitignore_path = self.root_path.join(".gitignore");
        if !gitignore_path.exists() {
            fs::write(gitignore_path, "# Interrupted writes\n*.tmp\n").await?;
        }

        Ok(())
    }

    async fn is_initialized(&self) -> bool {
        self.root_path.exists() && self.sprints_dir().exists()
    }

    async fn save_sprint(&self, sprint: &Sprint) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let record = match self.read_record(&sprint.id).await {
            Ok(mut existing) => {
                let revision = existing.sprint.revision;
                existing.sprint = sprint.clone();
                existing.sprint.revision = revision;
                existing
            }
            Err(BoardError::SprintNotFound(_)) => SprintRecord {
                sprint: sprint.clone(),
                issues: Vec::new(),
            },
            Err(err) => return Err(err),
        };

        self.write_record(&record).await
    }

    async fn load_sprint(&self, id: &SprintId) -> Result<Sprint> {
        Ok(self.read_record(id).await?.sprint)
    }

    async fn list_sprint_ids(&self) -> Result<Vec<SprintId>> {
        let sprints_dir = self.sprints_dir();

        if !sprints_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&sprints_dir).await?;
        let mut ids: Vec<SprintId> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if let Ok(id) = SprintId::from_str(stem) {
                        ids.push(id);
                    }
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn fetch_issues_for_sprint(&self, id: &SprintId) -> Result<Vec<Issue>> {
        let mut issues = self.read_record(id).await?.issues;
        sort_by_position(&mut issues);
        Ok(issues)
    }

    async fn insert_issue(&self, issue: &Issue) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.read_record(&issue.sprint_id).await?;
        record.push(issue.clone())?;

        let revision = record.bump_revision();
        self.write_record(&record).await?;
        Ok(revision)
    }

    async fn append_issue(&self, issue: &Issue) -> Result<(Issue, u64)> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.read_record(&issue.sprint_id).await?;
        let mut issue = issue.clone();
        issue.order = next_order(&record.issues, issue.status);
        record.push(issue.clone())?;

        let revision = record.bump_revision();
        self.write_record(&record).await?;
        Ok((issue, revision))
    }

    async fn delete_issue(
        &self,
        sprint_id: &SprintId,
        id: &IssueId,
        expected_revision: Option<u64>,
        compaction: &[OrderAssignment],
    ) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.read_record(sprint_id).await?;
        if record.sprint.status == SprintStatus::Completed {
            return Err(BoardError::SprintCompleted);
        }
        record.check_revision(expected_revision)?;

        let position = record
            .issues
            .iter()
            .position(|issue| &issue.id == id)
            .ok_or_else(|| BoardError::IssueNotFound(id.to_string()))?;
        record.issues.remove(position);
        record.apply(compaction)?;

        let revision = record.bump_revision();
        self.write_record(&record).await?;
        Ok(revision)
    }

    async fn batch_update_order(
        &self,
        sprint_id: &SprintId,
        expected_revision: Option<u64>,
        changes: &[OrderAssignment],
    ) -> Result<Persisted> {
        let _guard = self.write_lock.lock().await;

        let mut record = self.read_record(sprint_id).await?;
        record.sprint.status.ensure_board_open()?;
        record.check_revision(expected_revision)?;
        record.apply(changes)?;

        let revision = record.bump_revision();
        self.write_record(&record).await?;
        debug!(sprint = %sprint_id, changed = changes.len(), revision, "wrote board");

        let mut issues = record.issues;
        sort_by_position(&mut issues);
        Ok(Persisted { issues, revision })
    }
}
