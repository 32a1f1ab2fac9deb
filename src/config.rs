use crate::{
    domain::BoardConfig,
    error::{BoardError, Result},
};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};
use tokio::fs;

/// How concurrent writers to the same board are arbitrated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevisionPolicy {
    /// Writes carry the revision they were computed against and are refused
    /// when the sprint has moved on
    #[default]
    Enforce,
    /// The later write wins and fully determines the order
    LastWriteWins,
}

/// Engine configuration, usually read from `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub revision_policy: RevisionPolicy,
    pub board: BoardConfig,
}

impl EngineConfig {
    pub const FILE_NAME: &'static str = "config.toml";

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(contents).map_err(|e| BoardError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration file, falling back to defaults when absent
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path).await?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| BoardError::ConfigError(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.board.columns.is_empty() {
            return Err(BoardError::ConfigError(
                "Board must have at least one column".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for column in &self.board.columns {
            if !seen.insert(column.status) {
                return Err(BoardError::ConfigError(format!(
                    "Duplicate column for status {}",
                    column.status.as_str()
                )));
            }
        }
        Ok(())
    }
}
