//! Saved queries and display defaults, persisted as JSON in the vault's
//! state directory. The settings file is glue, not source of truth for the
//! index: losing it never affects catalog correctness.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::TaskState;
use crate::query::{GroupBy, QueryDefinition};

pub const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedQuery {
    #[serde(flatten)]
    pub query: QueryDefinition,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskVaultSettings {
    #[serde(default = "default_group_by")]
    pub default_group_by: GroupBy,
    #[serde(default)]
    pub queries: Vec<SavedQuery>,
}

impl Default for TaskVaultSettings {
    fn default() -> Self {
        Self {
            default_group_by: default_group_by(),
            queries: vec![SavedQuery {
                query: QueryDefinition {
                    id: "todo-all".to_string(),
                    name: "All TODO".to_string(),
                    states: Some(vec![TaskState::Todo, TaskState::Doing]),
                    ..QueryDefinition::default()
                },
                created_at: DateTime::<Utc>::UNIX_EPOCH,
            }],
        }
    }
}

impl TaskVaultSettings {
    /// Load from `path`, falling back to defaults when the file does not
    /// exist. Malformed JSON surfaces as `VaultError::Json`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    #[must_use]
    pub fn find_query(&self, id: &str) -> Option<&SavedQuery> {
        self.queries.iter().find(|saved| saved.query.id == id)
    }

    /// Insert or replace by query id, keeping list order for replacements.
    pub fn upsert_query(&mut self, saved: SavedQuery) {
        if let Some(existing) = self
            .queries
            .iter_mut()
            .find(|q| q.query.id == saved.query.id)
        {
            *existing = saved;
        } else {
            self.queries.push(saved);
        }
    }

    pub fn remove_query(&mut self, id: &str) -> bool {
        let before = self.queries.len();
        self.queries.retain(|saved| saved.query.id != id);
        self.queries.len() != before
    }
}

fn default_group_by() -> GroupBy {
    GroupBy::Page
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn defaults_seed_one_todo_query_grouped_by_page() {
        let settings = TaskVaultSettings::default();
        assert_eq!(settings.default_group_by, GroupBy::Page);
        assert_eq!(settings.queries.len(), 1);
        assert_eq!(
            settings.queries[0].query.states,
            Some(vec![TaskState::Todo, TaskState::Doing])
        );
    }

    #[test]
    fn load_returns_defaults_when_the_file_is_missing() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(".taskvault").join(SETTINGS_FILE);
        let settings = TaskVaultSettings::load(&path).expect("load");
        assert_eq!(settings, TaskVaultSettings::default());
    }

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(".taskvault").join(SETTINGS_FILE);

        let mut settings = TaskVaultSettings::default();
        settings.upsert_query(SavedQuery {
            query: QueryDefinition {
                id: "today".to_string(),
                name: "Today".to_string(),
                tags: Some(vec!["#today".to_string()]),
                ..QueryDefinition::default()
            },
            created_at: Utc::now(),
        });
        settings.save(&path).expect("save");

        let loaded = TaskVaultSettings::load(&path).expect("load");
        assert_eq!(loaded, settings);
        assert!(loaded.find_query("today").is_some());
    }

    #[test]
    fn malformed_json_propagates_as_an_error() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join(SETTINGS_FILE);
        std::fs::write(&path, "{not json").expect("write");

        let err = TaskVaultSettings::load(&path).expect_err("must fail");
        assert_eq!(err.code(), "JSON_ERROR");
    }

    #[test]
    fn upsert_replaces_by_id_and_remove_reports_hits() {
        let mut settings = TaskVaultSettings::default();
        let renamed = SavedQuery {
            query: QueryDefinition {
                id: "todo-all".to_string(),
                name: "Open work".to_string(),
                ..QueryDefinition::default()
            },
            created_at: Utc::now(),
        };
        settings.upsert_query(renamed);
        assert_eq!(settings.queries.len(), 1);
        assert_eq!(settings.queries[0].query.name, "Open work");

        assert!(settings.remove_query("todo-all"));
        assert!(!settings.remove_query("todo-all"));
    }
}
