//! `TaskVault`: one owned instance per open corpus, no ambient singletons.
//!
//! The facade wires the storage collaborator, the dispatch loop, and the
//! saved-query settings together and exposes the surface the presentation
//! layer consumes. Mutations are eventually consistent: each one writes the
//! document and then feeds the corresponding change notification back into
//! the dispatcher, so the catalog the caller reads next reflects the write.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::config::VaultConfig;
use crate::error::Result;
use crate::models::{PropertyList, TaskPriority, TaskRecord, TaskState, VaultEvent};
use crate::mutator;
use crate::query::{self, GroupBy, QueryDefinition};
use crate::session::Dispatcher;
use crate::settings::{SETTINGS_FILE, SavedQuery, TaskVaultSettings};
use crate::vault::LocalVault;

pub struct TaskVault {
    dispatcher: Dispatcher<LocalVault>,
    settings_path: PathBuf,
    settings: TaskVaultSettings,
}

impl std::fmt::Debug for TaskVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskVault").finish_non_exhaustive()
    }
}

impl TaskVault {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_config(root, VaultConfig::default())
    }

    pub fn open_with_config(root: impl Into<PathBuf>, config: VaultConfig) -> Result<Self> {
        let vault = LocalVault::with_config(root, config)?;
        let settings_path = vault.state_dir().join(SETTINGS_FILE);
        let settings = TaskVaultSettings::load(&settings_path)?;
        Ok(Self {
            dispatcher: Dispatcher::new(vault),
            settings_path,
            settings,
        })
    }

    /// Full corpus scan; call once after `open`.
    pub fn initialize(&mut self) -> Result<()> {
        self.dispatcher.initialize()
    }

    pub fn get_all_tasks(&self) -> Vec<Arc<TaskRecord>> {
        self.dispatcher.catalog().all()
    }

    pub fn get_tasks_for_page(&self, path: &str) -> Vec<Arc<TaskRecord>> {
        self.dispatcher.catalog().for_page(path)
    }

    pub fn get_task_by_id(&self, id: &str) -> Option<Arc<TaskRecord>> {
        self.dispatcher.catalog().get(id)
    }

    pub fn task_count(&self) -> usize {
        self.dispatcher.catalog().len()
    }

    pub fn pages(&self) -> Vec<String> {
        self.dispatcher.catalog().pages().map(String::from).collect()
    }

    pub fn update_task_state(&mut self, id: &str, state: TaskState) -> Result<()> {
        let page = self.page_of(id);
        mutator::set_state(self.dispatcher.store(), self.dispatcher.catalog(), id, state)?;
        self.resync(page)
    }

    pub fn update_task_priority(&mut self, id: &str, priority: Option<TaskPriority>) -> Result<()> {
        let page = self.page_of(id);
        mutator::set_priority(
            self.dispatcher.store(),
            self.dispatcher.catalog(),
            id,
            priority,
        )?;
        self.resync(page)
    }

    pub fn update_task_property(&mut self, id: &str, key: &str, value: Option<&str>) -> Result<()> {
        let page = self.page_of(id);
        mutator::set_property(
            self.dispatcher.store(),
            self.dispatcher.catalog(),
            id,
            key,
            value,
        )?;
        self.resync(page)
    }

    pub fn update_task_properties(&mut self, id: &str, properties: &PropertyList) -> Result<()> {
        let page = self.page_of(id);
        mutator::set_properties(
            self.dispatcher.store(),
            self.dispatcher.catalog(),
            id,
            properties,
        )?;
        self.resync(page)
    }

    /// TODO -> DOING -> DONE -> CANCELED -> TODO.
    pub fn cycle_task_state(&mut self, id: &str) -> Result<()> {
        let Some(task) = self.get_task_by_id(id) else {
            return Ok(());
        };
        self.update_task_state(id, task.state.cycle_next())
    }

    /// none -> C -> B -> A -> none.
    pub fn cycle_task_priority(&mut self, id: &str) -> Result<()> {
        let Some(task) = self.get_task_by_id(id) else {
            return Ok(());
        };
        self.update_task_priority(id, TaskPriority::cycle_next(task.priority))
    }

    /// Run a query over the full catalog snapshot.
    pub fn run_query(&self, query: &QueryDefinition) -> Vec<Arc<TaskRecord>> {
        query::execute_query(&self.get_all_tasks(), query)
    }

    /// Group the full catalog snapshot.
    pub fn group_all(
        &self,
        group_by: GroupBy,
        property_key: &str,
    ) -> std::collections::BTreeMap<String, Vec<Arc<TaskRecord>>> {
        query::group_tasks(&self.get_all_tasks(), group_by, property_key)
    }

    pub fn apply_event(&mut self, event: VaultEvent) -> Result<()> {
        self.dispatcher.apply(event)
    }

    pub fn sweep(&mut self) -> Result<Vec<VaultEvent>> {
        self.dispatcher.sweep()
    }

    #[must_use]
    pub fn settings(&self) -> &TaskVaultSettings {
        &self.settings
    }

    pub fn save_query(&mut self, query: QueryDefinition) -> Result<()> {
        self.settings.upsert_query(SavedQuery {
            query,
            created_at: Utc::now(),
        });
        self.settings.save(&self.settings_path)
    }

    pub fn remove_saved_query(&mut self, id: &str) -> Result<bool> {
        let removed = self.settings.remove_query(id);
        if removed {
            self.settings.save(&self.settings_path)?;
        }
        Ok(removed)
    }

    pub fn set_default_group_by(&mut self, group_by: GroupBy) -> Result<()> {
        self.settings.default_group_by = group_by;
        self.settings.save(&self.settings_path)
    }

    fn page_of(&self, id: &str) -> Option<String> {
        self.dispatcher.catalog().get(id).map(|t| t.page.clone())
    }

    /// Close the loop after a mutation: the storage write is the source of
    /// truth, the catalog catches up by reindexing the affected page.
    fn resync(&mut self, page: Option<String>) -> Result<()> {
        match page {
            Some(path) => self.dispatcher.apply(VaultEvent::Changed { path }),
            None => Ok(()),
        }
    }
}
