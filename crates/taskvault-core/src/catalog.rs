//! In-memory derived index over all documents' tasks.
//!
//! The catalog keeps two views over the same records: by-page (parse order)
//! and by-identifier (point lookup). It is a pure cache over document text;
//! reindexing a page fully replaces that page's contribution. Identity is
//! line-position based, so a task whose line moved is a brand-new record
//! even when its content is unchanged.
//!
//! All mutation happens from a single logical actor; the two views are only
//! ever updated together inside one `&mut self` call, so readers never
//! observe a half-applied page swap.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::grammar::parse_document;
use crate::models::TaskRecord;

#[derive(Debug, Default)]
pub struct TaskCatalog {
    by_page: BTreeMap<String, Vec<Arc<TaskRecord>>>,
    by_id: HashMap<String, Arc<TaskRecord>>,
}

impl TaskCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every record attributed to `path` with a fresh parse of
    /// `content`. Stale identifiers are evicted before insertion so a moved
    /// line never leaves its old id behind.
    pub fn reindex(&mut self, path: &str, content: &str) {
        let records: Vec<Arc<TaskRecord>> = parse_document(path, content)
            .into_iter()
            .map(Arc::new)
            .collect();
        self.evict(path);
        for record in &records {
            self.by_id.insert(record.id.clone(), Arc::clone(record));
        }
        debug!(page = path, tasks = records.len(), "reindexed page");
        self.by_page.insert(path.to_string(), records);
    }

    /// Drop all records for `path` from both views. No-op when unknown.
    pub fn remove(&mut self, path: &str) {
        if self.evict(path) {
            debug!(page = path, "removed page from catalog");
        }
    }

    /// `remove(old)` followed by `reindex(new, content)`, applied inside one
    /// mutation so no reader sees both or neither page.
    pub fn rename(&mut self, old_path: &str, new_path: &str, content: &str) {
        self.remove(old_path);
        self.reindex(new_path, content);
    }

    /// Snapshot of every indexed task, page by page in path order, ascending
    /// line order within a page.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<TaskRecord>> {
        self.by_page.values().flatten().cloned().collect()
    }

    /// Tasks for one page; empty (not an error) when the path is unknown.
    #[must_use]
    pub fn for_page(&self, path: &str) -> Vec<Arc<TaskRecord>> {
        self.by_page.get(path).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<TaskRecord>> {
        self.by_id.get(id).cloned()
    }

    pub fn pages(&self) -> impl Iterator<Item = &str> {
        self.by_page.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn evict(&mut self, path: &str) -> bool {
        match self.by_page.remove(path) {
            Some(old) => {
                for record in &old {
                    self.by_id.remove(&record.id);
                }
                true
            }
            None => false,
        }
    }
}
