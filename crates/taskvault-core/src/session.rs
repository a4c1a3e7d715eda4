//! Single-actor dispatch between the storage collaborator and the catalog.
//!
//! All change notifications for the corpus funnel through one `Dispatcher`,
//! so per-path processing is strictly sequential and the catalog's two views
//! are never observed mid-swap. Content hashes let the polling sweep skip
//! documents whose bytes did not change.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::catalog::TaskCatalog;
use crate::error::Result;
use crate::models::VaultEvent;
use crate::vault::VaultStore;

pub struct Dispatcher<S: VaultStore> {
    store: S,
    catalog: TaskCatalog,
    content_hashes: HashMap<String, blake3::Hash>,
}

impl<S: VaultStore> Dispatcher<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            catalog: TaskCatalog::new(),
            content_hashes: HashMap::new(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn catalog(&self) -> &TaskCatalog {
        &self.catalog
    }

    /// Full corpus scan. Documents that vanish between enumeration and read
    /// are treated as deleted; any other read failure aborts the scan with
    /// the catalog still consistent for everything indexed so far.
    pub fn initialize(&mut self) -> Result<()> {
        for path in self.store.list_documents()? {
            self.index_path(&path)?;
        }
        debug!(tasks = self.catalog.len(), "initial scan complete");
        Ok(())
    }

    /// Route one storage notification into the catalog.
    pub fn apply(&mut self, event: VaultEvent) -> Result<()> {
        match event {
            VaultEvent::Changed { path } => self.index_path(&path),
            VaultEvent::Deleted { path } => {
                self.drop_path(&path);
                Ok(())
            }
            VaultEvent::Renamed { from, to } => {
                self.drop_path(&from);
                self.index_path(&to)
            }
        }
    }

    /// Polling reconciliation: diff the corpus against the indexed state and
    /// apply the difference. Returns the events that were applied. Unchanged
    /// documents (by content hash) are skipped entirely.
    pub fn sweep(&mut self) -> Result<Vec<VaultEvent>> {
        let listed = self.store.list_documents()?;
        let mut seen: HashSet<&str> = HashSet::with_capacity(listed.len());
        let mut events = Vec::new();

        for path in &listed {
            seen.insert(path);
            let text = match self.store.read(path) {
                Ok(text) => text,
                Err(err) if err.is_not_found() => {
                    if self.content_hashes.contains_key(path) {
                        self.drop_path(path);
                        events.push(VaultEvent::Deleted { path: path.clone() });
                    }
                    continue;
                }
                Err(err) => return Err(err),
            };
            let hash = blake3::hash(text.as_bytes());
            if self.content_hashes.get(path) == Some(&hash) {
                continue;
            }
            self.content_hashes.insert(path.clone(), hash);
            self.catalog.reindex(path, &text);
            events.push(VaultEvent::Changed { path: path.clone() });
        }

        let gone: Vec<String> = self
            .content_hashes
            .keys()
            .filter(|path| !seen.contains(path.as_str()))
            .cloned()
            .collect();
        for path in gone {
            self.drop_path(&path);
            events.push(VaultEvent::Deleted { path });
        }

        Ok(events)
    }

    fn index_path(&mut self, path: &str) -> Result<()> {
        match self.store.read(path) {
            Ok(text) => {
                self.content_hashes
                    .insert(path.to_string(), blake3::hash(text.as_bytes()));
                self.catalog.reindex(path, &text);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(page = path, "document vanished before read; dropping");
                self.drop_path(path);
                Ok(())
            }
            Err(err) => {
                // Failed reindex must not shed the path's existing records.
                warn!(page = path, error = %err, "reindex read failed");
                Err(err)
            }
        }
    }

    fn drop_path(&mut self, path: &str) {
        self.content_hashes.remove(path);
        self.catalog.remove(path);
    }
}
