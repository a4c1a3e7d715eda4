//! Storage collaborator: enumerate, read, and atomically replace documents.
//!
//! The core addresses documents by vault-relative path strings with `/`
//! separators. Writes are whole-document replaces through a temp file plus
//! rename, so a concurrent reader never observes a torn document.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::config::VaultConfig;
use crate::error::{Result, VaultError};

pub trait VaultStore {
    /// Relative paths of every document in the corpus, sorted.
    fn list_documents(&self) -> Result<Vec<String>>;

    /// Full text of one document. `VaultError::NotFound` when it does not
    /// exist (callers distinguish a vanished document from real I/O trouble
    /// via [`VaultError::is_not_found`]).
    fn read(&self, path: &str) -> Result<String>;

    /// Single whole-document replace.
    fn write(&self, path: &str, content: &str) -> Result<()>;

    fn exists(&self, path: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct LocalVault {
    root: PathBuf,
    config: VaultConfig,
    excludes: Option<GlobSet>,
}

impl LocalVault {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Self::with_config(root, VaultConfig::default())
    }

    pub fn with_config(root: impl Into<PathBuf>, config: VaultConfig) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let excludes = if config.exclude_globs.is_empty() {
            None
        } else {
            let mut builder = GlobSetBuilder::new();
            for pattern in &config.exclude_globs {
                builder
                    .add(Glob::new(pattern).map_err(|e| VaultError::Validation(e.to_string()))?);
            }
            Some(
                builder
                    .build()
                    .map_err(|e| VaultError::Validation(e.to_string()))?,
            )
        };

        Ok(Self {
            root,
            config,
            excludes,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(&self.config.state_dir)
    }

    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        if relative.is_absolute() {
            return Err(VaultError::PathTraversal(path.to_string()));
        }
        for component in relative.components() {
            match component {
                Component::Normal(_) => {}
                _ => return Err(VaultError::PathTraversal(path.to_string())),
            }
        }
        Ok(self.root.join(relative))
    }

    fn keep_entry(&self, entry: &walkdir::DirEntry) -> bool {
        if entry.depth() == 0 {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        if entry.depth() == 1 && name == self.config.state_dir.as_str() {
            return false;
        }
        self.config.include_hidden || !name.starts_with('.')
    }

    fn is_document(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        self.config.extensions.iter().any(|e| *e == ext)
    }
}

impl VaultStore for LocalVault {
    fn list_documents(&self) -> Result<Vec<String>> {
        let mut documents = Vec::new();
        let walker = WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| self.keep_entry(entry));

        for item in walker {
            let item = item.map_err(|e| VaultError::Validation(e.to_string()))?;
            if !item.file_type().is_file() || !self.is_document(item.path()) {
                continue;
            }
            let relative = item
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| VaultError::Validation(e.to_string()))?;
            if let Some(excludes) = &self.excludes
                && excludes.is_match(relative)
            {
                continue;
            }
            let mut segments: Vec<String> = Vec::new();
            for component in relative.components() {
                segments.push(component.as_os_str().to_string_lossy().to_string());
            }
            documents.push(segments.join("/"));
        }

        documents.sort();
        Ok(documents)
    }

    fn read(&self, path: &str) -> Result<String> {
        let resolved = self.resolve(path)?;
        if !resolved.is_file() {
            return Err(VaultError::NotFound(path.to_string()));
        }
        Ok(fs::read_to_string(resolved)?)
    }

    fn write(&self, path: &str, content: &str) -> Result<()> {
        let resolved = self.resolve(path)?;
        let parent = resolved
            .parent()
            .ok_or_else(|| VaultError::Validation(format!("target has no parent: {path}")))?;
        fs::create_dir_all(parent)?;

        let file_name = resolved
            .file_name()
            .and_then(|x| x.to_str())
            .ok_or_else(|| VaultError::Validation(format!("invalid target filename: {path}")))?;
        let tmp_name = format!(
            ".{file_name}.taskvault.tmp.{}",
            uuid::Uuid::new_v4().simple()
        );
        let tmp_path = parent.join(tmp_name);

        {
            let mut tmp = fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&tmp_path)?;
            tmp.write_all(content.as_bytes())?;
            tmp.sync_all()?;
        }

        if let Err(err) = fs::rename(&tmp_path, &resolved) {
            let _ = fs::remove_file(&tmp_path);
            return Err(VaultError::from(err));
        }

        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }
}
