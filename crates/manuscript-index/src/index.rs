//! The file registry: one record per document, plus an id → owners map.
//!
//! ## Invariants
//!
//! | Map | Key | Rule |
//! |-----|-----|------|
//! | `files` | normalized path | exactly one [`FileRecord`] per path |
//! | `ids` | declared id | every owner path is present in `files`; empty buckets are dropped |
//!
//! Re-indexing a path replaces its record wholesale. If the id changed, the
//! path leaves its old bucket first.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::IndexError;
use crate::metadata::{self, Metadata};
use crate::path::{normalize, with_appended_extension};

/// Extension of a document's free-text notes file (`one.md` → `one.md.txt`).
pub const NOTES_SUFFIX: &str = ".txt";

/// Indexed view of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// Normalized absolute path (the index key)
    pub path: PathBuf,
    /// `metadata.id`, when declared
    pub id: Option<String>,
    /// Parsed front matter; `None` when absent or unparsable
    pub metadata: Option<Metadata>,
    /// Sibling notes file, when one exists
    pub notes: Option<PathBuf>,
}

/// In-memory registry of indexed documents.
#[derive(Debug, Default)]
pub struct FileIndex {
    files: BTreeMap<PathBuf, FileRecord>,
    ids: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl FileIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) a single file.
    ///
    /// Returns `None` without touching the index when the path is empty or
    /// is not an existing regular file.
    pub fn index(&mut self, path: &Path) -> Option<&FileRecord> {
        if path.as_os_str().is_empty() {
            return None;
        }
        let key = normalize(path);
        if !key.is_file() {
            debug!(path = %key.display(), "not a file, skipping");
            return None;
        }

        let metadata = metadata::extract_metadata(&key);
        let id = metadata.as_ref().and_then(Metadata::id);
        let notes = Some(with_appended_extension(&key, NOTES_SUFFIX)).filter(|p| p.is_file());
        let record = FileRecord {
            path: key.clone(),
            id,
            metadata,
            notes,
        };

        if let Some(previous) = self.files.remove(&key) {
            self.unlink_id(&previous);
        }
        if let Some(id) = &record.id {
            self.ids.entry(id.clone()).or_default().insert(key.clone());
        }
        debug!(path = %key.display(), id = ?record.id, "indexed");
        self.files.insert(key.clone(), record);
        self.files.get(&key)
    }

    /// Index every file matching `pattern` under `base_dir`.
    ///
    /// Directories matched by the pattern are skipped. Returns every path
    /// currently in the index, not only the ones this scan added.
    pub fn index_location(
        &mut self,
        base_dir: &Path,
        pattern: &str,
    ) -> Result<Vec<PathBuf>, IndexError> {
        if base_dir.as_os_str().is_empty() {
            return Err(IndexError::EmptyArgument("base directory"));
        }
        if pattern.trim().is_empty() {
            return Err(IndexError::EmptyArgument("pattern"));
        }

        let base = normalize(base_dir);
        // Escape the base so `[draft]` style folder names are taken literally
        let escaped = glob::Pattern::escape(&base.to_string_lossy());
        let full = Path::new(&escaped).join(pattern);
        let entries = glob::glob(&full.to_string_lossy()).map_err(|source| IndexError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;

        let mut added = 0usize;
        for entry in entries {
            let path = entry.map_err(|err| IndexError::Scan {
                path: err.path().to_path_buf(),
                source: err.into_error(),
            })?;
            if path.is_dir() {
                continue;
            }
            if self.index(&path).is_some() {
                added += 1;
            }
        }
        info!(base = %base.display(), pattern, added, total = self.files.len(), "indexed location");
        Ok(self.keys())
    }

    pub fn get_by_path(&self, path: &Path) -> Option<&FileRecord> {
        if path.as_os_str().is_empty() {
            return None;
        }
        self.files.get(&normalize(path))
    }

    /// All records declaring `id`. More than one means the id is ambiguous.
    pub fn get_by_id(&self, id: &str) -> Vec<&FileRecord> {
        self.ids
            .get(id)
            .map(|owners| owners.iter().filter_map(|p| self.files.get(p)).collect())
            .unwrap_or_default()
    }

    /// Remove a path. Deleting an absent path is a no-op.
    pub fn delete(&mut self, path: &Path) -> Option<FileRecord> {
        if path.as_os_str().is_empty() {
            return None;
        }
        let record = self.files.remove(&normalize(path))?;
        self.unlink_id(&record);
        debug!(path = %record.path.display(), "removed from index");
        Some(record)
    }

    /// Indexed paths, sorted.
    pub fn keys(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// Declared ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        self.ids.keys().cloned().collect()
    }

    /// Ids declared by more than one file, with their owners.
    pub fn conflicts(&self) -> Vec<(&str, Vec<&Path>)> {
        self.ids
            .iter()
            .filter(|(_, owners)| owners.len() > 1)
            .map(|(id, owners)| (id.as_str(), owners.iter().map(PathBuf::as_path).collect()))
            .collect()
    }

    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn clear(&mut self) {
        self.files.clear();
        self.ids.clear();
    }

    /// Clear the index and release its storage.
    pub fn dispose(&mut self) {
        let dropped = self.files.len();
        self.files = BTreeMap::new();
        self.ids = BTreeMap::new();
        debug!(dropped, "index disposed");
    }

    fn unlink_id(&mut self, record: &FileRecord) {
        let Some(id) = &record.id else {
            return;
        };
        if let Some(owners) = self.ids.get_mut(id) {
            owners.remove(&record.path);
            if owners.is_empty() {
                self.ids.remove(id);
            }
        }
    }
}
