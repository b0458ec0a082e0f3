//! A project folder: its index and its settings, owned together.

use manuscript_index::{normalize, FileIndex, FileRecord, IndexError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{Settings, SettingsStore, Subscription};

pub struct Workspace {
    root: PathBuf,
    index: FileIndex,
    settings: SettingsStore,
}

impl Workspace {
    /// Open `root` and index every file matching the configured glob.
    pub fn open(root: &Path, settings: Settings) -> Result<Self, IndexError> {
        let root = normalize(root);
        let mut index = FileIndex::new();
        index.index_location(&root, &settings.file_glob)?;
        info!(root = %root.display(), files = index.len(), "workspace opened");
        Ok(Self {
            root,
            index,
            settings: SettingsStore::new(settings),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index(&self) -> &FileIndex {
        &self.index
    }

    pub fn settings(&self) -> &Settings {
        self.settings.get()
    }

    /// Hear about settings changes made through [`Workspace::update_settings`].
    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&Settings, &Settings) + 'static,
    {
        self.settings.subscribe(listener)
    }

    /// Stop a listener added with [`Workspace::subscribe`].
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.settings.unsubscribe(subscription)
    }

    /// Re-index a changed path, or drop it when it no longer exists.
    pub fn refresh(&mut self, path: &Path) -> Option<&FileRecord> {
        if path.is_file() {
            self.index.index(path)
        } else {
            self.index.delete(path);
            None
        }
    }

    /// Edit the settings. A changed `file_glob` rebuilds the index.
    ///
    /// Returns whether the settings changed.
    pub fn update_settings<F>(&mut self, edit: F) -> Result<bool, IndexError>
    where
        F: FnOnce(&mut Settings),
    {
        let old_glob = self.settings.get().file_glob.clone();
        if !self.settings.update(edit) {
            return Ok(false);
        }
        let glob = &self.settings.get().file_glob;
        if *glob != old_glob {
            debug!(from = %old_glob, to = %glob, "file glob changed, rescanning");
            self.index.clear();
            self.index.index_location(&self.root, glob)?;
        }
        Ok(true)
    }

    /// Release the index.
    pub fn close(mut self) {
        self.index.dispose();
        debug!(root = %self.root.display(), "workspace closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.md"), "---\nid: alpha\n---\nA\n").unwrap();
        fs::write(dir.path().join("b.txt"), "B\n").unwrap();
        dir
    }

    #[test]
    fn open_indexes_matching_files() {
        let dir = project();
        let ws = Workspace::open(dir.path(), Settings::default()).unwrap();
        assert_eq!(ws.index().len(), 1);
        assert_eq!(ws.index().get_by_id("alpha").len(), 1);
        assert_eq!(ws.root(), normalize(dir.path()));
    }

    #[test]
    fn refresh_adds_and_removes() {
        let dir = project();
        let mut ws = Workspace::open(dir.path(), Settings::default()).unwrap();

        let new = dir.path().join("c.md");
        fs::write(&new, "---\nid: gamma\n---\n").unwrap();
        assert!(ws.refresh(&new).is_some());
        assert_eq!(ws.index().get_by_id("gamma").len(), 1);

        fs::remove_file(&new).unwrap();
        assert!(ws.refresh(&new).is_none());
        assert!(ws.index().get_by_id("gamma").is_empty());
        assert_eq!(ws.index().len(), 1);
    }

    #[test]
    fn glob_change_rescans() {
        let dir = project();
        let mut ws = Workspace::open(dir.path(), Settings::default()).unwrap();
        let notified = Rc::new(Cell::new(0));
        let counter = Rc::clone(&notified);
        ws.subscribe(move |_, _| counter.set(counter.get() + 1));

        assert!(ws.update_settings(|s| s.file_glob = "*.txt".into()).unwrap());
        let keys = ws.index().keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].ends_with("b.txt"));
        assert_eq!(notified.get(), 1);

        assert!(!ws.update_settings(|s| s.file_glob = "*.txt".into()).unwrap());
        assert_eq!(notified.get(), 1);
    }

    #[test]
    fn unsubscribed_listener_misses_updates() {
        let dir = project();
        let mut ws = Workspace::open(dir.path(), Settings::default()).unwrap();
        let notified = Rc::new(Cell::new(0));
        let counter = Rc::clone(&notified);
        let subscription = ws.subscribe(move |_, _| counter.set(counter.get() + 1));

        assert!(ws.update_settings(|s| s.format = "odt".into()).unwrap());
        assert!(ws.unsubscribe(subscription));
        assert!(ws.update_settings(|s| s.format = "pdf".into()).unwrap());
        assert_eq!(notified.get(), 1);
        assert!(!ws.unsubscribe(subscription));
    }

    #[test]
    fn other_settings_keep_index() {
        let dir = project();
        let mut ws = Workspace::open(dir.path(), Settings::default()).unwrap();
        assert!(ws.update_settings(|s| s.format = "pdf".into()).unwrap());
        assert_eq!(ws.settings().format, "pdf");
        assert_eq!(ws.index().len(), 1);
    }

    #[test]
    fn bad_glob_is_an_error() {
        let dir = project();
        let settings = Settings {
            file_glob: "[".into(),
            ..Settings::default()
        };
        assert!(matches!(
            Workspace::open(dir.path(), settings),
            Err(IndexError::Pattern { .. })
        ));
    }
}
