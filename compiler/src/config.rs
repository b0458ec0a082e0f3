//! Project settings and the store that hands them out.
//!
//! Settings come from `manuscript.toml` at the project root (every key is
//! optional), then CLI flags are layered on top by the caller.
//!
//! ```toml
//! toc_file = "contents.md"
//! format = "odt"
//! template = "styles/reference.odt"
//! inline_errors = true
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Settings file looked up at the project root.
pub const CONFIG_FILE: &str = "manuscript.toml";

/// When to ask the operator where the compiled file should go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveDialog {
    #[default]
    Never,
    Always,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Name of the table-of-contents file
    pub toc_file: String,
    /// Drop `//` lines instead of copying them into the output
    pub skip_comments: bool,
    /// Write include errors into the compiled document
    pub inline_errors: bool,
    /// Ask before converting a document that has include errors
    pub confirm_on_errors: bool,
    /// Converter output format (`docx`, `odt`, `pdf`, `html`, ...)
    pub format: String,
    /// Read the input with smart punctuation (`--` and `---` become dashes)
    pub smart_dashes: bool,
    /// Reference document for styled formats
    pub template: Option<PathBuf>,
    pub save_dialog: SaveDialog,
    /// Which files the project index picks up
    pub file_glob: String,
    /// Converter executable
    pub converter: String,
    /// Scratch directory for flattened documents, relative to the TOC
    pub work_dir: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            toc_file: "toc.md".to_string(),
            skip_comments: true,
            inline_errors: false,
            confirm_on_errors: true,
            format: "docx".to_string(),
            smart_dashes: false,
            template: None,
            save_dialog: SaveDialog::Never,
            file_glob: "**/*.md".to_string(),
            converter: "pandoc".to_string(),
            work_dir: ".manuscript".to_string(),
        }
    }
}

/// Load settings for a project.
///
/// An explicit `config` path must exist. Without one, `<root>/manuscript.toml`
/// is used when present and defaults otherwise. A relative `template` is
/// taken relative to the settings file.
pub fn load(root: &Path, config: Option<&Path>) -> Result<Settings> {
    let path = match config {
        Some(path) => path.to_path_buf(),
        None => {
            let candidate = root.join(CONFIG_FILE);
            if !candidate.is_file() {
                debug!(root = %root.display(), "no settings file, using defaults");
                return Ok(Settings::default());
            }
            candidate
        }
    };

    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read settings {}", path.display()))?;
    let mut settings: Settings = toml::from_str(&text)
        .with_context(|| format!("invalid settings in {}", path.display()))?;

    if let Some(template) = settings.template.take() {
        let base = path.parent().unwrap_or(root);
        settings.template = Some(if template.is_absolute() {
            template
        } else {
            base.join(template)
        });
    }
    debug!(path = %path.display(), "settings loaded");
    Ok(settings)
}

// ── Store ────────────────────────────────────────────────────────

type Listener = Box<dyn FnMut(&Settings, &Settings)>;

/// Handle returned by [`SettingsStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription(usize);

/// Current settings plus the listeners that want to hear about changes.
///
/// One owner writes; listeners get `(old, new)` synchronously, and only when
/// the value actually changed.
pub struct SettingsStore {
    current: Settings,
    listeners: Vec<(Subscription, Listener)>,
    next_id: usize,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            current: settings,
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn get(&self) -> &Settings {
        &self.current
    }

    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&Settings, &Settings) + 'static,
    {
        let id = Subscription(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Returns false when the subscription was already gone.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(id, _)| *id != subscription);
        self.listeners.len() != before
    }

    /// Swap in new settings. Returns whether anything changed.
    pub fn replace(&mut self, settings: Settings) -> bool {
        if settings == self.current {
            return false;
        }
        let old = std::mem::replace(&mut self.current, settings);
        for (_, listener) in &mut self.listeners {
            listener(&old, &self.current);
        }
        true
    }

    /// Edit a copy of the current settings and publish it.
    pub fn update<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = self.current.clone();
        edit(&mut next);
        self.replace(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_file() {
        let dir = TempDir::new().unwrap();
        let settings = load(dir.path(), None).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.toc_file, "toc.md");
        assert!(settings.skip_comments);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "format = \"odt\"\nsave_dialog = \"always\"\ntemplate = \"ref.odt\"\n",
        )
        .unwrap();
        let settings = load(dir.path(), None).unwrap();
        assert_eq!(settings.format, "odt");
        assert_eq!(settings.save_dialog, SaveDialog::Always);
        assert_eq!(settings.template, Some(dir.path().join("ref.odt")));
        assert_eq!(settings.file_glob, "**/*.md");
    }

    #[test]
    fn unknown_key_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "fromat = \"odt\"\n").unwrap();
        let err = load(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("invalid settings"), "Got: {err:#}");
    }

    #[test]
    fn explicit_config_must_exist() {
        let dir = TempDir::new().unwrap();
        assert!(load(dir.path(), Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn listeners_see_changes_only() {
        let seen: Rc<RefCell<Vec<(String, String)>>> = Rc::default();
        let mut store = SettingsStore::new(Settings::default());
        let sink = Rc::clone(&seen);
        store.subscribe(move |old, new| {
            sink.borrow_mut().push((old.format.clone(), new.format.clone()));
        });

        assert!(!store.update(|_| {}));
        assert!(store.update(|s| s.format = "pdf".into()));
        assert!(!store.replace(store.get().clone()));

        assert_eq!(*seen.borrow(), vec![("docx".to_string(), "pdf".to_string())]);
        assert_eq!(store.get().format, "pdf");
    }

    #[test]
    fn unsubscribed_listener_is_silent() {
        let calls = Rc::new(RefCell::new(0));
        let mut store = SettingsStore::new(Settings::default());
        let counter = Rc::clone(&calls);
        let sub = store.subscribe(move |_, _| *counter.borrow_mut() += 1);

        store.update(|s| s.inline_errors = true);
        assert!(store.unsubscribe(sub));
        assert!(!store.unsubscribe(sub));
        store.update(|s| s.inline_errors = false);

        assert_eq!(*calls.borrow(), 1);
    }
}
