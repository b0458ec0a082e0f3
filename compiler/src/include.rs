//! Include directive expansion for manuscript documents.
//!
//! A line holding one or more `{reference}` tokens is replaced by the
//! contents of the referenced files, expanded recursively, depth-first and
//! left to right. A reference is either a declared metadata id or a path
//! (absolute, or relative to the file that contains the token).
//!
//! ## Resolution rules
//!
//! | Reference | Result |
//! |-----------|--------|
//! | id with one owner | that owner's file |
//! | id with several owners | `Ambiguous` error, nothing emitted |
//! | anything else | path relative to the including file |
//! | path already open on this branch | `Circular` error, nothing emitted |
//! | path that does not exist | `Missing` error, nothing emitted |
//!
//! Only the current branch is checked for cycles, so a shared appendix may be
//! pulled in from two different chapters. Flattening never fails as a whole:
//! every problem becomes an [`IncludeError`] and expansion carries on.

use manuscript_index::{normalize, FileIndex};
use regex::Regex;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::debug;

use crate::config::Settings;

/// Maximum nesting of included files.
pub const MAX_DEPTH: usize = 64;

/// Matches `{reference}` tokens; several may share a line.
static RE_INCLUDE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());

/// Lines starting with this marker are comments, never include directives.
const COMMENT_PREFIX: &str = "//";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IncludeErrorKind {
    #[error("file not found: {}", path.display())]
    Missing { path: PathBuf },
    #[error("multiple files share the id '{id}', none included ({})", list_paths(owners))]
    Ambiguous { id: String, owners: Vec<PathBuf> },
    #[error("circular or duplicate inclusion of {}", path.display())]
    Circular { path: PathBuf },
    #[error("failed to read {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },
    #[error("includes nested deeper than {MAX_DEPTH} levels at {}", path.display())]
    TooDeep { path: PathBuf },
}

fn list_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// One recoverable problem found while flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeError {
    pub kind: IncludeErrorKind,
    /// The reference as written, without braces
    pub reference: String,
    /// File holding the token; `None` for text that has no file of its own
    pub file: Option<PathBuf>,
    /// 1-based line of the token
    pub line: usize,
}

impl fmt::Display for IncludeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{}:{}: {}", file.display(), self.line, self.kind),
            None => write!(f, "line {}: {}", self.line, self.kind),
        }
    }
}

/// Knobs that change how lines are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeOptions {
    /// Drop `//` comment lines (otherwise they are copied verbatim)
    pub skip_comments: bool,
    /// Follow each failing line with a visible error block
    pub inline_errors: bool,
}

impl From<&Settings> for IncludeOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            skip_comments: settings.skip_comments,
            inline_errors: settings.inline_errors,
        }
    }
}

/// Result of flattening one root document.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Flattened {
    pub lines: Vec<String>,
    pub errors: Vec<IncludeError>,
}

impl Flattened {
    /// The flattened document as text, newline-terminated.
    pub fn text(&self) -> String {
        let mut text = self.lines.join("\n");
        text.push('\n');
        text
    }
}

/// Per-call traversal state.
struct Resolution {
    lines: Vec<String>,
    errors: Vec<IncludeError>,
    /// Files open on the current branch, outermost first
    open: Vec<PathBuf>,
}

/// Expands include directives, resolving ids through a [`FileIndex`].
pub struct IncludeResolver<'a> {
    index: &'a FileIndex,
    options: IncludeOptions,
}

impl<'a> IncludeResolver<'a> {
    pub fn new(index: &'a FileIndex, options: IncludeOptions) -> Self {
        Self { index, options }
    }

    /// Flatten `text`, resolving relative references against `root_dir`.
    ///
    /// When the text was read from `root_file`, that file counts as open so
    /// a chapter that includes its own TOC is reported instead of looping.
    pub fn flatten(&self, text: &str, root_dir: &Path, root_file: Option<&Path>) -> Flattened {
        let root_file = root_file.map(normalize);
        let mut state = Resolution {
            lines: Vec::new(),
            errors: Vec::new(),
            open: root_file.iter().cloned().collect(),
        };
        self.expand(text, &normalize(root_dir), root_file.as_deref(), &mut state);
        debug!(
            lines = state.lines.len(),
            errors = state.errors.len(),
            "flattened document"
        );
        Flattened {
            lines: state.lines,
            errors: state.errors,
        }
    }

    fn expand(&self, text: &str, current_dir: &Path, current_file: Option<&Path>, state: &mut Resolution) {
        for (number, line) in text.lines().enumerate() {
            if line.starts_with(COMMENT_PREFIX) {
                if !self.options.skip_comments {
                    state.lines.push(line.to_string());
                }
                continue;
            }

            if !RE_INCLUDE.is_match(line) {
                state.lines.push(line.to_string());
                continue;
            }
            // A directive line whose tokens are all blank expands to nothing.
            let references = extract_references(line);

            let mut line_errors = Vec::new();
            for reference in references {
                if let Err(kind) = self.include(reference, current_dir, state) {
                    debug!(reference, error = %kind, "include failed");
                    line_errors.push(IncludeError {
                        kind,
                        reference: reference.to_string(),
                        file: current_file.map(Path::to_path_buf),
                        line: number + 1,
                    });
                }
            }

            if self.options.inline_errors && !line_errors.is_empty() {
                annotate(&mut state.lines, &line_errors);
            }
            state.errors.extend(line_errors);
        }
    }

    /// Resolve one reference and splice its expansion into the output.
    fn include(
        &self,
        reference: &str,
        current_dir: &Path,
        state: &mut Resolution,
    ) -> Result<(), IncludeErrorKind> {
        let target = self.resolve(reference, current_dir)?;

        if state.open.contains(&target) {
            return Err(IncludeErrorKind::Circular { path: target });
        }
        if state.open.len() >= MAX_DEPTH {
            return Err(IncludeErrorKind::TooDeep { path: target });
        }
        if !target.is_file() {
            return Err(IncludeErrorKind::Missing { path: target });
        }

        let content = fs::read_to_string(&target).map_err(|err| IncludeErrorKind::Unreadable {
            path: target.clone(),
            message: err.to_string(),
        })?;
        let child_dir = target
            .parent()
            .unwrap_or_else(|| Path::new("/"))
            .to_path_buf();

        if opens_front_matter(&content) && state.lines.last().is_some_and(|l| !l.trim().is_empty()) {
            state.lines.push(String::new());
        }

        state.open.push(target.clone());
        self.expand(&content, &child_dir, Some(&target), state);
        state.open.pop();
        Ok(())
    }

    /// Resolution order: unique id, ambiguous id, then a path.
    fn resolve(&self, reference: &str, current_dir: &Path) -> Result<PathBuf, IncludeErrorKind> {
        match self.index.get_by_id(reference).as_slice() {
            [] => Ok(normalize(&current_dir.join(reference))),
            [owner] => Ok(owner.path.clone()),
            owners => Err(IncludeErrorKind::Ambiguous {
                id: reference.to_string(),
                owners: owners.iter().map(|r| r.path.clone()).collect(),
            }),
        }
    }
}

/// Extract the trimmed, non-empty references on a line, in order.
pub fn extract_references(line: &str) -> Vec<&str> {
    RE_INCLUDE
        .captures_iter(line)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|reference| !reference.is_empty())
        .collect()
}

/// Front matter spliced under a text line would read as a setext heading.
fn opens_front_matter(content: &str) -> bool {
    content.lines().next().map(str::trim_end) == Some("---")
}

/// Append a visible error block after a line's expansion.
fn annotate(lines: &mut Vec<String>, errors: &[IncludeError]) {
    lines.push(String::new());
    for error in errors {
        lines.push(format!("> **Compile error:** `{}`: {}", error.reference, error.kind));
    }
    lines.push(String::new());
}
