//! What to compile: the root text, where it lives, and what to call the result.
//!
//! Three ways to get a [`TocSpec`]:
//!
//! - **single file** — the document itself is the root
//! - **TOC file** — the nearest `toc.md` (the requesting document's folder
//!   first, then the project root)
//! - **synthesized** — a picked list of documents turned into an ad-hoc TOC
//!   of `{path}` lines, named `export_all`

use manuscript_index::{normalize, FileIndex};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Output name for a compile of picked documents.
pub const EXPORT_ALL: &str = "export_all";

/// Problems that stop a compile before any output is produced.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("{name} not found (searched {})", list_dirs(searched))]
    TocNotFound { name: String, searched: Vec<PathBuf> },
    #[error("document not found: {}", .0.display())]
    InputNotFound(PathBuf),
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to prepare working directory {}: {source}", path.display())]
    WorkDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("no documents to compile under {}", .0.display())]
    NoDocuments(PathBuf),
    #[error("output {} would overwrite a source document", .0.display())]
    OutputIsSource(PathBuf),
}

fn list_dirs(dirs: &[PathBuf]) -> String {
    dirs.iter()
        .map(|d| d.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Where the root text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TocSource {
    File(PathBuf),
    Synthesized(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocSpec {
    /// Base name of the compiled file
    pub name: String,
    /// Directory relative references resolve against; output lands here
    pub root_dir: PathBuf,
    pub source: TocSource,
    /// Documents this compile was asked for, in order
    pub inputs: Vec<PathBuf>,
}

impl TocSpec {
    /// Compile one document and whatever it includes.
    pub fn single(path: &Path) -> Result<Self, SetupError> {
        let path = normalize(path);
        if !path.is_file() {
            return Err(SetupError::InputNotFound(path));
        }
        Ok(Self {
            name: derive_output_name(&path),
            root_dir: parent_dir(&path),
            source: TocSource::File(path.clone()),
            inputs: vec![path],
        })
    }

    /// Compile a table-of-contents file.
    pub fn from_toc_file(toc: &Path) -> Self {
        let toc = normalize(toc);
        Self {
            name: derive_output_name(&toc),
            root_dir: parent_dir(&toc),
            source: TocSource::File(toc.clone()),
            inputs: vec![toc],
        }
    }

    /// Compile picked documents in the given order.
    pub fn synthesized(root: &Path, inputs: Vec<PathBuf>) -> Self {
        Self {
            name: EXPORT_ALL.to_string(),
            root_dir: normalize(root),
            source: TocSource::Synthesized(synthesize(&inputs)),
            inputs,
        }
    }

    /// The root text to flatten.
    pub fn text(&self) -> Result<String, SetupError> {
        match &self.source {
            TocSource::File(path) => fs::read_to_string(path).map_err(|source| SetupError::Read {
                path: path.clone(),
                source,
            }),
            TocSource::Synthesized(text) => Ok(text.clone()),
        }
    }

    /// The file the root text was read from, if any.
    pub fn root_file(&self) -> Option<&Path> {
        match &self.source {
            TocSource::File(path) => Some(path),
            TocSource::Synthesized(_) => None,
        }
    }
}

/// Find the TOC file for a document: its own folder first, then the
/// project root.
///
/// `from` may be a document or a folder.
pub fn find_toc(from: &Path, project_root: &Path, toc_name: &str) -> Result<PathBuf, SetupError> {
    let from = normalize(from);
    let start = if from.is_dir() { from } else { parent_dir(&from) };
    let mut searched = vec![start];
    let root = normalize(project_root);
    if !searched.contains(&root) {
        searched.push(root);
    }

    for dir in &searched {
        let candidate = dir.join(toc_name);
        if candidate.is_file() {
            debug!(toc = %candidate.display(), "found table of contents");
            return Ok(candidate);
        }
    }
    Err(SetupError::TocNotFound {
        name: toc_name.to_string(),
        searched,
    })
}

/// Every indexed document under `root` except TOC files, sorted.
pub fn all_documents(index: &FileIndex, root: &Path, toc_name: &str) -> Vec<PathBuf> {
    let root = normalize(root);
    index
        .keys()
        .into_iter()
        .filter(|path| path.starts_with(&root))
        .filter(|path| path.file_name().map_or(true, |name| name != toc_name))
        .collect()
}

/// Turn a list of documents into TOC text, one `{path}` directive per line.
pub fn synthesize(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| format!("{{{}}}\n", path.display()))
        .collect()
}

/// Derive the output base name from a document path.
/// "book/part1.md" → "part1", "toc" → "toc"
pub fn derive_output_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .unwrap_or_else(|| EXPORT_ALL.to_string())
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"))
}
