//! External document conversion.
//!
//! The flattened markdown is handed to a converter process (pandoc by
//! default) through the [`Converter`] trait, so the compile pipeline can be
//! driven by a stand-in in tests.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::{debug, warn};

/// Formats whose output can be styled by a reference document.
const TEMPLATE_FORMATS: &[&str] = &["docx", "odt", "pptx"];

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("converter '{program}' not found")]
    NotFound { program: String },
    #[error("failed to run {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },
    #[error("{} exited with {status}: {stderr}", program.display())]
    Failed {
        program: PathBuf,
        status: String,
        stderr: String,
    },
}

/// One conversion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: String,
    /// Read the input with smart punctuation
    pub smart_dashes: bool,
    /// Reference document, already checked against the format
    pub template: Option<PathBuf>,
    /// Directory images and other resources are resolved from
    pub resource_dir: PathBuf,
}

/// Turns a markdown file into the requested output format.
pub trait Converter {
    fn convert(&self, job: &ConvertJob) -> Result<(), ConvertError>;
}

/// Runs pandoc (or a compatible executable).
pub struct Pandoc {
    program: String,
}

impl Pandoc {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn locate(&self) -> Result<PathBuf, ConvertError> {
        which::which(&self.program).map_err(|_| ConvertError::NotFound {
            program: self.program.clone(),
        })
    }

    /// Command-line arguments for a job.
    pub fn args(job: &ConvertJob) -> Vec<OsString> {
        let dialect = if job.smart_dashes { "markdown+smart" } else { "markdown" };
        let mut args: Vec<OsString> = vec![
            job.input.clone().into(),
            "-f".into(),
            dialect.into(),
            "-t".into(),
            job.format.clone().into(),
            "-o".into(),
            job.output.clone().into(),
            "--resource-path".into(),
            job.resource_dir.clone().into(),
        ];
        if let Some(template) = &job.template {
            args.push("--reference-doc".into());
            args.push(template.clone().into());
        }
        args
    }
}

impl Converter for Pandoc {
    fn convert(&self, job: &ConvertJob) -> Result<(), ConvertError> {
        let program = self.locate()?;
        debug!(program = %program.display(), output = %job.output.display(), "running converter");

        let output = Command::new(&program)
            .args(Self::args(job))
            .current_dir(&job.resource_dir)
            .output()
            .map_err(|source| ConvertError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(ConvertError::Failed {
                program,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// File extension for an output format.
pub fn extension_for(format: &str) -> &str {
    match format {
        "markdown" | "gfm" | "commonmark" => "md",
        "latex" => "tex",
        "plain" => "txt",
        "html5" => "html",
        other => other,
    }
}

/// The template to pass for `format`, if any.
///
/// Only reference-doc capable formats use one, and only when the template's
/// extension matches the format.
pub fn template_for(format: &str, template: Option<&Path>) -> Option<PathBuf> {
    let template = template?;
    if !TEMPLATE_FORMATS.contains(&format) {
        debug!(format, "format does not take a template");
        return None;
    }
    let matches = template
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(format));
    if !matches {
        warn!(template = %template.display(), format, "template does not match output format, ignoring");
        return None;
    }
    Some(template.to_path_buf())
}
