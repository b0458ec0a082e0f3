//! The compile pipeline.
//!
//! 1. **Flatten** the root text, expanding include directives
//! 2. **Stage** the result in a temp file under the work directory
//! 3. **Confirm** with the operator when includes failed
//! 4. **Place** the output, optionally asking where
//! 5. **Convert** with the external converter
//! 6. **Open** the result when the operator wants it
//!
//! The staged file and the (then empty) work directory are removed on every
//! path out of step 2, including cancel and converter failure.

use anyhow::{Context, Result};
use manuscript_index::{normalize, FileIndex};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::{SaveDialog, Settings};
use crate::convert::{self, ConvertJob, Converter};
use crate::include::{Flattened, IncludeOptions, IncludeResolver};
use crate::opener;
use crate::operator::Operator;
use crate::toc::{SetupError, TocSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Converted {
        output: PathBuf,
        /// Include errors the operator chose to convert past
        include_errors: usize,
    },
    Cancelled,
    Failed {
        message: String,
    },
}

impl Outcome {
    pub fn output(&self) -> Option<&Path> {
        match self {
            Outcome::Converted { output, .. } => Some(output),
            _ => None,
        }
    }
}

pub struct Compiler<'a> {
    settings: &'a Settings,
    index: &'a FileIndex,
    converter: &'a dyn Converter,
}

impl<'a> Compiler<'a> {
    pub fn new(settings: &'a Settings, index: &'a FileIndex, converter: &'a dyn Converter) -> Self {
        Self {
            settings,
            index,
            converter,
        }
    }

    /// Compile and fold any error into [`Outcome::Failed`], telling the
    /// operator about it.
    pub fn run(&self, spec: &TocSpec, operator: &mut dyn Operator) -> Outcome {
        match self.compile(spec, operator) {
            Ok(outcome) => outcome,
            Err(err) => {
                let message = format!("{err:#}");
                operator.report(&format!("Compile failed: {message}"));
                Outcome::Failed { message }
            }
        }
    }

    pub fn compile(&self, spec: &TocSpec, operator: &mut dyn Operator) -> Result<Outcome> {
        info!(name = %spec.name, root = %spec.root_dir.display(), inputs = spec.inputs.len(), "compiling");
        let text = spec.text()?;
        let resolver = IncludeResolver::new(self.index, IncludeOptions::from(self.settings));
        let flattened = resolver.flatten(&text, &spec.root_dir, spec.root_file());
        debug!(
            lines = flattened.lines.len(),
            errors = flattened.errors.len(),
            "flattened"
        );

        let work_dir = spec.root_dir.join(&self.settings.work_dir);
        fs::create_dir_all(&work_dir).map_err(|source| SetupError::WorkDir {
            path: work_dir.clone(),
            source,
        })?;

        let staged = stage(&work_dir, &spec.name, &flattened.text());
        let result = match staged {
            Ok(temp) => {
                let result = self.finish(spec, temp.path(), &flattened, operator);
                if let Err(err) = temp.close() {
                    operator.report(&format!("Failed to remove temporary file: {err}"));
                }
                result
            }
            Err(err) => Err(err),
        };
        // only succeeds once the directory is empty
        let _ = fs::remove_dir(&work_dir);
        result
    }

    fn finish(
        &self,
        spec: &TocSpec,
        staged: &Path,
        flattened: &Flattened,
        operator: &mut dyn Operator,
    ) -> Result<Outcome> {
        let error_count = flattened.errors.len();
        if error_count > 0 {
            if self.settings.confirm_on_errors {
                if !operator.confirm_errors(&flattened.errors) {
                    info!("cancelled after include errors");
                    return Ok(Outcome::Cancelled);
                }
            } else {
                for error in &flattened.errors {
                    operator.report(&format!("Include error: {error}"));
                }
            }
        }

        let format = self.settings.format.as_str();
        let suggested = spec
            .root_dir
            .join(format!("{}.{}", spec.name, convert::extension_for(format)));
        let output = match self.settings.save_dialog {
            SaveDialog::Never => suggested,
            SaveDialog::Always => match operator.choose_output(&suggested) {
                Some(path) => path,
                None => {
                    info!("cancelled at save dialog");
                    return Ok(Outcome::Cancelled);
                }
            },
        };

        if self.overwrites_source(spec, &output) {
            return Err(SetupError::OutputIsSource(output).into());
        }

        let job = ConvertJob {
            input: staged.to_path_buf(),
            output: output.clone(),
            format: format.to_string(),
            smart_dashes: self.settings.smart_dashes,
            template: convert::template_for(format, self.settings.template.as_deref()),
            resource_dir: spec.root_dir.clone(),
        };
        self.converter
            .convert(&job)
            .with_context(|| format!("export to {format} failed"))?;
        info!(output = %output.display(), "converted");
        operator.report(&format!("Wrote {}", output.display()));

        if operator.confirm_open(&output) {
            if let Err(err) = opener::open(&output) {
                warn!(error = %err, "could not open output");
                operator.report(&format!("{err:#}"));
            }
        }
        Ok(Outcome::Converted {
            output,
            include_errors: error_count,
        })
    }

    /// True when `output` names the TOC, a requested input or any indexed
    /// document.
    fn overwrites_source(&self, spec: &TocSpec, output: &Path) -> bool {
        let output = normalize(output);
        spec.root_file() == Some(output.as_path())
            || spec.inputs.iter().any(|input| normalize(input) == output)
            || self.index.get_by_path(&output).is_some()
    }
}

/// Write the flattened text to a fresh temp file in `work_dir`.
fn stage(work_dir: &Path, name: &str, text: &str) -> Result<NamedTempFile> {
    let mut temp = tempfile::Builder::new()
        .prefix(&format!("{name}-"))
        .suffix(".md")
        .tempfile_in(work_dir)
        .with_context(|| format!("failed to create temporary file in {}", work_dir.display()))?;
    temp.write_all(text.as_bytes())
        .and_then(|()| temp.flush())
        .with_context(|| format!("failed to write {}", temp.path().display()))?;
    debug!(path = %temp.path().display(), "staged flattened document");
    Ok(temp)
}
