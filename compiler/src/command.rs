//! The three ways to start a compile.
//!
//! Each variant only decides which root text feeds the [`Compiler`]; the
//! pipeline itself is shared.

use std::path::PathBuf;
use tracing::info;

use crate::compile::{Compiler, Outcome};
use crate::convert::Converter;
use crate::operator::Operator;
use crate::toc::{self, SetupError, TocSpec};
use crate::workspace::Workspace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileCommand {
    /// One document and its includes
    File(PathBuf),
    /// The TOC nearest to `from` (or the project root's)
    Toc { from: Option<PathBuf> },
    /// Documents picked from everything indexed
    All,
}

impl CompileCommand {
    /// Work out what to compile. `Ok(None)` means the operator cancelled.
    pub fn resolve(
        &self,
        workspace: &Workspace,
        operator: &mut dyn Operator,
    ) -> Result<Option<TocSpec>, SetupError> {
        let toc_name = workspace.settings().toc_file.as_str();
        match self {
            CompileCommand::File(path) => TocSpec::single(&workspace.root().join(path)).map(Some),
            CompileCommand::Toc { from } => {
                let from = match from {
                    Some(path) => workspace.root().join(path),
                    None => workspace.root().to_path_buf(),
                };
                let found = toc::find_toc(&from, workspace.root(), toc_name)?;
                Ok(Some(TocSpec::from_toc_file(&found)))
            }
            CompileCommand::All => {
                let candidates = toc::all_documents(workspace.index(), workspace.root(), toc_name);
                if candidates.is_empty() {
                    return Err(SetupError::NoDocuments(workspace.root().to_path_buf()));
                }
                let Some(picked) = operator.pick_documents(workspace.root(), &candidates) else {
                    return Ok(None);
                };
                info!(count = picked.len(), "documents picked");
                Ok(Some(TocSpec::synthesized(workspace.root(), picked)))
            }
        }
    }
}

/// Resolve `command` and run the compile.
pub fn execute(
    command: &CompileCommand,
    workspace: &Workspace,
    converter: &dyn Converter,
    operator: &mut dyn Operator,
) -> Outcome {
    let spec = match command.resolve(workspace, operator) {
        Ok(Some(spec)) => spec,
        Ok(None) => return Outcome::Cancelled,
        Err(err) => {
            let message = err.to_string();
            operator.report(&format!("Compile failed: {message}"));
            return Outcome::Failed { message };
        }
    };
    Compiler::new(workspace.settings(), workspace.index(), converter).run(&spec, operator)
}
