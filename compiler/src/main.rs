//! manuscript — compile a writing project of markdown chapters into one
//! document.
//!
//! Chapters pull each other in with `{path}` or `{id}` directives; a
//! `toc.md` lists the chapters of a book. Compiling flattens the directives
//! into one markdown file and hands it to pandoc.
//!
//! - `manuscript compile toc` — the nearest table of contents
//! - `manuscript compile file part1/ch1.md` — one chapter and its includes
//! - `manuscript compile all --select 'part1/*'` — picked chapters, in order
//! - `manuscript index | ids | tree | words` — inspect the project

mod command;
mod compile;
mod config;
mod convert;
mod include;
mod opener;
mod operator;
mod toc;
mod words;
mod workspace;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use manuscript_index::tree;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::command::CompileCommand;
use crate::compile::Outcome;
use crate::config::{SaveDialog, Settings};
use crate::convert::Pandoc;
use crate::include::{IncludeOptions, IncludeResolver};
use crate::operator::{Batch, Console, Operator};
use crate::workspace::Workspace;

/// Exit status when the operator cancelled a compile.
const EXIT_CANCELLED: u8 = 2;

#[derive(Parser)]
#[command(name = "manuscript", version, about = "Compile markdown chapters into one document")]
struct Cli {
    /// Project root
    #[arg(short = 'C', long, global = true, default_value = ".")]
    root: PathBuf,

    /// Settings file (default: <root>/manuscript.toml)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Which files to index, overriding the settings file
    #[arg(long, global = true)]
    glob: Option<String>,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile documents into one output file
    Compile {
        #[command(subcommand)]
        target: Target,
    },
    /// List indexed documents
    Index {
        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// List declared ids and flag the ones claimed by several documents
    Ids,
    /// Show indexed documents as a directory tree
    Tree,
    /// Most frequent words in a document
    Words {
        path: PathBuf,
        /// Count the document with its includes expanded
        #[arg(long)]
        flatten: bool,
        #[arg(long, default_value_t = 25)]
        top: usize,
        #[arg(long, default_value_t = 1)]
        min_length: usize,
        /// Print the counts as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum Target {
    /// A single document and whatever it includes
    File {
        path: PathBuf,
        #[command(flatten)]
        options: CompileOptions,
    },
    /// The table of contents nearest to FROM, else the project root's
    Toc {
        from: Option<PathBuf>,
        #[command(flatten)]
        options: CompileOptions,
    },
    /// Documents picked from the whole project
    All {
        /// Glob over project-relative paths (repeatable). Default: everything.
        #[arg(long)]
        select: Vec<String>,
        #[command(flatten)]
        options: CompileOptions,
    },
}

#[derive(Args, Debug, Default)]
struct CompileOptions {
    /// Output format (docx, odt, pdf, html, epub, ...)
    #[arg(short = 'f', long)]
    format: Option<String>,

    /// Reference document for docx/odt/pptx output
    #[arg(long)]
    template: Option<PathBuf>,

    /// Turn -- and --- into dashes
    #[arg(long)]
    smart_dashes: bool,

    /// Write include errors into the output
    #[arg(long)]
    inline_errors: bool,

    /// Copy // comment lines into the output
    #[arg(long)]
    keep_comments: bool,

    /// Convert even when includes failed
    #[arg(short = 'y', long)]
    yes: bool,

    /// Do not stop on include errors at all
    #[arg(long)]
    no_confirm: bool,

    /// Open the result with the default application
    #[arg(long)]
    open: bool,

    /// Write the output here instead of beside the TOC
    #[arg(short = 'o', long)]
    save_as: Option<PathBuf>,

    /// Ask on the terminal instead of using flags
    #[arg(short = 'i', long)]
    interactive: bool,

    /// Converter executable (default: pandoc)
    #[arg(long)]
    converter: Option<String>,
}

impl CompileOptions {
    /// Layer these flags over the loaded settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(format) = &self.format {
            settings.format = format.clone();
        }
        if let Some(template) = &self.template {
            settings.template = Some(template.clone());
        }
        if let Some(converter) = &self.converter {
            settings.converter = converter.clone();
        }
        settings.smart_dashes |= self.smart_dashes;
        settings.inline_errors |= self.inline_errors;
        if self.keep_comments {
            settings.skip_comments = false;
        }
        if self.no_confirm {
            settings.confirm_on_errors = false;
        }
        if self.save_as.is_some() {
            settings.save_dialog = SaveDialog::Always;
        }
    }

    fn operator(&self, select: &[String]) -> Result<Box<dyn Operator>> {
        if self.interactive {
            return Ok(Box::new(Console::stdio()));
        }
        let select = select
            .iter()
            .map(|s| glob::Pattern::new(s).with_context(|| format!("invalid --select pattern: {s}")))
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(Batch {
            assume_yes: self.yes,
            open: self.open,
            save_as: self.save_as.clone(),
            select,
        }))
    }
}

impl Target {
    fn split(self) -> (CompileCommand, CompileOptions, Vec<String>) {
        match self {
            Target::File { path, options } => (CompileCommand::File(path), options, Vec::new()),
            Target::Toc { from, options } => (CompileCommand::Toc { from }, options, Vec::new()),
            Target::All { select, options } => (CompileCommand::All, options, select),
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut settings = config::load(&cli.root, cli.config.as_deref())?;
    if let Some(glob) = cli.glob {
        settings.file_glob = glob;
    }

    match cli.command {
        Command::Compile { target } => {
            let (request, options, select) = target.split();
            let mut operator = options.operator(&select)?;
            let mut workspace = open_workspace(&cli.root, settings)?;
            let flags_logged = workspace.subscribe(|old, new| {
                debug!(
                    format = %new.format,
                    converter = %new.converter,
                    rescan = old.file_glob != new.file_glob,
                    "compile flags applied"
                );
            });
            workspace.update_settings(|s| options.apply(s))?;
            workspace.unsubscribe(flags_logged);
            let converter = Pandoc::new(workspace.settings().converter.clone());
            let outcome = command::execute(&request, &workspace, &converter, operator.as_mut());
            workspace.close();
            Ok(exit_code(&outcome))
        }
        Command::Index { json } => {
            let workspace = open_workspace(&cli.root, settings)?;
            if json {
                let records: Vec<_> = workspace.index().records().collect();
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                for record in workspace.index().records() {
                    let shown = relative(workspace.root(), &record.path);
                    match &record.id {
                        Some(id) => println!("{shown}  [{id}]"),
                        None => println!("{shown}"),
                    }
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Ids => {
            let workspace = open_workspace(&cli.root, settings)?;
            let index = workspace.index();
            let conflicts: HashMap<&str, Vec<&Path>> = index.conflicts().into_iter().collect();
            for id in index.ids() {
                if let Some(owners) = conflicts.get(id.as_str()) {
                    let owners: Vec<String> = owners.iter().map(|path| relative(workspace.root(), path)).collect();
                    println!("{id}  CONFLICT: {}", owners.join(", "));
                } else if let [owner] = index.get_by_id(&id).as_slice() {
                    println!("{id}  {}", relative(workspace.root(), &owner.path));
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Tree => {
            let workspace = open_workspace(&cli.root, settings)?;
            let index = workspace.index();
            let nodes = tree::build_tree(workspace.root(), &index.keys());
            let label = |path: &Path| {
                index
                    .get_by_path(path)
                    .and_then(|record| record.id.as_ref())
                    .map(|id| format!("[{id}]"))
            };
            print!("{}", tree::render(&nodes, &label));
            Ok(ExitCode::SUCCESS)
        }
        Command::Words {
            path,
            flatten,
            top,
            min_length,
            json,
        } => {
            let mut workspace = open_workspace(&cli.root, settings)?;
            let path = workspace.root().join(path);
            // the document may sit outside the indexed glob
            workspace.refresh(&path);
            let mut text =
                fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
            if flatten {
                let resolver = IncludeResolver::new(workspace.index(), IncludeOptions::from(workspace.settings()));
                let dir = path.parent().unwrap_or_else(|| workspace.root());
                text = resolver.flatten(&text, dir, Some(path.as_path())).text();
            }
            let counts = words::word_frequency(&text, min_length, Some(top));
            if json {
                println!("{}", serde_json::to_string_pretty(&counts)?);
            } else {
                for entry in counts {
                    println!("{:>6}  {}", entry.count, entry.word);
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn open_workspace(root: &Path, settings: Settings) -> Result<Workspace> {
    Workspace::open(root, settings).with_context(|| format!("failed to index {}", root.display()))
}

fn exit_code(outcome: &Outcome) -> ExitCode {
    match outcome {
        Outcome::Converted { .. } => ExitCode::SUCCESS,
        Outcome::Cancelled => ExitCode::from(EXIT_CANCELLED),
        Outcome::Failed { .. } => ExitCode::FAILURE,
    }
}

/// `path` relative to `root` when it lies inside, for display.
fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}
