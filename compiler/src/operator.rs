//! The person (or the flags) a compile defers to.
//!
//! | Decision         | Console                          | Batch                      |
//! |------------------|----------------------------------|----------------------------|
//! | proceed on error | `Continue anyway? [y/N]`         | `--yes`                    |
//! | output location  | `Save as [suggested]:`           | `--save-as` or suggested   |
//! | which documents  | numbered list, `1,3-5` or `all`  | `--select` globs, or all   |
//! | open the result  | `Open ...? [y/N]`                | `--open`                   |

use crate::include::IncludeError;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

pub trait Operator {
    /// Shown the include errors of a flatten; true means convert anyway.
    fn confirm_errors(&mut self, errors: &[IncludeError]) -> bool;
    /// Where to write the output. `None` cancels.
    fn choose_output(&mut self, suggested: &Path) -> Option<PathBuf>;
    /// Subset of `candidates` to compile, in order. `None` cancels.
    fn pick_documents(&mut self, root: &Path, candidates: &[PathBuf]) -> Option<Vec<PathBuf>>;
    fn confirm_open(&mut self, output: &Path) -> bool;
    /// Progress and problems meant for a human.
    fn report(&mut self, message: &str);
}

// ── Console ──────────────────────────────────────────────────────

/// Asks on a terminal.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, io::Stderr> {
    /// Prompts go to stderr so stdout stays clean.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `prompt` and read one trimmed line. `None` at end of input.
    fn ask(&mut self, prompt: &str) -> Option<String> {
        write!(self.output, "{prompt}").ok()?;
        self.output.flush().ok()?;
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim().to_string()),
        }
    }

    fn yes_no(&mut self, prompt: &str) -> bool {
        self.ask(prompt)
            .is_some_and(|answer| matches!(answer.to_ascii_lowercase().as_str(), "y" | "yes"))
    }
}

impl<R: BufRead, W: Write> Operator for Console<R, W> {
    fn confirm_errors(&mut self, errors: &[IncludeError]) -> bool {
        let _ = writeln!(self.output, "{} include error(s):", errors.len());
        for error in errors {
            let _ = writeln!(self.output, "  {error}");
        }
        self.yes_no("Continue anyway? [y/N] ")
    }

    fn choose_output(&mut self, suggested: &Path) -> Option<PathBuf> {
        let answer = self.ask(&format!("Save as [{}]: ", suggested.display()))?;
        if answer.is_empty() {
            Some(suggested.to_path_buf())
        } else {
            Some(PathBuf::from(answer))
        }
    }

    fn pick_documents(&mut self, root: &Path, candidates: &[PathBuf]) -> Option<Vec<PathBuf>> {
        for (i, path) in candidates.iter().enumerate() {
            let shown = path.strip_prefix(root).unwrap_or(path);
            let _ = writeln!(self.output, "{:>3}. {}", i + 1, shown.display());
        }
        loop {
            let answer = self.ask("Documents to compile (e.g. 1,3-5 or all, empty to cancel): ")?;
            if answer.is_empty() {
                return None;
            }
            match parse_selection(&answer, candidates.len()) {
                Some(picked) => return Some(picked.into_iter().map(|i| candidates[i].clone()).collect()),
                None => {
                    let _ = writeln!(self.output, "Invalid selection: {answer}");
                }
            }
        }
    }

    fn confirm_open(&mut self, output: &Path) -> bool {
        self.yes_no(&format!("Open {}? [y/N] ", output.display()))
    }

    fn report(&mut self, message: &str) {
        let _ = writeln!(self.output, "{message}");
    }
}

/// Parse `all` or a comma-separated list of 1-based numbers and ranges into
/// 0-based indices, in the order given, without repeats.
pub fn parse_selection(input: &str, count: usize) -> Option<Vec<usize>> {
    if input.trim().eq_ignore_ascii_case("all") {
        return Some((0..count).collect());
    }
    let mut picked = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (start, end) = match part.split_once('-') {
            Some((a, b)) => (a.trim().parse::<usize>().ok()?, b.trim().parse::<usize>().ok()?),
            None => {
                let n = part.parse::<usize>().ok()?;
                (n, n)
            }
        };
        if start == 0 || start > end || end > count {
            return None;
        }
        for n in start..=end {
            if !picked.contains(&(n - 1)) {
                picked.push(n - 1);
            }
        }
    }
    if picked.is_empty() {
        None
    } else {
        Some(picked)
    }
}

// ── Batch ────────────────────────────────────────────────────────

/// Answers from command-line flags; never blocks.
#[derive(Debug, Default)]
pub struct Batch {
    /// Proceed despite include errors
    pub assume_yes: bool,
    /// Open the output after converting
    pub open: bool,
    pub save_as: Option<PathBuf>,
    /// Globs matched against paths relative to the project root
    pub select: Vec<glob::Pattern>,
}

impl Operator for Batch {
    fn confirm_errors(&mut self, errors: &[IncludeError]) -> bool {
        for error in errors {
            self.report(&format!("Include error: {error}"));
        }
        if !self.assume_yes {
            warn!(count = errors.len(), "include errors, not converting without --yes");
        }
        self.assume_yes
    }

    fn choose_output(&mut self, suggested: &Path) -> Option<PathBuf> {
        Some(self.save_as.clone().unwrap_or_else(|| suggested.to_path_buf()))
    }

    fn pick_documents(&mut self, root: &Path, candidates: &[PathBuf]) -> Option<Vec<PathBuf>> {
        if self.select.is_empty() {
            return Some(candidates.to_vec());
        }
        let picked: Vec<PathBuf> = candidates
            .iter()
            .filter(|path| {
                let relative = path.strip_prefix(root).unwrap_or(path);
                self.select.iter().any(|p| p.matches_path(relative))
            })
            .cloned()
            .collect();
        if picked.is_empty() {
            warn!("no documents match the selection");
            None
        } else {
            Some(picked)
        }
    }

    fn confirm_open(&mut self, _output: &Path) -> bool {
        self.open
    }

    fn report(&mut self, message: &str) {
        eprintln!("{message}");
    }
}

// ── Test double ──────────────────────────────────────────────────

/// Canned answers plus a record of what was asked.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct Scripted {
    pub proceed: bool,
    pub output: Option<PathBuf>,
    pub picks: Option<Vec<usize>>,
    pub open: bool,
    pub asked_errors: Vec<String>,
    pub asked_output: Vec<PathBuf>,
    pub reports: Vec<String>,
}

#[cfg(test)]
impl Operator for Scripted {
    fn confirm_errors(&mut self, errors: &[IncludeError]) -> bool {
        self.asked_errors.extend(errors.iter().map(ToString::to_string));
        self.proceed
    }

    fn choose_output(&mut self, suggested: &Path) -> Option<PathBuf> {
        self.asked_output.push(suggested.to_path_buf());
        self.output.clone()
    }

    fn pick_documents(&mut self, _root: &Path, candidates: &[PathBuf]) -> Option<Vec<PathBuf>> {
        match &self.picks {
            Some(picks) => Some(picks.iter().map(|&i| candidates[i].clone()).collect()),
            None => Some(candidates.to_vec()),
        }
    }

    fn confirm_open(&mut self, _output: &Path) -> bool {
        self.open
    }

    fn report(&mut self, message: &str) {
        self.reports.push(message.to_string());
    }
}
