//! Hand a compiled document to the platform's default application.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::info;

/// The command that opens `path` on this platform.
pub fn open_command(path: &Path) -> Command {
    #[cfg(target_os = "macos")]
    let command = {
        let mut command = Command::new("open");
        command.arg("--").arg(path);
        command
    };

    #[cfg(target_os = "windows")]
    let command = {
        // the empty argument is the window title
        let mut command = Command::new("cmd");
        command.args(["/C", "start", ""]).arg(path);
        command
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let command = {
        let mut command = Command::new("xdg-open");
        command.arg(path);
        command
    };

    command
}

/// Open `path` without waiting for the viewer to exit.
pub fn open(path: &Path) -> Result<()> {
    info!(path = %path.display(), "opening compiled document");
    open_command(path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to open {}", path.display()))?;
    Ok(())
}
