use std::path::Path;
use std::process::{Command, Output, Stdio};

use anyhow::{Result, bail};

/// Verifies that an external tool can be launched, e.g. `yt-dlp --version`.
pub fn ensure_program_available(program: &Path, version_flag: &str) -> Result<()> {
    let status = Command::new(program)
        .arg(version_flag)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => bail!(
            "{} is installed but returned a failure status",
            program.display()
        ),
        Err(err) => bail!(
            "{} is not installed or not in PATH: {}",
            program.display(),
            err
        ),
    }
}

/// Best single-line explanation of why a subprocess failed.
///
/// Tools like `yt-dlp` print progress noise before the actual `ERROR:` line,
/// so the last non-empty stderr line is usually the useful one.
pub(crate) fn failure_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    stderr
        .lines()
        .map(str::trim)
        .rfind(|line| !line.is_empty())
        .map(|line| line.trim_start_matches("ERROR:").trim().to_owned())
        .unwrap_or_else(|| format!("exited with {}", output.status))
}
