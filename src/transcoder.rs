//! Audio container conversion through `ffmpeg`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::process::failure_reason;

/// Audio containers a downloaded audio-only stream can be converted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTarget {
    Mp3,
    M4a,
}

impl AudioTarget {
    pub fn extension(self) -> &'static str {
        match self {
            AudioTarget::Mp3 => "mp3",
            AudioTarget::M4a => "m4a",
        }
    }
}

impl fmt::Display for AudioTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for AudioTarget {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioTarget::Mp3),
            "m4a" => Ok(AudioTarget::M4a),
            _ => Err(ServiceError::validation("Unsupported conversion target.")),
        }
    }
}

pub trait AudioTranscoder: Send + Sync {
    /// Writes `<source stem>.<target>` next to `source`, removes `source`,
    /// and returns the new path.
    fn convert(&self, source: &Path, target: AudioTarget) -> ServiceResult<PathBuf>;
}

/// Runs the `ffmpeg` executable found at `binary`.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl AudioTranscoder for FfmpegTranscoder {
    fn convert(&self, source: &Path, target: AudioTarget) -> ServiceResult<PathBuf> {
        let destination = converted_path(source, target);
        if destination == source {
            return Ok(destination);
        }

        let mut command = Command::new(&self.binary);
        command
            .arg("-y")
            .arg("-loglevel")
            .arg("error")
            .arg("-i")
            .arg(source)
            .arg("-vn");
        if target == AudioTarget::M4a {
            command.arg("-c:a").arg("aac");
        }
        let output = command
            .arg(&destination)
            .output()
            .map_err(|err| ServiceError::collaborator(format!("Unable to start ffmpeg: {err}")))?;

        if !output.status.success() {
            debug!(
                "ffmpeg stderr for {}: {}",
                source.display(),
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(ServiceError::collaborator(format!(
                "Conversion failed: {}",
                failure_reason(&output)
            )));
        }

        if let Err(err) = fs::remove_file(source) {
            warn!("could not remove {} after conversion: {err}", source.display());
        }
        Ok(destination)
    }
}

/// Same directory and base name as `source`, new extension.
pub fn converted_path(source: &Path, target: AudioTarget) -> PathBuf {
    source.with_extension(target.extension())
}
