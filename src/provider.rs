//! Stream provider seam and its `yt-dlp` implementation.
//!
//! The rest of the crate only sees [`StreamProvider`]: a probe that returns
//! metadata plus raw stream descriptors, and a download that persists one of
//! those streams. Every call blocks on a subprocess.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Deserialize;
use tracing::debug;

use crate::error::{ServiceError, ServiceResult};
use crate::process::failure_reason;
use crate::streams::{RawStreamDescriptor, StreamKind};

/// Video-level metadata together with every stream the provider exposes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoProbe {
    pub title: String,
    pub channel: Option<String>,
    /// Length in seconds, absent for live streams.
    pub duration: Option<u64>,
    pub thumbnail: Option<String>,
    pub streams: Vec<RawStreamDescriptor>,
}

impl VideoProbe {
    pub fn progressive_streams(&self) -> Vec<RawStreamDescriptor> {
        self.streams_of(StreamKind::Progressive)
    }

    pub fn audio_streams(&self) -> Vec<RawStreamDescriptor> {
        self.streams_of(StreamKind::AudioOnly)
    }

    pub fn find_stream(&self, format_id: &str) -> Option<&RawStreamDescriptor> {
        self.streams
            .iter()
            .find(|stream| stream.format_id == format_id)
    }

    fn streams_of(&self, kind: StreamKind) -> Vec<RawStreamDescriptor> {
        self.streams
            .iter()
            .filter(|stream| stream.kind == kind)
            .cloned()
            .collect()
    }
}

pub trait StreamProvider: Send + Sync {
    /// Fetches metadata and the progressive/audio-only stream lists for `url`.
    fn probe(&self, url: &str) -> ServiceResult<VideoProbe>;

    /// Saves `stream` into `output_dir` and returns the written file.
    fn download(
        &self,
        url: &str,
        stream: &RawStreamDescriptor,
        output_dir: &Path,
    ) -> ServiceResult<PathBuf>;
}

/// Output template handed to `yt-dlp`; the id keeps same-titled videos apart.
const OUTPUT_TEMPLATE: &str = "%(title)s [%(id)s].%(ext)s";

/// Runs the `yt-dlp` executable found at `binary`.
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    binary: PathBuf,
}

impl YtDlpProvider {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }
}

impl StreamProvider for YtDlpProvider {
    fn probe(&self, url: &str) -> ServiceResult<VideoProbe> {
        let output = self
            .command()
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--")
            .arg(url)
            .output()
            .map_err(ServiceError::unreachable)?;

        if !output.status.success() {
            debug!(
                "yt-dlp stderr for {url}: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(ServiceError::unreachable(failure_reason(&output)));
        }

        let info: VideoInfo = serde_json::from_slice(&output.stdout)
            .map_err(|err| ServiceError::unreachable(format!("unreadable metadata: {err}")))?;
        Ok(info.into_probe())
    }

    fn download(
        &self,
        url: &str,
        stream: &RawStreamDescriptor,
        output_dir: &Path,
    ) -> ServiceResult<PathBuf> {
        let output = self
            .command()
            .arg("--format")
            .arg(&stream.format_id)
            .arg("--paths")
            .arg(output_dir)
            .arg("--output")
            .arg(OUTPUT_TEMPLATE)
            .arg("--no-warnings")
            .arg("--no-progress")
            .arg("--print")
            .arg("after_move:filepath")
            .arg("--no-simulate")
            .arg("--")
            .arg(url)
            .output()
            .map_err(|err| ServiceError::collaborator(format!("Unable to start yt-dlp: {err}")))?;

        if !output.status.success() {
            debug!(
                "yt-dlp stderr for {url}: {}",
                String::from_utf8_lossy(&output.stderr)
            );
            return Err(ServiceError::collaborator(format!(
                "Download failed: {}",
                failure_reason(&output)
            )));
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| {
                ServiceError::collaborator("Download failed: yt-dlp did not report an output file")
            })
    }
}

/// Subset of `yt-dlp --dump-single-json`. Everything is optional because
/// extractors for other sites leave most of it out.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    fulltitle: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    format_id: Option<String>,
    height: Option<i64>,
    fps: Option<f64>,
    abr: Option<f64>,
    ext: Option<String>,
    vcodec: Option<String>,
    acodec: Option<String>,
    filesize: Option<i64>,
    filesize_approx: Option<i64>,
}

impl VideoInfo {
    fn into_probe(self) -> VideoProbe {
        VideoProbe {
            title: self
                .title
                .or(self.fulltitle)
                .unwrap_or_else(|| "Untitled".to_owned()),
            channel: self.channel.or(self.uploader),
            duration: self
                .duration
                .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
                .map(|seconds| seconds.round() as u64),
            thumbnail: self.thumbnail,
            streams: self
                .formats
                .iter()
                .filter_map(FormatInfo::to_descriptor)
                .collect(),
        }
    }
}

impl FormatInfo {
    /// Maps one `yt-dlp` format to a descriptor. Video-only formats and
    /// storyboards are dropped since neither catalog offers them.
    fn to_descriptor(&self) -> Option<RawStreamDescriptor> {
        let format_id = self
            .format_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())?;
        let has_video = has_codec(self.vcodec.as_deref());
        let has_audio = has_codec(self.acodec.as_deref());
        let kind = match (has_video, has_audio) {
            (true, true) => StreamKind::Progressive,
            (false, true) => StreamKind::AudioOnly,
            _ => return None,
        };

        let (resolution, fps, abr) = match kind {
            StreamKind::Progressive => (
                self.height.filter(|h| *h > 0).map(|h| format!("{h}p")),
                self.fps
                    .filter(|fps| *fps > 0.0)
                    .map(|fps| fps.round() as u32),
                None,
            ),
            StreamKind::AudioOnly => (
                None,
                None,
                self.abr
                    .filter(|abr| *abr > 0.0)
                    .map(|abr| format!("{}kbps", abr.round() as u64)),
            ),
        };

        Some(RawStreamDescriptor {
            format_id: format_id.to_owned(),
            kind,
            resolution,
            fps,
            abr,
            mime_type: self
                .ext
                .as_deref()
                .map(|ext| mime_from_extension(kind, ext)),
            filesize: self.filesize.and_then(|size| u64::try_from(size).ok()),
            filesize_approx: self
                .filesize_approx
                .and_then(|size| u64::try_from(size).ok()),
            includes_video_track: has_video,
        })
    }
}

fn has_codec(codec: Option<&str>) -> bool {
    codec.is_some_and(|codec| !codec.is_empty() && codec != "none")
}

/// Guesses the MIME type from the container extension `yt-dlp` reports.
fn mime_from_extension(kind: StreamKind, ext: &str) -> String {
    let top = match kind {
        StreamKind::Progressive => "video",
        StreamKind::AudioOnly => "audio",
    };
    match ext.to_ascii_lowercase().as_str() {
        "m4a" | "mp4" => format!("{top}/mp4"),
        "3gp" => format!("{top}/3gpp"),
        other => format!("{top}/{other}"),
    }
}
