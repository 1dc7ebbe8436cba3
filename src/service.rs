//! Orchestration behind the two JSON endpoints.
//!
//! [`extract_video_metadata`] turns a URL into the payload rendered by the
//! format picker. [`Downloader`] fetches one chosen stream into the output
//! directory and optionally converts it to another audio container.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ServiceError, ServiceResult};
use crate::format::format_duration;
use crate::provider::StreamProvider;
use crate::streams::{PresentableFormatEntry, normalize_audio_streams, normalize_video_streams};
use crate::transcoder::{AudioTarget, AudioTranscoder};

/// Response body of `POST /api/info`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfoPayload {
    pub title: String,
    pub channel: Option<String>,
    pub duration: Option<u64>,
    pub duration_label: String,
    pub thumbnail: Option<String>,
    pub video_formats: Vec<PresentableFormatEntry>,
    pub audio_formats: Vec<PresentableFormatEntry>,
}

pub fn extract_video_metadata(
    provider: &dyn StreamProvider,
    url: &str,
) -> ServiceResult<VideoInfoPayload> {
    let probe = provider.probe(url)?;
    let video_formats = normalize_video_streams(&probe.progressive_streams());
    let audio_formats = normalize_audio_streams(&probe.audio_streams());
    info!(
        "probed {url}: {} video and {} audio formats",
        video_formats.len(),
        audio_formats.len()
    );

    Ok(VideoInfoPayload {
        duration_label: format_duration(probe.duration),
        title: probe.title,
        channel: probe.channel,
        duration: probe.duration,
        thumbnail: probe.thumbnail,
        video_formats,
        audio_formats,
    })
}

/// Downloads selected streams into a fixed output directory.
#[derive(Clone)]
pub struct Downloader {
    provider: Arc<dyn StreamProvider>,
    transcoder: Arc<dyn AudioTranscoder>,
    output_dir: PathBuf,
}

impl Downloader {
    pub fn new(
        provider: Arc<dyn StreamProvider>,
        transcoder: Arc<dyn AudioTranscoder>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            transcoder,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Downloads `format_id` and returns the message shown to the user.
    ///
    /// Conversion requests are validated before anything touches the disk:
    /// an unknown target or a stream carrying video fails without
    /// downloading.
    pub fn download_specific_format(
        &self,
        url: &str,
        format_id: &str,
        convert_to: Option<&str>,
    ) -> ServiceResult<String> {
        let target = convert_to.map(str::parse::<AudioTarget>).transpose()?;

        let probe = self.provider.probe(url)?;
        let stream = probe.find_stream(format_id).ok_or_else(|| {
            ServiceError::collaborator("The requested format is no longer available.")
        })?;

        if target.is_some() && stream.includes_video_track {
            return Err(ServiceError::validation(
                "Conversion to MP3/M4A is only available for audio formats.",
            ));
        }

        fs::create_dir_all(&self.output_dir).map_err(|err| {
            ServiceError::collaborator(format!(
                "Unable to create {}: {err}",
                self.output_dir.display()
            ))
        })?;
        let saved = self.provider.download(url, stream, &self.output_dir)?;
        info!("downloaded format {format_id} of {url} to {}", saved.display());

        let Some(target) = target else {
            return Ok(format!("File saved to {}.", self.output_dir.display()));
        };

        let converted = self.transcoder.convert(&saved, target).inspect_err(|err| {
            warn!("conversion of {} to {target} failed: {err}", saved.display());
        })?;
        info!("converted {} to {}", saved.display(), converted.display());
        Ok(format!(
            "Audio saved as .{target} in {}.",
            self.output_dir.display()
        ))
    }
}


#[cfg(test)]
mod tests {
    use super::fakes::{FakeProvider, FakeTranscoder};
    use super::*;
    use tempfile::tempdir;

    struct ServiceTestContext {
        _temp: tempfile::TempDir,
        output_dir: PathBuf,
        provider: Arc<FakeProvider>,
        transcoder: Arc<FakeTranscoder>,
        downloader: Downloader,
    }

    impl ServiceTestContext {
        fn new(transcoder: FakeTranscoder) -> Self {
            let temp = tempdir().unwrap();
            // Not created up front: the downloader has to create it.
            let output_dir = temp.path().join("downloads");
            let provider = Arc::new(FakeProvider::default());
            let transcoder = Arc::new(transcoder);
            let downloader = Downloader::new(provider.clone(), transcoder.clone(), &output_dir);
            Self {
                _temp: temp,
                output_dir,
                provider,
                transcoder,
                downloader,
            }
        }

        fn download(&self, format_id: &str, convert_to: Option<&str>) -> ServiceResult<String> {
            self.downloader
                .download_specific_format("https://video.example/watch?v=a", format_id, convert_to)
        }
    }

    #[test]
    fn metadata_payload_uses_normalized_catalogs() {
        let payload =
            extract_video_metadata(&FakeProvider::default(), "https://video.example/a").unwrap();
        assert_eq!(payload.title, "Sample Title");
        assert_eq!(payload.duration_label, "1:02:05");
        assert_eq!(payload.video_formats.len(), 1);
        assert_eq!(payload.video_formats[0].format_id, "95");
        assert_eq!(payload.video_formats[0].label, "720p • 60fps");
        assert_eq!(payload.audio_formats[0].label, "128kbps");
        assert_eq!(payload.audio_formats[0].size_label, "1.5 KB");
    }

    #[test]
    fn metadata_payload_serializes_camel_case() {
        let payload =
            extract_video_metadata(&FakeProvider::default(), "https://video.example/a").unwrap();
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["durationLabel"], "1:02:05");
        assert_eq!(value["videoFormats"][0]["subLabel"], "MP4 • Progressive");
        assert_eq!(value["audioFormats"][0]["subLabel"], "MP4 • Audio only");
    }

    #[test]
    fn metadata_failure_is_collaborator_error() {
        let err = extract_video_metadata(&FakeProvider::default(), "https://video.example/missing")
            .unwrap_err();
        assert_eq!(
            err,
            ServiceError::Collaborator("Unable to access this video: Video unavailable".into())
        );
    }

    #[test]
    fn plain_download_saves_file() {
        let ctx = ServiceTestContext::new(FakeTranscoder::default());
        let message = ctx.download("22", None).unwrap();
        assert_eq!(
            message,
            format!("File saved to {}.", ctx.output_dir.display())
        );
        assert!(ctx.output_dir.join("Sample Title.mp4").exists());
        assert_eq!(*ctx.provider.downloads.lock().unwrap(), vec!["22".to_string()]);
    }

    #[test]
    fn audio_download_converts() {
        let ctx = ServiceTestContext::new(FakeTranscoder::default());
        let message = ctx.download("140", Some("MP3")).unwrap();
        assert_eq!(
            message,
            format!("Audio saved as .mp3 in {}.", ctx.output_dir.display())
        );
        assert!(ctx.output_dir.join("Sample Title.mp3").exists());
        assert!(!ctx.output_dir.join("Sample Title.mp4").exists());
        assert_eq!(
            *ctx.transcoder.conversions.lock().unwrap(),
            vec![AudioTarget::Mp3]
        );
    }

    #[test]
    fn converting_video_stream_is_rejected_before_download() {
        let ctx = ServiceTestContext::new(FakeTranscoder::default());
        let err = ctx.download("22", Some("mp3")).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(
            err.message(),
            "Conversion to MP3/M4A is only available for audio formats."
        );
        assert!(ctx.provider.downloads.lock().unwrap().is_empty());
        assert!(ctx.transcoder.conversions.lock().unwrap().is_empty());
    }

    #[test]
    fn unsupported_target_is_rejected() {
        let ctx = ServiceTestContext::new(FakeTranscoder::default());
        let err = ctx.download("140", Some("flac")).unwrap_err();
        assert_eq!(err, ServiceError::validation("Unsupported conversion target."));
        assert!(ctx.provider.downloads.lock().unwrap().is_empty());
    }

    #[test]
    fn vanished_format_is_collaborator_error() {
        let ctx = ServiceTestContext::new(FakeTranscoder::default());
        let err = ctx.download("999", None).unwrap_err();
        assert_eq!(
            err,
            ServiceError::collaborator("The requested format is no longer available.")
        );
    }

    #[test]
    fn unreachable_video_is_collaborator_error() {
        let ctx = ServiceTestContext::new(FakeTranscoder::default());
        let err = ctx
            .downloader
            .download_specific_format("https://video.example/missing", "22", None)
            .unwrap_err();
        assert!(!err.is_validation());
    }

    #[test]
    fn transcoder_failure_propagates() {
        let ctx = ServiceTestContext::new(FakeTranscoder {
            fail: true,
            ..FakeTranscoder::default()
        });
        let err = ctx.download("140", Some("m4a")).unwrap_err();
        assert_eq!(
            err,
            ServiceError::collaborator("Conversion failed: broken input")
        );
    }
}
