//! Stream catalog normalization.
//!
//! Providers hand back long, noisy lists of formats: the same resolution in
//! several encodings, duplicated audio bitrates, missing sizes. The functions
//! here collapse those lists into the short catalogs the page renders. The
//! best representative of every `(quality, container)` pair is kept and the
//! output order is fully determined by the input order.

use std::cmp::Reverse;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::format::human_size;

/// Which of the two catalogs a stream belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamKind {
    /// Video and audio muxed into one file.
    #[default]
    Progressive,
    AudioOnly,
}

/// A single stream as reported by the provider, before any cleanup.
///
/// Every descriptive field is optional because providers routinely omit
/// them; the normalizer substitutes placeholders instead of failing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawStreamDescriptor {
    pub format_id: String,
    pub kind: StreamKind,
    /// Resolution label such as `720p`.
    pub resolution: Option<String>,
    pub fps: Option<u32>,
    /// Average bitrate label such as `128kbps`.
    pub abr: Option<String>,
    /// `<type>/<subtype>`, e.g. `audio/mp4`.
    pub mime_type: Option<String>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
    pub includes_video_track: bool,
}

impl RawStreamDescriptor {
    /// Lowercase container token taken from the MIME subtype.
    pub fn extension(&self) -> String {
        extension_from_mime(self.mime_type.as_deref())
    }

    /// Exact size when known and non-zero, the provider estimate otherwise.
    fn best_known_size(&self) -> Option<u64> {
        self.filesize
            .filter(|size| *size > 0)
            .or(self.filesize_approx)
    }
}

/// One selectable row of the format picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentableFormatEntry {
    /// The only field the client sends back to request a download.
    pub format_id: String,
    pub ext: String,
    pub label: String,
    pub sub_label: String,
    pub size_label: String,
}

/// Builds the progressive-video catalog, best resolution first.
pub fn normalize_video_streams(streams: &[RawStreamDescriptor]) -> Vec<PresentableFormatEntry> {
    let mut ordered: Vec<&RawStreamDescriptor> = streams.iter().collect();
    // `sort_by_key` is stable, so equal keys keep the provider's order.
    ordered.sort_by_key(|stream| {
        Reverse((
            resolution_height(stream.resolution.as_deref()),
            stream.fps.unwrap_or(0),
        ))
    });

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for stream in ordered {
        let resolution = non_empty(stream.resolution.as_deref());
        let ext = stream.extension();
        let key = (resolution.unwrap_or("unknown").to_owned(), ext.clone());
        if !seen.insert(key) {
            continue;
        }

        let mut label_parts = Vec::new();
        if let Some(resolution) = resolution {
            label_parts.push(resolution.to_owned());
        }
        if let Some(fps) = stream.fps.filter(|fps| *fps > 0) {
            label_parts.push(format!("{fps}fps"));
        }
        let label = if label_parts.is_empty() {
            "Video".to_owned()
        } else {
            label_parts.join(" • ")
        };

        entries.push(PresentableFormatEntry {
            format_id: stream.format_id.clone(),
            sub_label: format!("{} • Progressive", ext.to_uppercase()),
            ext,
            label,
            size_label: human_size(stream.best_known_size()),
        });
    }
    entries
}

/// Builds the audio-only catalog, highest bitrate first.
pub fn normalize_audio_streams(streams: &[RawStreamDescriptor]) -> Vec<PresentableFormatEntry> {
    let mut ordered: Vec<&RawStreamDescriptor> = streams.iter().collect();
    ordered.sort_by_key(|stream| Reverse(bitrate_value(stream.abr.as_deref())));

    let mut seen = BTreeSet::new();
    let mut entries = Vec::new();
    for stream in ordered {
        let bitrate = normalize_bitrate_label(stream.abr.as_deref());
        let ext = stream.extension();
        if !seen.insert((bitrate.clone(), ext.clone())) {
            continue;
        }

        let label = if bitrate.is_empty() {
            "High quality".to_owned()
        } else {
            bitrate
        };

        entries.push(PresentableFormatEntry {
            format_id: stream.format_id.clone(),
            sub_label: format!("{} • Audio only", ext.to_uppercase()),
            ext,
            label,
            size_label: human_size(stream.best_known_size()),
        });
    }
    entries
}

/// Numeric height from labels like `1080p`; anything unparsable sorts last.
fn resolution_height(label: Option<&str>) -> u32 {
    label
        .map(|value| value.trim().trim_end_matches('p'))
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

/// Digits of the bitrate label read as one integer (`"128kbps"` -> 128).
fn bitrate_value(label: Option<&str>) -> u64 {
    let digits: String = label
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    // Digit runs too long for a u64 rank as the highest bitrate.
    if digits.is_empty() {
        0
    } else {
        digits.parse().unwrap_or(u64::MAX)
    }
}

/// Canonical `<n>kbps` spelling used both for labels and dedup keys.
///
/// A trailing `bps` is dropped first; whatever kilo unit remains (`k` or
/// `kb`) is then spelled out as `kbps`. Labels without a unit pass through.
fn normalize_bitrate_label(label: Option<&str>) -> String {
    let trimmed = label.unwrap_or_default().trim();
    let stripped = trimmed.strip_suffix("bps").unwrap_or(trimmed);
    match stripped
        .strip_suffix("kb")
        .or_else(|| stripped.strip_suffix('k'))
    {
        Some(value) => format!("{value}kbps"),
        None => stripped.to_owned(),
    }
}

fn extension_from_mime(mime_type: Option<&str>) -> String {
    mime_type
        .and_then(|mime| mime.split_once('/'))
        .map(|(_, subtype)| subtype.split(';').next().unwrap_or_default())
        .map(|subtype| subtype.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
