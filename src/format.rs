//! Human-readable labels for sizes and durations shown next to each format.

/// Placeholder rendered whenever a size is missing or zero.
pub const UNKNOWN_SIZE: &str = "—";

/// Placeholder rendered for live streams or videos without a known length.
pub const UNKNOWN_DURATION: &str = "Live / Unknown";

const SIZE_UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Renders a byte count with binary (1024) steps, e.g. `1.5 KB`.
///
/// Plain bytes are printed without decimals; every larger unit gets exactly
/// one. Values past a petabyte stay in `PB`.
pub fn human_size(bytes: Option<u64>) -> String {
    let Some(bytes) = bytes.filter(|value| *value > 0) else {
        return UNKNOWN_SIZE.to_owned();
    };

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", SIZE_UNITS[unit])
    }
}

/// Renders durations as `H:MM:SS` or `M:SS` for short clips.
pub fn format_duration(seconds: Option<u64>) -> String {
    let Some(duration) = seconds else {
        return UNKNOWN_DURATION.to_owned();
    };

    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
