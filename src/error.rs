use thiserror::Error;

/// Failures surfaced by the extraction and download services.
///
/// The split mirrors who is at fault: `Validation` means the request itself
/// is unusable, `Collaborator` means `yt-dlp`, `ffmpeg` or the filesystem
/// failed underneath an otherwise valid request.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Collaborator(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn collaborator(message: impl Into<String>) -> Self {
        Self::Collaborator(message.into())
    }

    /// Wraps a provider failure in the message shown to users when a video
    /// cannot be reached at all.
    pub fn unreachable(cause: impl std::fmt::Display) -> Self {
        Self::Collaborator(format!("Unable to access this video: {cause}"))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation(message) | Self::Collaborator(message) => message,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
