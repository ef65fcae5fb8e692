use serde::Serialize;
use thiserror::Error;

/// Why a media reference cannot be displayed
#[derive(Error, Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "code", content = "detail", rename_all = "snake_case")]
pub enum ResolveError {
    #[error("no_url")]
    NoUrl,

    /// A device-local path was persisted instead of a remote URL
    #[error("upload_failed")]
    UploadFailed,

    #[error("invalid_url")]
    InvalidUrl,

    #[error("empty_file")]
    EmptyFile,

    #[error("forbidden")]
    Forbidden,

    #[error("not_found")]
    NotFound,

    #[error("remote_error: {0}")]
    Remote(String),
}

impl ResolveError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoUrl => "no_url",
            Self::UploadFailed => "upload_failed",
            Self::InvalidUrl => "invalid_url",
            Self::EmptyFile => "empty_file",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Remote(_) => "remote_error",
        }
    }

    /// Transient failures and empty references are not remembered
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::NoUrl | Self::Remote(_))
    }
}
