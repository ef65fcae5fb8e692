use thiserror::Error;

/// Result type for object-store operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors raised by a [`MediaStore`](crate::MediaStore) backend
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Object not found: {key}")]
    NotFound { key: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Object already exists: {key}")]
    AlreadyExists { key: String },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }
}

/// Why an upload was refused or failed.
///
/// Parameter and source errors are raised before any remote call is made.
/// Only `Transport` and `PublicUrlUnavailable` can happen after bytes have
/// left the device.
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Missing required parameters: {missing}")]
    MissingParameters { missing: String },

    #[error("Invalid URI scheme: {uri}")]
    InvalidUriScheme { uri: String },

    #[error("Source file not found: {uri}")]
    SourceNotFound { uri: String },

    #[error("Source file is empty")]
    SourceEmpty,

    #[error("Blob is empty")]
    BlobEmpty,

    #[error("Upload transport failed: {source}")]
    Transport {
        #[source]
        source: BlobError,
    },

    #[error("File size {size} exceeds maximum {max}")]
    SizeExceeded { size: u64, max: u64 },

    #[error("Public URL unavailable for {key}")]
    PublicUrlUnavailable { key: String },
}

impl UploadError {
    pub fn transport(source: BlobError) -> Self {
        Self::Transport { source }
    }

    /// Stable snake_case code, used in CLI output and logs
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingParameters { .. } => "missing_parameters",
            Self::InvalidUriScheme { .. } => "invalid_uri_scheme",
            Self::SourceNotFound { .. } => "source_not_found",
            Self::SourceEmpty => "source_empty",
            Self::BlobEmpty => "blob_empty",
            Self::Transport { .. } => "transport_error",
            Self::SizeExceeded { .. } => "size_exceeded",
            Self::PublicUrlUnavailable { .. } => "public_url_unavailable",
        }
    }
}

/// A failed upload, carrying the local reference the caller asked for
#[derive(Error, Debug)]
#[error("{error}")]
pub struct UploadFailure {
    #[source]
    pub error: UploadError,
    pub local_ref: String,
}

impl UploadFailure {
    pub fn new<S: Into<String>>(error: UploadError, local_ref: S) -> Self {
        Self {
            error,
            local_ref: local_ref.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_displays_the_underlying_reason() {
        let failure = UploadFailure::new(UploadError::BlobEmpty, "file:///tmp/a.jpg");
        assert_eq!(failure.to_string(), "Blob is empty");
        assert_eq!(failure.local_ref, "file:///tmp/a.jpg");
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            UploadError::SourceEmpty.code(),
            UploadError::BlobEmpty.code(),
            UploadError::SizeExceeded { size: 2, max: 1 }.code(),
            UploadError::transport(BlobError::invalid("x")).code(),
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }
}
