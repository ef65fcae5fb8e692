use base64::Engine;
use bytes::Bytes;
use std::io;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::{image_content_type, LocalSource, MediaPayload, ReadStrategy, UploadError};

/// Turns a local file reference into an in-memory payload.
///
/// Fetching a local reference can silently produce zero bytes on some
/// platforms, so reads are attempted in order and a zero-byte result falls
/// through to the next strategy. A payload is never returned empty.
pub struct Materializer {
    source: Arc<dyn LocalSource>,
}

impl Materializer {
    pub fn new(source: Arc<dyn LocalSource>) -> Self {
        Self { source }
    }

    /// Check the file exists and is non-empty; returns its size
    pub async fn preflight(&self, uri: &str) -> Result<u64, UploadError> {
        match self.source.stat(uri).await {
            Ok(Some(0)) => Err(UploadError::SourceEmpty),
            Ok(Some(size)) => Ok(size),
            Ok(None) => Err(UploadError::SourceNotFound {
                uri: uri.to_string(),
            }),
            Err(e) => {
                warn!(uri, error = %e, "Could not stat local source");
                Err(UploadError::SourceNotFound {
                    uri: uri.to_string(),
                })
            }
        }
    }

    /// Read the file using each strategy in turn
    pub async fn materialize(
        &self,
        uri: &str,
        reads: &[ReadStrategy],
    ) -> Result<MediaPayload, UploadError> {
        let mut missing = false;

        for &strategy in reads {
            match self.read(uri, strategy).await {
                Ok(bytes) if !bytes.is_empty() => {
                    debug!(uri, ?strategy, bytes = bytes.len(), "Materialized local file");
                    return Ok(MediaPayload {
                        bytes,
                        content_type: image_content_type(uri).to_string(),
                        method: strategy,
                    });
                }
                Ok(_) => {
                    warn!(uri, ?strategy, "Read produced zero bytes");
                }
                Err(e) => {
                    if e.kind() == io::ErrorKind::NotFound {
                        missing = true;
                    }
                    warn!(uri, ?strategy, error = %e, "Read failed");
                }
            }
        }

        if missing {
            Err(UploadError::SourceNotFound {
                uri: uri.to_string(),
            })
        } else {
            Err(UploadError::BlobEmpty)
        }
    }

    async fn read(&self, uri: &str, strategy: ReadStrategy) -> io::Result<Bytes> {
        match strategy {
            ReadStrategy::Fetch => self.source.fetch(uri).await,
            ReadStrategy::Base64 => {
                let encoded = self.source.read_base64(uri).await?;
                let decoded = base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                Ok(Bytes::from(decoded))
            }
        }
    }
}
