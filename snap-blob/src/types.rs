use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::config::ReadStrategy;

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Scheme prefix of a device-local file reference
pub const LOCAL_FILE_SCHEME: &str = "file://";

/// Shape of a persisted media reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Empty,
    /// http(s) URL, the only form that should ever be persisted
    Remote,
    /// device-local file URL persisted by a failed upload
    LocalFile,
    /// key inside the bucket, needs resolving
    StoragePath,
}

impl ReferenceKind {
    pub fn classify(reference: &str) -> Self {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Self::Empty;
        }
        let lower = trimmed.to_ascii_lowercase();
        if lower.starts_with("https://") || lower.starts_with("http://") {
            Self::Remote
        } else if lower.starts_with(LOCAL_FILE_SCHEME) {
            Self::LocalFile
        } else {
            Self::StoragePath
        }
    }
}

/// In-memory payload produced by the materializer
#[derive(Debug, Clone)]
pub struct MediaPayload {
    pub bytes: Bytes,
    pub content_type: String,
    /// Which read strategy produced the bytes
    pub method: ReadStrategy,
}

impl MediaPayload {
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Body handed to [`MediaStore::upload`](crate::MediaStore::upload)
pub enum UploadBody {
    Blob(ByteStream),
    Raw(Bytes),
}

impl UploadBody {
    /// Wrap bytes as a single-chunk blob stream
    pub fn blob(bytes: Bytes) -> Self {
        let stream = futures::stream::once(async move { Ok(bytes) });
        Self::Blob(Box::pin(stream))
    }

    pub fn raw(bytes: Bytes) -> Self {
        Self::Raw(bytes)
    }
}

impl std::fmt::Debug for UploadBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blob(_) => f.write_str("UploadBody::Blob(..)"),
            Self::Raw(bytes) => write!(f, "UploadBody::Raw({} bytes)", bytes.len()),
        }
    }
}

/// Per-object options sent with an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    pub cache_control: String,
    /// Overwrite an existing object at the same key
    pub upsert: bool,
}

impl UploadOptions {
    pub fn new<S: Into<String>>(content_type: S) -> Self {
        Self {
            content_type: content_type.into(),
            cache_control: "3600".to_string(),
            upsert: false,
        }
    }

    pub fn with_cache_control(mut self, secs: u32) -> Self {
        self.cache_control = secs.to_string();
        self
    }

    pub fn with_upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }
}

/// An object as reported by a listing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    /// Size reported by the store's metadata; `None` when the store did not say
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
    pub last_modified: Option<i64>,
}

impl StoredObject {
    /// Last path segment of the key
    pub fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    pub fn extension(&self) -> Option<String> {
        let name = self.name();
        name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
    }
}

/// One row of a folder listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListEntry {
    Object(StoredObject),
    Folder { prefix: String },
}

/// Guess an image MIME type from a file name or URI
pub fn image_content_type(reference: &str) -> &'static str {
    let ext = reference
        .rsplit('/')
        .next()
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        _ => "image/jpeg",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_references() {
        assert_eq!(ReferenceKind::classify(""), ReferenceKind::Empty);
        assert_eq!(ReferenceKind::classify("   "), ReferenceKind::Empty);
        assert_eq!(
            ReferenceKind::classify("https://x.supabase.co/storage/v1/object/public/media/a.jpg"),
            ReferenceKind::Remote
        );
        assert_eq!(ReferenceKind::classify("file:///tmp/a.jpg"), ReferenceKind::LocalFile);
        assert_eq!(ReferenceKind::classify("userA/snap_1.jpg"), ReferenceKind::StoragePath);
    }

    #[test]
    fn content_type_from_extension() {
        assert_eq!(image_content_type("file:///tmp/a.PNG"), "image/png");
        assert_eq!(image_content_type("file:///tmp/a.jpeg"), "image/jpeg");
        assert_eq!(image_content_type("file:///tmp/noext"), "image/jpeg");
    }

    #[test]
    fn object_name_and_extension() {
        let object = StoredObject {
            key: "userA/snap_1.JPG".to_string(),
            size_bytes: Some(0),
            content_type: None,
            last_modified: None,
        };
        assert_eq!(object.name(), "snap_1.JPG");
        assert_eq!(object.extension().as_deref(), Some("jpg"));
    }
}
