use serde::{Deserialize, Serialize};

use crate::{ReadStrategy, Transport};

/// Receipt returned after a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub key: String,
    pub public_url: String,
    /// Size of the payload that was sent; never the server-reported size
    pub size_bytes: u64,
    pub content_type: String,
    pub read: ReadStrategy,
    /// Transport of the upload that produced the stored object
    pub transport: Transport,
    pub verification: Verification,
    pub created_at: i64,
}

/// Outcome of the post-upload check.
///
/// Verification never turns a successful upload into a failure; these are
/// recorded and logged only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    Skipped,
    Confirmed { server_size: Option<u64> },
    /// The store lists the object with size 0
    ZeroByte,
    /// Listing succeeded but did not contain the object
    Missing,
    /// Listing itself failed
    Unavailable { reason: String },
    /// A zero-byte object was deleted and re-uploaded over another transport
    Repaired { server_size: Option<u64> },
}

impl Verification {
    pub fn is_suspect(&self) -> bool {
        matches!(self, Self::ZeroByte | Self::Missing)
    }
}

impl UploadReceipt {
    pub fn new<K: Into<String>, U: Into<String>>(key: K, public_url: U, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            public_url: public_url.into(),
            size_bytes,
            content_type: "image/jpeg".to_string(),
            read: ReadStrategy::Fetch,
            transport: Transport::Blob,
            verification: Verification::Skipped,
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn with_content_type<S: Into<String>>(mut self, content_type: S) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_read(mut self, read: ReadStrategy) -> Self {
        self.read = read;
        self
    }

    pub fn with_transport(mut self, transport: Transport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_verification(mut self, verification: Verification) -> Self {
        self.verification = verification;
        self
    }
}
