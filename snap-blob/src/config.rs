use serde::{Deserialize, Serialize};

/// Default size ceiling for the robust policy
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024; // 10MB

/// How a local file is turned into bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadStrategy {
    /// Fetch-and-convert the local reference (may silently truncate to zero bytes)
    Fetch,
    /// Read the file base64-encoded and decode it back into bytes
    Base64,
}

/// How the payload is handed to the object store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Structured blob stream
    Blob,
    /// Raw byte buffer
    RawBuffer,
}

/// What happens after the store reports a successful upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyMode {
    /// Trust the upload call
    Skip,
    /// List the destination folder and flag a zero-byte object without failing
    Confirm,
    /// Like `Confirm`, but delete a zero-byte object and retry with the next transport
    Repair,
}

/// Declarative upload policy.
///
/// One uploader implementation runs every policy; the presets reproduce the
/// three historical behaviours (simple, direct, robust).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadPolicy {
    /// Stat the local file and reject missing/empty sources before reading
    pub preflight: bool,

    /// Read strategies, tried in order until one yields a non-empty payload
    pub reads: Vec<ReadStrategy>,

    /// Upload transports. The first is used for the initial upload; the
    /// remaining ones are only used by `VerifyMode::Repair` retries.
    pub transports: Vec<Transport>,

    pub verify: VerifyMode,

    /// Reject payloads larger than this
    pub max_bytes: Option<u64>,

    /// Append a random suffix to the storage key
    pub random_suffix: bool,

    /// Cache-Control max-age sent with the object, in seconds
    pub cache_control_secs: u32,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::robust()
    }
}

impl UploadPolicy {
    /// Materialize once, upload once, no verification
    pub fn simple() -> Self {
        Self {
            preflight: false,
            reads: vec![ReadStrategy::Fetch],
            transports: vec![Transport::Blob],
            verify: VerifyMode::Skip,
            max_bytes: None,
            random_suffix: false,
            cache_control_secs: 3600,
        }
    }

    /// Base64 read only, then confirm the object exists on the server
    pub fn direct() -> Self {
        Self {
            preflight: false,
            reads: vec![ReadStrategy::Base64],
            transports: vec![Transport::Blob],
            verify: VerifyMode::Confirm,
            max_bytes: None,
            random_suffix: false,
            cache_control_secs: 3600,
        }
    }

    /// Full pipeline: preflight, size ceiling, read fallback, verify and
    /// retry a zero-byte object once over the raw buffer transport
    pub fn robust() -> Self {
        Self {
            preflight: true,
            reads: vec![ReadStrategy::Fetch, ReadStrategy::Base64],
            transports: vec![Transport::Blob, Transport::RawBuffer],
            verify: VerifyMode::Repair,
            max_bytes: Some(DEFAULT_MAX_UPLOAD_BYTES),
            random_suffix: true,
            cache_control_secs: 3600,
        }
    }

    /// Look up a preset by name (`simple`, `direct`, `robust`)
    pub fn named(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "simple" => Some(Self::simple()),
            "direct" => Some(Self::direct()),
            "robust" => Some(Self::robust()),
            _ => None,
        }
    }

    pub fn with_max_bytes(mut self, bytes: u64) -> Self {
        self.max_bytes = Some(bytes);
        self
    }

    pub fn without_size_limit(mut self) -> Self {
        self.max_bytes = None;
        self
    }

    pub fn with_random_suffix(mut self, enabled: bool) -> Self {
        self.random_suffix = enabled;
        self
    }

    pub fn with_preflight(mut self, enabled: bool) -> Self {
        self.preflight = enabled;
        self
    }

    pub fn with_reads(mut self, reads: Vec<ReadStrategy>) -> Self {
        self.reads = reads;
        self
    }

    pub fn with_transports(mut self, transports: Vec<Transport>) -> Self {
        self.transports = transports;
        self
    }

    pub fn with_verify(mut self, verify: VerifyMode) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_cache_control(mut self, secs: u32) -> Self {
        self.cache_control_secs = secs;
        self
    }
}
