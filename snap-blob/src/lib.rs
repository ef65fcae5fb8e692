//! # snap-blob: media upload pipeline
//!
//! `snap-blob` takes a photo captured on the device and puts it in the
//! object store, returning the canonical public URL that gets persisted on
//! a message, story or memory.
//!
//! ## Key Features
//!
//! - **Materialization with fallback**: local files are fetched, and a
//!   zero-byte fetch falls back to a base64 read. Empty payloads are never uploaded.
//! - **One uploader, many policies**: the historical simple/direct/robust
//!   strategies are presets of a declarative [`UploadPolicy`].
//! - **Post-upload verification**: the destination folder is listed and a
//!   zero-byte object can be deleted and re-sent over the raw buffer transport.
//! - **Storage agnostic**: [`MediaStore`] is implemented for S3-compatible
//!   endpoints and for memory.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use snap_blob::prelude::*;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = S3MediaStore::new(S3Config::from_env()?).await;
//! let uploader = MediaUploader::new(store, FsSource::new(), UploadPolicy::robust());
//!
//! let receipt = uploader.upload("file:///tmp/photo.jpg", "user-123", "snap").await?;
//! println!("{}", receipt.public_url);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  MediaUploader  │  ← policy: preflight, reads, transports, verify
//! ├─────────────────┤
//! │  Materializer   │  ← LocalSource → MediaPayload
//! ├─────────────────┤
//! │   MediaStore    │  ← upload / list / remove / public_url
//! └─────────────────┘
//! ```

mod config;
mod error;
mod materialize;
mod memory;
mod receipt;
mod s3_store;
mod source;
pub mod store;
mod types;
mod upload;

pub use config::{ReadStrategy, Transport, UploadPolicy, VerifyMode, DEFAULT_MAX_UPLOAD_BYTES};
pub use error::{BlobError, BlobResult, UploadError, UploadFailure};
pub use materialize::Materializer;
pub use memory::{MemoryMediaStore, MemorySource, MemoryStoreCalls};
pub use receipt::{UploadReceipt, Verification};
pub use s3_store::{S3Config, S3MediaStore};
pub use source::{is_local_reference, FsSource, LocalSource};
pub use store::{
    canonical_public_url, parent_folder, DefaultKeyStrategy, KeyStrategy, MediaStore,
};
pub use types::{
    image_content_type, ByteStream, ListEntry, MediaPayload, ReferenceKind, StoredObject,
    UploadBody, UploadOptions, LOCAL_FILE_SCHEME,
};
pub use upload::MediaUploader;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BlobError, BlobResult, FsSource, MediaStore, MediaUploader, S3Config, S3MediaStore,
        UploadFailure, UploadPolicy, UploadReceipt,
    };
}
