//! # snap-repair: diagnostics for broken media
//!
//! Older clients sometimes persisted a device-local `file://` path instead of
//! the uploaded URL, or left zero-byte objects in the bucket. The
//! [`RepairToolkit`] finds both and offers batch fixes:
//!
//! ```text
//! diagnose ──► mark_bad_messages_unavailable ──► delete_empty_storage_objects ──► diagnose
//!    │
//!    └─ clean? stop here
//! ```
//!
//! Size checks trust the size the store reports in its listing. An object
//! listed with an unknown size is treated as valid.

mod error;
mod report;
mod toolkit;

pub use error::{RepairError, RepairResult};
pub use report::{
    CleanupReport, Diagnostics, ReferenceSample, StorageScan, UrlScan, SAMPLE_LIMIT,
};
pub use toolkit::RepairToolkit;
