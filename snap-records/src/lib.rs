//! # snap-records: the relational side of snapvault media
//!
//! Messages, stories and memories persist a media reference produced by
//! `snap-blob`. This crate provides:
//!
//! - **[`RecordStore`]**: the table operations the media pipeline needs
//! - **[`PostgrestRecords`]**: a PostgREST backend (`{project}/rest/v1`)
//! - **[`MemoryRecords`]**: an in-memory backend for tests
//! - **[`MediaPublisher`]**: upload first, then insert the record
//! - **[`ExpirySweeper`]**: runs `cleanup_expired_messages` every 30 minutes
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use snap_records::{ExpirySweeper, PostgrestRecords};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let records = PostgrestRecords::new("https://x.supabase.co", "anon-key")?;
//! let handle = ExpirySweeper::new(Arc::new(records)).spawn();
//! # handle.abort();
//! # Ok(())
//! # }
//! ```

mod error;
mod memory;
mod postgrest;
mod publish;
mod store;
mod sweeper;
mod types;

pub use error::{RecordError, RecordResult};
pub use memory::MemoryRecords;
pub use postgrest::PostgrestRecords;
pub use publish::{MediaPublisher, PublishError, STORY_LIFETIME_HOURS};
pub use store::RecordStore;
pub use sweeper::{ExpirySweeper, DEFAULT_SWEEP_INTERVAL};
pub use types::{
    Memory, Message, MessageKind, NewMemory, NewMessage, NewStory, Story, UNAVAILABLE_MARKER,
};
