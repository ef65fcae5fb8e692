use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{Memory, Message, NewMemory, NewMessage, NewStory, RecordResult, Story};

/// The slice of the relational store the media pipeline reads and writes
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Messages whose `media_url` is set
    async fn messages_with_media(&self) -> RecordResult<Vec<Message>>;

    /// Stories whose `media_url` is set
    async fn stories_with_media(&self) -> RecordResult<Vec<Story>>;

    /// Null the media reference of the given messages and replace their
    /// content with `marker`.
    ///
    /// Only rows whose reference still starts with `file://` are touched.
    /// Returns the number of rows changed.
    async fn mark_messages_unavailable(&self, ids: &[Uuid], marker: &str) -> RecordResult<usize>;

    async fn insert_message(&self, message: NewMessage) -> RecordResult<Message>;

    async fn insert_story(&self, story: NewStory) -> RecordResult<Story>;

    async fn insert_memory(&self, memory: NewMemory) -> RecordResult<Memory>;

    /// Stories that have not expired at `now`, newest first
    async fn active_stories(&self, now: DateTime<Utc>) -> RecordResult<Vec<Story>>;

    /// Record that `viewer_id` saw a story. Returns false if already recorded.
    async fn append_story_view(&self, story_id: Uuid, viewer_id: &str) -> RecordResult<bool>;

    async fn delete_story(&self, story_id: Uuid) -> RecordResult<bool>;

    /// Invoke the `cleanup_expired_messages` procedure; returns rows newly expired
    async fn cleanup_expired_messages(&self) -> RecordResult<u64>;
}
