use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use snap_blob::{MediaUploader, UploadFailure};

use crate::{Memory, Message, NewMemory, NewMessage, NewStory, RecordError, RecordStore, Story};

/// Stories disappear a day after posting
pub const STORY_LIFETIME_HOURS: i64 = 24;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Upload failed: {0}")]
    Upload(#[from] UploadFailure),

    /// The object was uploaded but no record references it
    #[error("Record write failed after upload of {key}: {source}")]
    Record {
        key: String,
        #[source]
        source: RecordError,
    },
}

/// Uploads media and then writes the record that references it.
///
/// A record is only written after the upload succeeded, so no record ever
/// carries a local path. A crash between the two steps leaves an orphaned
/// object in the store.
pub struct MediaPublisher {
    uploader: Arc<MediaUploader>,
    records: Arc<dyn RecordStore>,
}

impl MediaPublisher {
    pub fn new(uploader: Arc<MediaUploader>, records: Arc<dyn RecordStore>) -> Self {
        Self { uploader, records }
    }

    pub async fn send_media_message(
        &self,
        chat_id: Uuid,
        sender_id: &str,
        local_ref: &str,
        caption: Option<&str>,
    ) -> Result<Message, PublishError> {
        let receipt = self.uploader.upload(local_ref, sender_id, "message").await?;

        let mut message = NewMessage::image(chat_id, sender_id, receipt.public_url.as_str());
        if let Some(caption) = caption {
            message = message.with_content(caption);
        }

        let row = self
            .records
            .insert_message(message)
            .await
            .map_err(|source| PublishError::Record {
                key: receipt.key.clone(),
                source,
            })?;
        info!(message_id = %row.id, key = %receipt.key, "Media message sent");
        Ok(row)
    }

    pub async fn post_story(
        &self,
        user_id: &str,
        local_ref: &str,
        caption: Option<&str>,
    ) -> Result<Story, PublishError> {
        let receipt = self.uploader.upload(local_ref, user_id, "story").await?;

        let story = NewStory {
            user_id: user_id.to_string(),
            media_url: receipt.public_url.clone(),
            caption: caption.map(str::to_string),
            expires_at: Utc::now() + chrono::Duration::hours(STORY_LIFETIME_HOURS),
        };

        let row = self
            .records
            .insert_story(story)
            .await
            .map_err(|source| PublishError::Record {
                key: receipt.key.clone(),
                source,
            })?;
        info!(story_id = %row.id, key = %receipt.key, "Story posted");
        Ok(row)
    }

    pub async fn save_memory(
        &self,
        user_id: &str,
        local_ref: &str,
        caption: Option<&str>,
    ) -> Result<Memory, PublishError> {
        let receipt = self.uploader.upload(local_ref, user_id, "memory").await?;

        let memory = NewMemory {
            user_id: user_id.to_string(),
            media_url: receipt.public_url.clone(),
            caption: caption.map(str::to_string),
        };

        let row = self
            .records
            .insert_memory(memory)
            .await
            .map_err(|source| PublishError::Record {
                key: receipt.key.clone(),
                source,
            })?;
        info!(memory_id = %row.id, key = %receipt.key, "Memory saved");
        Ok(row)
    }
}
