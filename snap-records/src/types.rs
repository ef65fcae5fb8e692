use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use snap_blob::ReferenceKind;

/// Content shown in place of an image that can never be displayed
pub const UNAVAILABLE_MARKER: &str = "[Image unavailable]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Text,
    Image,
}

/// Row of the `messages` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub sender_id: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub message_type: MessageKind,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_expired: bool,
}

impl Message {
    /// A local device path was persisted instead of an uploaded URL.
    /// Uses the same classification as the repair scans.
    pub fn has_local_media(&self) -> bool {
        self.media_url
            .as_deref()
            .is_some_and(|url| ReferenceKind::classify(url) == ReferenceKind::LocalFile)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub chat_id: Uuid,
    pub sender_id: String,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub message_type: MessageKind,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewMessage {
    pub fn text<S: Into<String>, C: Into<String>>(chat_id: Uuid, sender_id: S, content: C) -> Self {
        Self {
            chat_id,
            sender_id: sender_id.into(),
            content: Some(content.into()),
            media_url: None,
            message_type: MessageKind::Text,
            expires_at: None,
        }
    }

    pub fn image<S: Into<String>, U: Into<String>>(chat_id: Uuid, sender_id: S, media_url: U) -> Self {
        Self {
            chat_id,
            sender_id: sender_id.into(),
            content: None,
            media_url: Some(media_url.into()),
            message_type: MessageKind::Image,
            expires_at: None,
        }
    }

    pub fn with_content<C: Into<String>>(mut self, content: C) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// Row of the `stories` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub id: Uuid,
    pub user_id: String,
    #[serde(default)]
    pub media_url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Viewer ids; appended to, never removed from
    #[serde(default)]
    pub views: Vec<String>,
}

impl Story {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStory {
    pub user_id: String,
    pub media_url: String,
    pub caption: Option<String>,
    pub expires_at: DateTime<Utc>,
}

/// Row of the `memories` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    pub id: Uuid,
    pub user_id: String,
    pub media_url: String,
    #[serde(default)]
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMemory {
    pub user_id: String,
    pub media_url: String,
    pub caption: Option<String>,
}
