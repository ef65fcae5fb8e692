use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    Memory, Message, NewMemory, NewMessage, NewStory, RecordError, RecordResult, RecordStore,
    Story,
};

#[derive(Default)]
struct Tables {
    messages: Vec<Message>,
    stories: Vec<Story>,
    memories: Vec<Memory>,
    cleanup_calls: usize,
}

/// In-memory record store for tests and dry runs. Clones share tables.
#[derive(Clone, Default)]
pub struct MemoryRecords {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_message(&self, message: Message) {
        self.tables.write().messages.push(message);
    }

    pub fn seed_story(&self, story: Story) {
        self.tables.write().stories.push(story);
    }

    pub fn messages(&self) -> Vec<Message> {
        self.tables.read().messages.clone()
    }

    pub fn stories(&self) -> Vec<Story> {
        self.tables.read().stories.clone()
    }

    pub fn memories(&self) -> Vec<Memory> {
        self.tables.read().memories.clone()
    }

    pub fn cleanup_calls(&self) -> usize {
        self.tables.read().cleanup_calls
    }

    /// Build a message row with a fresh id and the given media reference
    pub fn message_with_media<S: Into<String>>(sender_id: &str, media_url: S) -> Message {
        Message {
            id: Uuid::new_v4(),
            chat_id: Uuid::new_v4(),
            sender_id: sender_id.to_string(),
            content: None,
            media_url: Some(media_url.into()),
            message_type: crate::MessageKind::Image,
            created_at: Utc::now(),
            expires_at: None,
            is_expired: false,
        }
    }

    /// Build a story row expiring 24 hours from now
    pub fn story_with_media<S: Into<String>>(user_id: &str, media_url: S) -> Story {
        let now = Utc::now();
        Story {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            media_url: Some(media_url.into()),
            caption: None,
            created_at: now,
            expires_at: now + chrono::Duration::hours(crate::STORY_LIFETIME_HOURS),
            views: Vec::new(),
        }
    }
}

fn has_media(url: &Option<String>) -> bool {
    url.as_deref().is_some_and(|u| !u.is_empty())
}

#[async_trait]
impl RecordStore for MemoryRecords {
    async fn messages_with_media(&self) -> RecordResult<Vec<Message>> {
        let tables = self.tables.read();
        Ok(tables
            .messages
            .iter()
            .filter(|m| has_media(&m.media_url))
            .cloned()
            .collect())
    }

    async fn stories_with_media(&self) -> RecordResult<Vec<Story>> {
        let tables = self.tables.read();
        Ok(tables
            .stories
            .iter()
            .filter(|s| has_media(&s.media_url))
            .cloned()
            .collect())
    }

    async fn mark_messages_unavailable(&self, ids: &[Uuid], marker: &str) -> RecordResult<usize> {
        let mut tables = self.tables.write();
        let mut changed = 0;
        for message in tables.messages.iter_mut() {
            if ids.contains(&message.id) && message.has_local_media() {
                message.media_url = None;
                message.content = Some(marker.to_string());
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn insert_message(&self, message: NewMessage) -> RecordResult<Message> {
        let row = Message {
            id: Uuid::new_v4(),
            chat_id: message.chat_id,
            sender_id: message.sender_id,
            content: message.content,
            media_url: message.media_url,
            message_type: message.message_type,
            created_at: Utc::now(),
            expires_at: message.expires_at,
            is_expired: false,
        };
        self.tables.write().messages.push(row.clone());
        Ok(row)
    }

    async fn insert_story(&self, story: NewStory) -> RecordResult<Story> {
        let row = Story {
            id: Uuid::new_v4(),
            user_id: story.user_id,
            media_url: Some(story.media_url),
            caption: story.caption,
            created_at: Utc::now(),
            expires_at: story.expires_at,
            views: Vec::new(),
        };
        self.tables.write().stories.push(row.clone());
        Ok(row)
    }

    async fn insert_memory(&self, memory: NewMemory) -> RecordResult<Memory> {
        let row = Memory {
            id: Uuid::new_v4(),
            user_id: memory.user_id,
            media_url: memory.media_url,
            caption: memory.caption,
            created_at: Utc::now(),
        };
        self.tables.write().memories.push(row.clone());
        Ok(row)
    }

    async fn active_stories(&self, now: DateTime<Utc>) -> RecordResult<Vec<Story>> {
        let mut active: Vec<Story> = self
            .tables
            .read()
            .stories
            .iter()
            .filter(|s| s.is_active(now))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(active)
    }

    async fn append_story_view(&self, story_id: Uuid, viewer_id: &str) -> RecordResult<bool> {
        let mut tables = self.tables.write();
        let story = tables
            .stories
            .iter_mut()
            .find(|s| s.id == story_id)
            .ok_or_else(|| RecordError::not_found("stories", story_id))?;

        if story.views.iter().any(|v| v == viewer_id) {
            return Ok(false);
        }
        story.views.push(viewer_id.to_string());
        Ok(true)
    }

    async fn delete_story(&self, story_id: Uuid) -> RecordResult<bool> {
        let mut tables = self.tables.write();
        let before = tables.stories.len();
        tables.stories.retain(|s| s.id != story_id);
        Ok(tables.stories.len() != before)
    }

    async fn cleanup_expired_messages(&self) -> RecordResult<u64> {
        let now = Utc::now();
        let mut tables = self.tables.write();
        tables.cleanup_calls += 1;

        let mut expired = 0;
        for message in tables.messages.iter_mut() {
            if !message.is_expired && message.expires_at.is_some_and(|at| at <= now) {
                message.is_expired = true;
                expired += 1;
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_unavailable_only_touches_local_references() {
        let records = MemoryRecords::new();
        let bad = MemoryRecords::message_with_media("userA", "file:///tmp/a.jpg");
        let good = MemoryRecords::message_with_media(
            "userA",
            "https://x.supabase.co/storage/v1/object/public/media/userA/a.jpg",
        );
        let relative = MemoryRecords::message_with_media("userA", "userA/b.jpg");
        records.seed_message(bad.clone());
        records.seed_message(good.clone());
        records.seed_message(relative.clone());

        let ids = vec![bad.id, good.id, relative.id];
        assert_eq!(records.mark_messages_unavailable(&ids, "gone").await.unwrap(), 1);
        assert_eq!(records.mark_messages_unavailable(&ids, "gone").await.unwrap(), 0);

        let rows = records.messages();
        assert_eq!(rows[0].media_url, None);
        assert_eq!(rows[0].content.as_deref(), Some("gone"));
        assert_eq!(rows[1].media_url, good.media_url);
        assert_eq!(rows[2].media_url, relative.media_url);
    }

    #[tokio::test]
    async fn story_views_are_append_only() {
        let records = MemoryRecords::new();
        let story = MemoryRecords::story_with_media("userA", "https://cdn/s.jpg");
        records.seed_story(story.clone());

        assert!(records.append_story_view(story.id, "userB").await.unwrap());
        assert!(!records.append_story_view(story.id, "userB").await.unwrap());
        assert!(records.append_story_view(story.id, "userC").await.unwrap());
        assert_eq!(records.stories()[0].views, vec!["userB", "userC"]);

        let missing = records.append_story_view(Uuid::new_v4(), "userB").await;
        assert!(matches!(missing, Err(RecordError::NotFound { .. })));
    }

    #[tokio::test]
    async fn cleanup_marks_expired_messages_once() {
        let records = MemoryRecords::new();
        let mut old = MemoryRecords::message_with_media("userA", "https://cdn/a.jpg");
        old.expires_at = Some(Utc::now() - chrono::Duration::minutes(1));
        records.seed_message(old);
        records.seed_message(MemoryRecords::message_with_media("userA", "https://cdn/b.jpg"));

        assert_eq!(records.cleanup_expired_messages().await.unwrap(), 1);
        assert_eq!(records.cleanup_expired_messages().await.unwrap(), 0);
        assert_eq!(records.cleanup_calls(), 2);
    }
}
