use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use snap_blob::LOCAL_FILE_SCHEME;

use crate::{
    Memory, Message, NewMemory, NewMessage, NewStory, RecordError, RecordResult, RecordStore,
    Story,
};

const MESSAGES: &str = "messages";
const STORIES: &str = "stories";
const MEMORIES: &str = "memories";

/// Rows per scan request; below the hosted `max-rows` cap of 1000 so a full
/// page is never mistaken for the last one
const SCAN_PAGE_SIZE: usize = 500;
/// Ids per bulk update, keeping the `id=in.(...)` filter a bounded length
const MARK_BATCH_SIZE: usize = 100;
/// Conditional view appends attempted before giving up on a contended story
const VIEW_APPEND_ATTEMPTS: usize = 5;

/// [`RecordStore`] over a PostgREST endpoint at `{project}/rest/v1`
#[derive(Clone)]
pub struct PostgrestRecords {
    client: Client,
    rest_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl PostgrestRecords {
    pub fn new(project_url: &str, api_key: &str) -> RecordResult<Self> {
        let parsed = url::Url::parse(project_url)
            .map_err(|e| RecordError::invalid(format!("invalid project URL {}: {}", project_url, e)))?;
        if !matches!(parsed.scheme(), "https" | "http") {
            return Err(RecordError::invalid(format!(
                "project URL must be http(s): {}",
                project_url
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            access_token: None,
        })
    }

    /// Act as a signed-in user instead of the anonymous key
    pub fn with_access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        self.client
            .request(method, format!("{}/{}", self.rest_url, path))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    async fn rows<T: DeserializeOwned>(table: &'static str, response: Response) -> RecordResult<Vec<T>> {
        let response = Self::check(table, response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn check(table: &'static str, response: Response) -> RecordResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RecordError::Status {
            table,
            status: status.as_u16(),
            body,
        })
    }

    async fn insert<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &'static str,
        row: &B,
    ) -> RecordResult<T> {
        let response = self
            .request(reqwest::Method::POST, table)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;

        let mut rows: Vec<T> = Self::rows(table, response).await?;
        if rows.is_empty() {
            return Err(RecordError::invalid(format!("insert into {} returned no row", table)));
        }
        Ok(rows.remove(0))
    }

    /// Every row of `table` with a media reference, fetched page by page
    async fn with_media<T: DeserializeOwned>(&self, table: &'static str) -> RecordResult<Vec<T>> {
        collect_pages(SCAN_PAGE_SIZE, move |offset| async move {
            let response = self
                .request(reqwest::Method::GET, table)
                .query(&[
                    ("select", "*".to_string()),
                    ("media_url", "not.is.null".to_string()),
                    ("order", "id.asc".to_string()),
                    ("limit", SCAN_PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await?;
            Self::rows(table, response).await
        })
        .await
    }

    async fn story(&self, story_id: Uuid) -> RecordResult<Story> {
        let response = self
            .request(reqwest::Method::GET, STORIES)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", story_id))])
            .send()
            .await?;

        let mut rows: Vec<Story> = Self::rows(STORIES, response).await?;
        rows.pop().ok_or_else(|| RecordError::not_found(STORIES, story_id))
    }
}

/// Fetch pages starting at increasing offsets until one comes back short
async fn collect_pages<T, F, Fut>(page_size: usize, mut fetch: F) -> RecordResult<Vec<T>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = RecordResult<Vec<T>>>,
{
    let mut rows = Vec::new();
    loop {
        let page = fetch(rows.len()).await?;
        let last = page.len() < page_size;
        rows.extend(page);
        if last {
            return Ok(rows);
        }
    }
}

fn id_list(ids: &[Uuid]) -> String {
    let joined: Vec<String> = ids.iter().map(Uuid::to_string).collect();
    format!("in.({})", joined.join(","))
}

/// Postgres array literal for an `eq.` filter on a text[] column
fn array_literal(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("{{{}}}", quoted.join(","))
}

/// Row count returned by `rpc/cleanup_expired_messages`
fn expired_count(body: &[u8]) -> RecordResult<u64> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(0);
    }
    match serde_json::from_slice::<Value>(body)? {
        Value::Null => Ok(0),
        value => value.as_u64().ok_or_else(|| {
            RecordError::invalid(format!(
                "cleanup_expired_messages returned {}, expected a row count",
                value
            ))
        }),
    }
}

#[async_trait]
impl RecordStore for PostgrestRecords {
    async fn messages_with_media(&self) -> RecordResult<Vec<Message>> {
        self.with_media(MESSAGES).await
    }

    async fn stories_with_media(&self) -> RecordResult<Vec<Story>> {
        self.with_media(STORIES).await
    }

    async fn mark_messages_unavailable(&self, ids: &[Uuid], marker: &str) -> RecordResult<usize> {
        let mut updated = 0;
        for batch in ids.chunks(MARK_BATCH_SIZE) {
            // ids carry the scan's classification; the pattern stops a stale id
            // from clearing a reference that has since been uploaded
            let response = self
                .request(reqwest::Method::PATCH, MESSAGES)
                .header("Prefer", "return=representation")
                .query(&[
                    ("id", id_list(batch)),
                    ("media_url", format!("ilike.*{}*", LOCAL_FILE_SCHEME)),
                ])
                .json(&json!({ "media_url": Value::Null, "content": marker }))
                .send()
                .await?;

            let rows: Vec<Message> = Self::rows(MESSAGES, response).await?;
            updated += rows.len();
        }
        debug!(requested = ids.len(), updated, "Marked messages unavailable");
        Ok(updated)
    }

    async fn insert_message(&self, message: NewMessage) -> RecordResult<Message> {
        self.insert(MESSAGES, &message).await
    }

    async fn insert_story(&self, story: NewStory) -> RecordResult<Story> {
        self.insert(STORIES, &story).await
    }

    async fn insert_memory(&self, memory: NewMemory) -> RecordResult<Memory> {
        self.insert(MEMORIES, &memory).await
    }

    async fn active_stories(&self, now: DateTime<Utc>) -> RecordResult<Vec<Story>> {
        let response = self
            .request(reqwest::Method::GET, STORIES)
            .query(&[
                ("select", "*".to_string()),
                ("expires_at", format!("gt.{}", now.to_rfc3339())),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;
        Self::rows(STORIES, response).await
    }

    /// Compare-and-set on the whole `views` array: the PATCH only applies
    /// while the array still holds what was read, so a concurrent viewer is
    /// re-read and kept rather than overwritten.
    async fn append_story_view(&self, story_id: Uuid, viewer_id: &str) -> RecordResult<bool> {
        for attempt in 1..=VIEW_APPEND_ATTEMPTS {
            let story = self.story(story_id).await?;
            if story.views.iter().any(|v| v == viewer_id) {
                return Ok(false);
            }

            let mut views = story.views.clone();
            views.push(viewer_id.to_string());

            let response = self
                .request(reqwest::Method::PATCH, STORIES)
                .header("Prefer", "return=representation")
                .query(&[
                    ("id", format!("eq.{}", story_id)),
                    ("views", format!("eq.{}", array_literal(&story.views))),
                ])
                .json(&json!({ "views": views }))
                .send()
                .await?;
            let updated: Vec<Story> = Self::rows(STORIES, response).await?;
            if !updated.is_empty() {
                return Ok(true);
            }
            debug!(%story_id, attempt, "Story views changed underneath, re-reading");
        }

        warn!(%story_id, viewer_id, "Gave up appending story view under contention");
        Err(RecordError::invalid(format!(
            "views of story {} kept changing during append",
            story_id
        )))
    }

    async fn delete_story(&self, story_id: Uuid) -> RecordResult<bool> {
        let response = self
            .request(reqwest::Method::DELETE, STORIES)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", story_id))])
            .send()
            .await?;
        let deleted: Vec<Story> = Self::rows(STORIES, response).await?;
        Ok(!deleted.is_empty())
    }

    async fn cleanup_expired_messages(&self) -> RecordResult<u64> {
        let response = self
            .request(reqwest::Method::POST, "rpc/cleanup_expired_messages")
            .json(&json!({}))
            .send()
            .await?;
        let response = Self::check("rpc", response).await?;

        let body = response.bytes().await?;
        expired_count(&body)
    }
}
