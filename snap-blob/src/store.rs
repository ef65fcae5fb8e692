use async_trait::async_trait;

use crate::{BlobResult, ListEntry, UploadBody, UploadOptions};

/// Remote object store operations consumed by the upload pipeline, the
/// resolver and the repair toolkit
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store an object at `key`
    async fn upload(&self, key: &str, body: UploadBody, options: &UploadOptions) -> BlobResult<()>;

    /// List the direct children of a folder. An empty prefix lists the bucket root.
    async fn list(&self, prefix: &str) -> BlobResult<Vec<ListEntry>>;

    /// Remove objects; keys that do not exist are ignored
    async fn remove(&self, keys: &[String]) -> BlobResult<()>;

    /// Canonical public URL for a key
    async fn public_url(&self, key: &str) -> BlobResult<String>;

    /// Bucket this store writes to
    fn bucket(&self) -> &str;
}

/// Canonical public URL shape: `{base}/storage/v1/object/public/{bucket}/{key}`
pub fn canonical_public_url(base_url: &str, bucket: &str, key: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        base_url.trim_end_matches('/'),
        bucket,
        key.trim_start_matches('/')
    )
}

/// Parent folder of a key (`"userA/snap_1.jpg"` -> `"userA"`)
pub fn parent_folder(key: &str) -> &str {
    key.rsplit_once('/').map(|(folder, _)| folder).unwrap_or("")
}

/// Strategy for generating storage keys
pub trait KeyStrategy: Send + Sync {
    fn object_key(&self, user_id: &str, purpose: &str, random_suffix: bool) -> String;
}

/// `{user_id}/{purpose}_{timestamp_ms}[_{random}].jpg`
#[derive(Debug, Clone, Default)]
pub struct DefaultKeyStrategy;

impl KeyStrategy for DefaultKeyStrategy {
    fn object_key(&self, user_id: &str, purpose: &str, random_suffix: bool) -> String {
        let timestamp = chrono::Utc::now().timestamp_millis();

        if random_suffix {
            let random = uuid::Uuid::new_v4().simple().to_string();
            format!("{}/{}_{}_{}.jpg", user_id, purpose, timestamp, &random[..8])
        } else {
            format!("{}/{}_{}.jpg", user_id, purpose, timestamp)
        }
    }
}
