use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io;
use std::sync::Arc;

use crate::{
    canonical_public_url, BlobError, BlobResult, ListEntry, LocalSource, MediaStore,
    StoredObject, Transport, UploadBody, UploadOptions,
};

/// In-memory local source for tests and dry runs
#[derive(Clone, Default)]
pub struct MemorySource {
    files: Arc<Mutex<HashMap<String, Bytes>>>,
    truncate_fetch: bool,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file<S: Into<String>>(self, uri: S, data: &[u8]) -> Self {
        self.files.lock().insert(uri.into(), Bytes::copy_from_slice(data));
        self
    }

    /// Make the primary read path return zero bytes, as the buggy platform fetch does
    pub fn truncate_fetch(mut self) -> Self {
        self.truncate_fetch = true;
        self
    }

    fn get(&self, uri: &str) -> io::Result<Bytes> {
        self.files
            .lock()
            .get(uri)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, uri.to_string()))
    }
}

#[async_trait]
impl LocalSource for MemorySource {
    async fn stat(&self, uri: &str) -> io::Result<Option<u64>> {
        Ok(self.files.lock().get(uri).map(|data| data.len() as u64))
    }

    async fn fetch(&self, uri: &str) -> io::Result<Bytes> {
        let data = self.get(uri)?;
        if self.truncate_fetch {
            return Ok(Bytes::new());
        }
        Ok(data)
    }

    async fn read_base64(&self, uri: &str) -> io::Result<String> {
        let data = self.get(uri)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(data))
    }
}

#[derive(Debug, Clone)]
struct MemoryObject {
    data: Bytes,
    content_type: String,
    reported_size: Option<u64>,
}

#[derive(Default)]
struct MemoryState {
    objects: BTreeMap<String, MemoryObject>,
    zero_size_budget: usize,
    fail_uploads: bool,
    fail_listing: bool,
    uploads: Vec<(String, Transport)>,
    list_calls: usize,
    public_url_calls: usize,
    removed: Vec<String>,
}

/// Snapshot of the calls a [`MemoryMediaStore`] has served
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStoreCalls {
    pub uploads: Vec<(String, Transport)>,
    pub lists: usize,
    pub public_urls: usize,
    pub removed: Vec<String>,
}

/// In-memory object store with fault injection.
///
/// Clones share state, so a test can hand one clone to an uploader and
/// inspect the other.
#[derive(Clone)]
pub struct MemoryMediaStore {
    state: Arc<Mutex<MemoryState>>,
    base_url: String,
    bucket: String,
}

impl Default for MemoryMediaStore {
    fn default() -> Self {
        Self::new("https://memory.local", "media")
    }
}

impl MemoryMediaStore {
    pub fn new<B: Into<String>, K: Into<String>>(base_url: B, bucket: K) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            base_url: base_url.into(),
            bucket: bucket.into(),
        }
    }

    /// Seed an object directly, bypassing upload bookkeeping
    pub fn insert_object<K: Into<String>>(&self, key: K, data: &[u8]) {
        let key = key.into();
        let object = MemoryObject {
            data: Bytes::copy_from_slice(data),
            content_type: crate::image_content_type(&key).to_string(),
            reported_size: Some(data.len() as u64),
        };
        self.state.lock().objects.insert(key, object);
    }

    /// Seed an object whose listing reports `size` regardless of content
    pub fn insert_reported<K: Into<String>>(&self, key: K, size: Option<u64>) {
        let key = key.into();
        let object = MemoryObject {
            data: Bytes::new(),
            content_type: crate::image_content_type(&key).to_string(),
            reported_size: size,
        };
        self.state.lock().objects.insert(key, object);
    }

    /// The next `count` uploads will be listed with size 0
    pub fn report_zero_size_for_next(&self, count: usize) {
        self.state.lock().zero_size_budget = count;
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.state.lock().fail_uploads = fail;
    }

    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().fail_listing = fail;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().objects.contains_key(key)
    }

    pub fn object_len(&self, key: &str) -> Option<u64> {
        self.state.lock().objects.get(key).map(|o| o.data.len() as u64)
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.lock().objects.keys().cloned().collect()
    }

    pub fn calls(&self) -> MemoryStoreCalls {
        let state = self.state.lock();
        MemoryStoreCalls {
            uploads: state.uploads.clone(),
            lists: state.list_calls,
            public_urls: state.public_url_calls,
            removed: state.removed.clone(),
        }
    }

    async fn collect(body: UploadBody) -> BlobResult<(Bytes, Transport)> {
        match body {
            UploadBody::Raw(bytes) => Ok((bytes, Transport::RawBuffer)),
            UploadBody::Blob(mut stream) => {
                let mut data = Vec::new();
                while let Some(chunk) = stream.next().await {
                    data.extend_from_slice(&chunk?);
                }
                Ok((Bytes::from(data), Transport::Blob))
            }
        }
    }
}

#[async_trait]
impl MediaStore for MemoryMediaStore {
    async fn upload(&self, key: &str, body: UploadBody, options: &UploadOptions) -> BlobResult<()> {
        let (data, transport) = Self::collect(body).await?;

        let mut state = self.state.lock();
        state.uploads.push((key.to_string(), transport));

        if state.fail_uploads {
            return Err(BlobError::backend(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "simulated network failure",
            )));
        }
        if !options.upsert && state.objects.contains_key(key) {
            return Err(BlobError::AlreadyExists {
                key: key.to_string(),
            });
        }

        let reported_size = if state.zero_size_budget > 0 {
            state.zero_size_budget -= 1;
            Some(0)
        } else {
            Some(data.len() as u64)
        };

        state.objects.insert(
            key.to_string(),
            MemoryObject {
                data,
                content_type: options.content_type.clone(),
                reported_size,
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<ListEntry>> {
        let mut state = self.state.lock();
        state.list_calls += 1;

        if state.fail_listing {
            return Err(BlobError::backend(io::Error::new(
                io::ErrorKind::TimedOut,
                "simulated listing failure",
            )));
        }

        let folder = prefix.trim_matches('/');
        let scope = if folder.is_empty() {
            String::new()
        } else {
            format!("{}/", folder)
        };

        let mut folders = BTreeSet::new();
        let mut entries = Vec::new();
        for (key, object) in state.objects.range(scope.clone()..) {
            let Some(rest) = key.strip_prefix(&scope) else {
                break;
            };
            match rest.split_once('/') {
                Some((child, _)) => {
                    folders.insert(format!("{}{}", scope, child));
                }
                None => entries.push(ListEntry::Object(StoredObject {
                    key: key.clone(),
                    size_bytes: object.reported_size,
                    content_type: Some(object.content_type.clone()),
                    last_modified: None,
                })),
            }
        }

        let mut listing: Vec<ListEntry> = folders
            .into_iter()
            .map(|prefix| ListEntry::Folder { prefix })
            .collect();
        listing.extend(entries);
        Ok(listing)
    }

    async fn remove(&self, keys: &[String]) -> BlobResult<()> {
        let mut state = self.state.lock();
        for key in keys {
            state.objects.remove(key);
            state.removed.push(key.clone());
        }
        Ok(())
    }

    async fn public_url(&self, key: &str) -> BlobResult<String> {
        self.state.lock().public_url_calls += 1;
        if key.is_empty() {
            return Err(BlobError::invalid("empty object key"));
        }
        Ok(canonical_public_url(&self.base_url, &self.bucket, key))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn listing_splits_folders_and_objects() {
        let store = MemoryMediaStore::default();
        store.insert_object("userA/snap_1.jpg", b"abc");
        store.insert_object("userA/snap_2.jpg", b"def");
        store.insert_object("userB/story_1.png", b"g");
        store.insert_object("root.jpg", b"h");

        let root = store.list("").await.unwrap();
        assert_eq!(
            root,
            vec![
                ListEntry::Folder { prefix: "userA".to_string() },
                ListEntry::Folder { prefix: "userB".to_string() },
                ListEntry::Object(StoredObject {
                    key: "root.jpg".to_string(),
                    size_bytes: Some(1),
                    content_type: Some("image/jpeg".to_string()),
                    last_modified: None,
                }),
            ]
        );

        let folder = store.list("userA").await.unwrap();
        assert_eq!(folder.len(), 2);
    }

    #[tokio::test]
    async fn zero_size_budget_applies_to_reported_size_only() {
        let store = MemoryMediaStore::default();
        store.report_zero_size_for_next(1);

        let options = UploadOptions::new("image/jpeg");
        store
            .upload("u/a.jpg", UploadBody::raw(Bytes::from_static(b"abcd")), &options)
            .await
            .unwrap();

        assert_eq!(store.object_len("u/a.jpg"), Some(4));
        let listed = store.list("u").await.unwrap();
        assert!(matches!(
            &listed[0],
            ListEntry::Object(StoredObject { size_bytes: Some(0), .. })
        ));
    }

    #[tokio::test]
    async fn upload_without_upsert_refuses_existing_key() {
        let store = MemoryMediaStore::default();
        store.insert_object("u/a.jpg", b"x");

        let err = store
            .upload("u/a.jpg", UploadBody::blob(Bytes::from_static(b"y")), &UploadOptions::new("image/jpeg"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::AlreadyExists { .. }));
    }
}
