use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use snap_blob::{ListEntry, MediaStore, StoredObject};
use snap_records::{RecordStore, UNAVAILABLE_MARKER};

use crate::{CleanupReport, Diagnostics, RepairResult, StorageScan, UrlScan};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "heic"];

fn is_image(object: &StoredObject) -> bool {
    object
        .extension()
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Finds and repairs media left broken by failed uploads.
///
/// Scans are read-only. `mark_bad_messages_unavailable` and
/// `delete_empty_storage_objects` are destructive and only act on what a
/// fresh scan classifies as bad, so running them twice changes nothing the
/// second time.
pub struct RepairToolkit {
    records: Arc<dyn RecordStore>,
    store: Arc<dyn MediaStore>,
}

impl RepairToolkit {
    pub fn new(records: Arc<dyn RecordStore>, store: Arc<dyn MediaStore>) -> Self {
        Self { records, store }
    }

    pub async fn scan_messages_for_bad_urls(&self) -> RepairResult<UrlScan> {
        let mut scan = UrlScan::default();
        for message in self.records.messages_with_media().await? {
            if let Some(url) = message.media_url.as_deref() {
                scan.record(message.id, url);
            }
        }
        debug!(total = scan.total, bad = scan.bad, "Scanned messages");
        Ok(scan)
    }

    pub async fn scan_stories_for_bad_urls(&self) -> RepairResult<UrlScan> {
        let mut scan = UrlScan::default();
        for story in self.records.stories_with_media().await? {
            if let Some(url) = story.media_url.as_deref() {
                scan.record(story.id, url);
            }
        }
        debug!(total = scan.total, bad = scan.bad, "Scanned stories");
        Ok(scan)
    }

    /// Null every `file://` message reference and show the unavailable marker.
    /// Returns the number of messages changed.
    pub async fn mark_bad_messages_unavailable(&self) -> RepairResult<usize> {
        let scan = self.scan_messages_for_bad_urls().await?;
        if scan.bad_ids.is_empty() {
            return Ok(0);
        }

        let updated = self
            .records
            .mark_messages_unavailable(&scan.bad_ids, UNAVAILABLE_MARKER)
            .await?;
        info!(updated, "Marked messages with local file references unavailable");
        Ok(updated)
    }

    /// Image objects at the bucket root and one folder level down, split by
    /// reported size. Unknown sizes count as valid.
    pub async fn scan_empty_storage_objects(&self) -> RepairResult<StorageScan> {
        let mut objects = Vec::new();
        for entry in self.store.list("").await? {
            match entry {
                ListEntry::Object(object) => objects.push(object),
                ListEntry::Folder { prefix } => {
                    for nested in self.store.list(&prefix).await? {
                        if let ListEntry::Object(object) = nested {
                            objects.push(object);
                        }
                    }
                }
            }
        }

        let mut scan = StorageScan::default();
        for object in objects.into_iter().filter(is_image) {
            scan.total += 1;
            if object.size_bytes == Some(0) {
                scan.empty += 1;
                scan.empty_keys.push(object.key);
            } else {
                scan.valid += 1;
            }
        }
        debug!(total = scan.total, empty = scan.empty, "Scanned storage");
        Ok(scan)
    }

    /// Remove every object the storage scan reports as empty. Objects with
    /// a non-zero reported size are never touched.
    pub async fn delete_empty_storage_objects(&self) -> RepairResult<usize> {
        let scan = self.scan_empty_storage_objects().await?;
        if scan.empty_keys.is_empty() {
            return Ok(0);
        }

        self.store.remove(&scan.empty_keys).await?;
        info!(deleted = scan.empty_keys.len(), "Deleted zero-byte objects");
        Ok(scan.empty_keys.len())
    }

    pub async fn diagnose(&self) -> RepairResult<Diagnostics> {
        Ok(Diagnostics {
            scanned_at: Utc::now(),
            messages: self.scan_messages_for_bad_urls().await?,
            stories: self.scan_stories_for_bad_urls().await?,
            storage: self.scan_empty_storage_objects().await?,
        })
    }

    /// Scan, repair, rescan. Nothing is repaired when the first scan is clean.
    pub async fn run_full_cleanup(&self) -> RepairResult<CleanupReport> {
        let before = self.diagnose().await?;
        if before.is_clean() {
            info!("No media issues found, skipping repair");
            return Ok(CleanupReport {
                after: before.clone(),
                before,
                messages_marked: 0,
                objects_deleted: 0,
                items_fixed: 0,
                skipped: true,
            });
        }

        let messages_marked = if before.messages.bad > 0 {
            self.mark_bad_messages_unavailable().await?
        } else {
            0
        };
        let objects_deleted = if before.storage.empty > 0 {
            self.delete_empty_storage_objects().await?
        } else {
            0
        };
        if before.stories.bad > 0 {
            warn!(
                stories = before.stories.bad,
                "Stories with local file references need manual review"
            );
        }

        let after = self.diagnose().await?;
        let items_fixed = before.issue_count().saturating_sub(after.issue_count());
        info!(items_fixed, remaining = after.issue_count(), "Cleanup complete");

        Ok(CleanupReport {
            before,
            after,
            messages_marked,
            objects_deleted,
            items_fixed,
            skipped: false,
        })
    }
}
