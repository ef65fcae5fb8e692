use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use snap_blob::ReferenceKind;

/// Samples kept per scan for display
pub const SAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceSample {
    pub id: Uuid,
    pub media_url: String,
}

/// Classification of persisted media references for one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UrlScan {
    pub total: usize,
    /// https references
    pub good: usize,
    /// `file://` references persisted by a failed upload
    pub bad: usize,
    /// storage-relative paths, left alone
    pub relative: usize,
    pub bad_samples: Vec<ReferenceSample>,
    #[serde(skip)]
    pub bad_ids: Vec<Uuid>,
}

impl UrlScan {
    pub(crate) fn record(&mut self, id: Uuid, media_url: &str) {
        self.total += 1;
        match ReferenceKind::classify(media_url) {
            ReferenceKind::Remote => self.good += 1,
            ReferenceKind::LocalFile => {
                self.bad += 1;
                self.bad_ids.push(id);
                if self.bad_samples.len() < SAMPLE_LIMIT {
                    self.bad_samples.push(ReferenceSample {
                        id,
                        media_url: media_url.to_string(),
                    });
                }
            }
            ReferenceKind::StoragePath | ReferenceKind::Empty => self.relative += 1,
        }
    }
}

/// Partition of stored images by reported size
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageScan {
    pub total: usize,
    pub empty: usize,
    pub valid: usize,
    pub empty_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub scanned_at: DateTime<Utc>,
    pub messages: UrlScan,
    pub stories: UrlScan,
    pub storage: StorageScan,
}

impl Diagnostics {
    pub fn issue_count(&self) -> usize {
        self.messages.bad + self.stories.bad + self.storage.empty
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub before: Diagnostics,
    pub after: Diagnostics,
    pub messages_marked: usize,
    pub objects_deleted: usize,
    pub items_fixed: usize,
    /// True when the first scan found nothing and no repair ran
    pub skipped: bool,
}
