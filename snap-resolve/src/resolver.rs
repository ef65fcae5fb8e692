use std::sync::Arc;
use tracing::{debug, warn};

use snap_blob::{MediaStore, ReferenceKind};

use crate::{Resolution, ResolveError, ResolverCache};

/// Resolves persisted media references to displayable URLs.
///
/// Policy, in order:
/// 1. empty reference → `no_url`
/// 2. cached outcome for `(reference, consumer)`
/// 3. http(s) URL → accepted as-is, no reachability check
/// 4. `file://` URL → `upload_failed`, never displayable
/// 5. anything else is a bucket key → canonical public URL from the store,
///    which must match `/storage/…/object/public/{bucket}/`
///
/// Concurrent lookups of the same key may both miss and both hit the store.
/// Resolution is idempotent so this only costs a redundant call.
pub struct UrlResolver {
    store: Arc<dyn MediaStore>,
    cache: Arc<ResolverCache>,
    bucket: String,
}

impl UrlResolver {
    pub fn new<S: MediaStore + 'static>(store: S, cache: Arc<ResolverCache>) -> Self {
        Self::from_shared(Arc::new(store), cache)
    }

    pub fn from_shared(store: Arc<dyn MediaStore>, cache: Arc<ResolverCache>) -> Self {
        let bucket = store.bucket().to_string();
        Self {
            store,
            cache,
            bucket,
        }
    }

    /// Expect canonical URLs for a different bucket than the store reports
    pub fn with_bucket<S: Into<String>>(mut self, bucket: S) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn cache(&self) -> &Arc<ResolverCache> {
        &self.cache
    }

    /// Synchronous cache lookup
    pub fn cached(&self, reference: &str, consumer: &str) -> Option<Resolution> {
        self.cache.get(reference, consumer)
    }

    pub async fn resolve(&self, reference: &str, consumer: &str) -> Resolution {
        let kind = ReferenceKind::classify(reference);
        if kind == ReferenceKind::Empty {
            return Err(ResolveError::NoUrl);
        }

        if let Some(hit) = self.cache.get(reference, consumer) {
            debug!(reference, consumer, "Resolver cache hit");
            return hit;
        }

        let resolution = match kind {
            ReferenceKind::Remote => Ok(reference.to_string()),
            ReferenceKind::LocalFile => {
                warn!(reference, "Local file reference was persisted instead of a remote URL");
                Err(ResolveError::UploadFailed)
            }
            ReferenceKind::StoragePath => self.canonical_url(reference).await,
            ReferenceKind::Empty => Err(ResolveError::NoUrl),
        };

        let cacheable = match &resolution {
            Ok(_) => true,
            Err(e) => e.is_cacheable(),
        };
        if cacheable {
            self.cache.insert(reference, consumer, resolution.clone());
        }

        resolution
    }

    /// Forget the cached outcome and resolve again
    pub async fn retry(&self, reference: &str, consumer: &str) -> Resolution {
        self.cache.invalidate(reference, consumer);
        self.resolve(reference, consumer).await
    }

    /// A resolved URL failed to render; remember the failure for this consumer
    pub fn record_render_failure(&self, reference: &str, consumer: &str, error: ResolveError) {
        if reference.trim().is_empty() {
            return;
        }
        warn!(reference, consumer, code = error.code(), "Resolved media failed to render");
        self.cache.insert(reference, consumer, Err(error));
    }

    /// Whether `candidate` has the store's canonical public URL shape
    pub fn is_canonical_public_url(&self, candidate: &str) -> bool {
        let Ok(parsed) = url::Url::parse(candidate) else {
            return false;
        };
        if !matches!(parsed.scheme(), "https" | "http") || parsed.host_str().is_none() {
            return false;
        }

        let path = parsed.path();
        let marker = format!("/object/public/{}/", self.bucket);
        path.starts_with("/storage/") && path.contains(&marker)
    }

    async fn canonical_url(&self, reference: &str) -> Resolution {
        let key = reference.trim().trim_start_matches('/');

        let url = match self.store.public_url(key).await {
            Ok(url) => url,
            Err(e) => {
                warn!(reference, error = %e, "Could not obtain public URL");
                return Err(ResolveError::Remote(e.to_string()));
            }
        };

        if self.is_canonical_public_url(&url) {
            Ok(url)
        } else {
            warn!(reference, url = %url, "Public URL does not match the expected storage path");
            Err(ResolveError::InvalidUrl)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snap_blob::MemoryMediaStore;

    fn resolver() -> UrlResolver {
        UrlResolver::new(MemoryMediaStore::default(), Arc::new(ResolverCache::new()))
    }

    #[test]
    fn canonical_shape_check() {
        let r = resolver();
        assert!(r.is_canonical_public_url(
            "https://x.supabase.co/storage/v1/object/public/media/userA/snap_1.jpg"
        ));
        assert!(!r.is_canonical_public_url(
            "https://x.supabase.co/storage/v1/object/public/avatars/userA/snap_1.jpg"
        ));
        assert!(!r.is_canonical_public_url("https://x.supabase.co/media/userA/snap_1.jpg"));
        assert!(!r.is_canonical_public_url("not a url"));
        assert!(!r.is_canonical_public_url("ftp://x/storage/v1/object/public/media/a.jpg"));
    }

    #[tokio::test]
    async fn empty_reference_is_not_cached() {
        let r = resolver();
        assert_eq!(r.resolve("", "viewer").await, Err(ResolveError::NoUrl));
        assert!(r.cache().is_empty());
    }
}
