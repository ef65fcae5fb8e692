use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use snap_blob::{BlobResult, ListEntry, MediaStore, MemoryMediaStore, UploadBody, UploadOptions};
use snap_resolve::{
    MediaProbe, MediaSlot, RenderFailure, ResolveError, ResolverCache, SlotState, UrlResolver,
    MAX_RETRIES,
};

/// Holds every public URL request until released
struct GatedStore {
    inner: MemoryMediaStore,
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl MediaStore for GatedStore {
    async fn upload(&self, key: &str, body: UploadBody, options: &UploadOptions) -> BlobResult<()> {
        self.inner.upload(key, body, options).await
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<ListEntry>> {
        self.inner.list(prefix).await
    }

    async fn remove(&self, keys: &[String]) -> BlobResult<()> {
        self.inner.remove(keys).await
    }

    async fn public_url(&self, key: &str) -> BlobResult<String> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.public_url(key).await
    }

    fn bucket(&self) -> &str {
        self.inner.bucket()
    }
}

/// Reports every URL as serving zero bytes, counting calls
#[derive(Default)]
struct EmptyBodyProbe {
    calls: AtomicUsize,
}

#[async_trait]
impl MediaProbe for EmptyBodyProbe {
    async fn probe(&self, _url: &str) -> Result<(), RenderFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RenderFailure::new("empty body")
            .with_status(200)
            .with_content_length(0))
    }
}

fn resolver() -> Arc<UrlResolver> {
    Arc::new(UrlResolver::new(
        MemoryMediaStore::default(),
        Arc::new(ResolverCache::new()),
    ))
}

#[tokio::test]
async fn storage_path_displays() {
    let slot = MediaSlot::new(resolver(), "feed");
    slot.show("userA/snap_1.jpg").await;

    assert_eq!(
        slot.state(),
        SlotState::Displaying {
            url: "https://memory.local/storage/v1/object/public/media/userA/snap_1.jpg".to_string()
        }
    );
    assert!(!slot.can_retry());
}

#[tokio::test]
async fn retries_are_bounded() {
    let slot = MediaSlot::new(resolver(), "chat");
    slot.show("file:///tmp/lost.jpg").await;

    match slot.state() {
        SlotState::Error { detail } => assert_eq!(detail.kind, ResolveError::UploadFailed),
        other => panic!("expected error state, got {:?}", other),
    }

    for _ in 0..MAX_RETRIES {
        assert!(slot.can_retry());
        assert!(slot.retry().await);
    }
    assert!(!slot.can_retry());
    assert!(!slot.retry().await);
    assert_eq!(slot.retries_used(), MAX_RETRIES);
}

#[tokio::test]
async fn changing_the_reference_resets_retries() {
    let slot = MediaSlot::new(resolver(), "chat");
    slot.show("file:///tmp/a.jpg").await;
    slot.retry().await;
    assert_eq!(slot.retries_used(), 1);

    slot.show("file:///tmp/b.jpg").await;
    assert_eq!(slot.retries_used(), 0);
    assert!(slot.can_retry());
}

#[tokio::test]
async fn render_failure_updates_cache_and_state() {
    let resolver = resolver();
    let reference = "https://cdn.example.com/zero.jpg";
    let slot = MediaSlot::new(resolver.clone(), "story");

    slot.show(reference).await;
    assert!(matches!(slot.state(), SlotState::Displaying { .. }));

    slot.report_render_failure(
        reference,
        &RenderFailure::new("decode failed")
            .with_status(200)
            .with_content_length(0),
    );

    match slot.state() {
        SlotState::Error { detail } => assert_eq!(detail.kind, ResolveError::EmptyFile),
        other => panic!("expected error state, got {:?}", other),
    }
    assert_eq!(
        resolver.cached(reference, "story"),
        Some(Err(ResolveError::EmptyFile))
    );
}

#[tokio::test]
async fn probe_failure_is_classified() {
    let probe = Arc::new(EmptyBodyProbe::default());
    let resolver = resolver();
    let slot = MediaSlot::new(resolver.clone(), "feed").with_probe(probe.clone());

    slot.show("userA/blank.jpg").await;

    match slot.state() {
        SlotState::Error { detail } => {
            assert_eq!(detail.kind, ResolveError::EmptyFile);
            assert_eq!(detail.title, "Empty image");
        }
        other => panic!("expected error state, got {:?}", other),
    }
    assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        resolver.cached("userA/blank.jpg", "feed"),
        Some(Err(ResolveError::EmptyFile))
    );
}

#[tokio::test]
async fn late_resolution_after_unmount_is_dropped() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let store = GatedStore {
        inner: MemoryMediaStore::default(),
        entered: entered.clone(),
        release: release.clone(),
    };
    let resolver = Arc::new(UrlResolver::new(store, Arc::new(ResolverCache::new())));
    let slot = Arc::new(MediaSlot::new(resolver.clone(), "feed"));

    let task = {
        let slot = slot.clone();
        tokio::spawn(async move { slot.show("userA/late.jpg").await })
    };

    entered.notified().await;
    slot.unmount();
    release.notify_one();
    task.await.unwrap();

    assert!(!slot.is_mounted());
    assert_eq!(slot.state(), SlotState::Loading);
    // the resolver itself still completed and cached the outcome
    assert!(resolver.cached("userA/late.jpg", "feed").is_some());
}

#[tokio::test]
async fn late_render_failure_is_charged_to_the_image_that_failed() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let store = GatedStore {
        inner: MemoryMediaStore::default(),
        entered: entered.clone(),
        release: release.clone(),
    };
    let resolver = Arc::new(UrlResolver::new(store, Arc::new(ResolverCache::new())));
    let slot = Arc::new(MediaSlot::new(resolver.clone(), "feed"));

    // https references pass through without touching the gated store
    let first = "https://cdn.example.com/a.jpg";
    slot.show(first).await;
    assert!(matches!(slot.state(), SlotState::Displaying { .. }));

    let task = {
        let slot = slot.clone();
        tokio::spawn(async move { slot.show("userA/b.jpg").await })
    };
    entered.notified().await;
    assert_eq!(slot.state(), SlotState::Loading);

    slot.report_render_failure(first, &RenderFailure::new("gone").with_status(404));
    assert_eq!(slot.state(), SlotState::Loading);

    release.notify_one();
    task.await.unwrap();

    assert!(matches!(slot.state(), SlotState::Displaying { .. }));
    assert_eq!(resolver.cached(first, "feed"), Some(Err(ResolveError::NotFound)));
    assert!(matches!(resolver.cached("userA/b.jpg", "feed"), Some(Ok(_))));
}

#[tokio::test]
async fn render_failure_for_another_url_is_ignored() {
    let resolver = resolver();
    let slot = MediaSlot::new(resolver.clone(), "feed");
    slot.show("https://cdn.example.com/a.jpg").await;

    slot.report_render_failure(
        "https://cdn.example.com/other.jpg",
        &RenderFailure::new("gone").with_status(404),
    );

    assert!(matches!(slot.state(), SlotState::Displaying { .. }));
    assert!(matches!(
        resolver.cached("https://cdn.example.com/a.jpg", "feed"),
        Some(Ok(_))
    ));
}
