use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::{MediaProbe, RenderFailure, Resolution, ResolveError, UrlResolver};

/// User-triggered retries offered before the retry affordance is hidden
pub const MAX_RETRIES: u32 = 2;

/// User-facing description of a failed image slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub kind: ResolveError,
    pub title: String,
    pub message: String,
}

impl ErrorDetail {
    pub fn from_error(error: &ResolveError) -> Self {
        let (title, message) = match error {
            ResolveError::EmptyFile => ("Empty image", "This image was saved without any data.".to_string()),
            ResolveError::Forbidden => ("Access denied", "You don't have permission to view this image.".to_string()),
            ResolveError::NotFound => ("Image not found", "This image no longer exists.".to_string()),
            ResolveError::UploadFailed => ("Upload failed", "This image never finished uploading.".to_string()),
            ResolveError::NoUrl => ("No image", "There is no image attached.".to_string()),
            ResolveError::InvalidUrl => ("Invalid image link", "The stored link for this image is not valid.".to_string()),
            ResolveError::Remote(reason) => ("Couldn't load image", reason.clone()),
        };
        Self {
            kind: error.clone(),
            title: title.to_string(),
            message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    Loading,
    Displaying { url: String },
    Error { detail: ErrorDetail },
}

struct SlotInner {
    reference: Option<String>,
    state: SlotState,
    retries: u32,
    // bumped on every load; results from older loads are dropped
    generation: u64,
    // (reference, url) of the last successful resolution
    displayed: Option<(String, String)>,
}

/// One image slot on screen.
///
/// `loading → displaying | error`, and `error → loading` on retry. Results
/// that arrive after [`MediaSlot::unmount`] or after the reference changed
/// are discarded; in-flight resolutions are not aborted.
pub struct MediaSlot {
    resolver: Arc<UrlResolver>,
    probe: Option<Arc<dyn MediaProbe>>,
    consumer: String,
    inner: Mutex<SlotInner>,
    alive: AtomicBool,
}

impl MediaSlot {
    pub fn new<C: Into<String>>(resolver: Arc<UrlResolver>, consumer: C) -> Self {
        Self {
            resolver,
            probe: None,
            consumer: consumer.into(),
            inner: Mutex::new(SlotInner {
                reference: None,
                state: SlotState::Loading,
                retries: 0,
                generation: 0,
                displayed: None,
            }),
            alive: AtomicBool::new(true),
        }
    }

    /// Probe resolved URLs before reporting them as displayable
    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn state(&self) -> SlotState {
        self.inner.lock().state.clone()
    }

    pub fn reference(&self) -> Option<String> {
        self.inner.lock().reference.clone()
    }

    pub fn retries_used(&self) -> u32 {
        self.inner.lock().retries
    }

    pub fn is_mounted(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Stop applying results; pending resolutions finish but are ignored
    pub fn unmount(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Mount or change the reference shown in this slot
    pub async fn show(&self, reference: &str) {
        {
            let mut inner = self.inner.lock();
            if inner.reference.as_deref() != Some(reference) {
                inner.reference = Some(reference.to_string());
                inner.retries = 0;
            }
        }
        self.load().await;
    }

    pub fn can_retry(&self) -> bool {
        let inner = self.inner.lock();
        matches!(inner.state, SlotState::Error { .. }) && inner.retries < MAX_RETRIES
    }

    /// Invalidate the cached outcome and resolve again. Returns false when
    /// no retry is available.
    pub async fn retry(&self) -> bool {
        if !self.is_mounted() || !self.can_retry() {
            return false;
        }

        let reference = {
            let mut inner = self.inner.lock();
            inner.retries += 1;
            inner.reference.clone()
        };
        if let Some(reference) = reference {
            self.resolver.cache().invalidate(&reference, &self.consumer);
        }
        self.load().await;
        true
    }

    /// `url` failed to render (e.g. the server sent Content-Length 0).
    ///
    /// The failure is cached against the reference that produced `url`. The
    /// slot only moves to the error state while it is still displaying that
    /// URL; a report for anything else leaves the current state alone.
    pub fn report_render_failure(&self, url: &str, failure: &RenderFailure) {
        if !self.is_mounted() {
            return;
        }

        let mut inner = self.inner.lock();
        let Some((reference, _)) = inner.displayed.as_ref().filter(|(_, shown)| shown == url) else {
            debug!(consumer = %self.consumer, url, "Render failure for a URL this slot is not showing");
            return;
        };

        let error = failure.classify();
        self.resolver
            .record_render_failure(reference, &self.consumer, error.clone());

        if matches!(&inner.state, SlotState::Displaying { url: shown } if shown == url) {
            inner.state = SlotState::Error {
                detail: ErrorDetail::from_error(&error),
            };
        }
    }

    async fn load(&self) {
        let (generation, reference) = {
            let mut inner = self.inner.lock();
            inner.generation += 1;
            inner.state = SlotState::Loading;
            (inner.generation, inner.reference.clone().unwrap_or_default())
        };

        let mut resolution = self.resolver.resolve(&reference, &self.consumer).await;

        if let (Ok(url), Some(probe)) = (&resolution, &self.probe) {
            if let Err(failure) = probe.probe(url).await {
                let error = failure.classify();
                self.resolver
                    .record_render_failure(&reference, &self.consumer, error.clone());
                resolution = Err(error);
            }
        }

        self.apply(generation, resolution);
    }

    fn apply(&self, generation: u64, resolution: Resolution) {
        if !self.is_mounted() {
            debug!(consumer = %self.consumer, "Slot unmounted, dropping resolution");
            return;
        }

        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        let next = match resolution {
            Ok(url) => {
                let reference = inner.reference.clone().unwrap_or_default();
                inner.displayed = Some((reference, url.clone()));
                SlotState::Displaying { url }
            }
            Err(error) => SlotState::Error {
                detail: ErrorDetail::from_error(&error),
            },
        };
        inner.state = next;
    }
}
