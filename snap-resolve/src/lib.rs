//! # snap-resolve: media references to displayable URLs
//!
//! Records persist a media reference string. Readers turn it into
//! something an image view can load through a [`UrlResolver`], and track
//! the per-slot loading/error/retry state with a [`MediaSlot`].
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use snap_blob::MemoryMediaStore;
//! use snap_resolve::{MediaSlot, ResolverCache, UrlResolver};
//!
//! # async fn run() {
//! // one cache per signed-in session
//! let cache = Arc::new(ResolverCache::new());
//! let resolver = Arc::new(UrlResolver::new(MemoryMediaStore::default(), cache.clone()));
//!
//! let slot = MediaSlot::new(resolver, "viewer-1");
//! slot.show("userA/snap_1.jpg").await;
//!
//! // on logout
//! cache.clear();
//! # }
//! ```

mod cache;
mod error;
mod probe;
mod resolver;
mod slot;

pub use cache::{CacheKey, CacheLimits, Resolution, ResolverCache};
pub use error::ResolveError;
pub use probe::{HttpProbe, MediaProbe, RenderFailure};
pub use resolver::UrlResolver;
pub use slot::{ErrorDetail, MediaSlot, SlotState, MAX_RETRIES};
