use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    is_local_reference, parent_folder, DefaultKeyStrategy, KeyStrategy, ListEntry,
    LocalSource, Materializer, MediaPayload, MediaStore, Transport, UploadBody, UploadError,
    UploadFailure, UploadOptions, UploadPolicy, UploadReceipt, Verification, VerifyMode,
};

/// Uploads local media to the object store under a declarative [`UploadPolicy`]
pub struct MediaUploader {
    store: Arc<dyn MediaStore>,
    materializer: Arc<Materializer>,
    keys: Arc<dyn KeyStrategy>,
    policy: UploadPolicy,
}

impl MediaUploader {
    pub fn new<S, L>(store: S, source: L, policy: UploadPolicy) -> Self
    where
        S: MediaStore + 'static,
        L: LocalSource + 'static,
    {
        Self {
            store: Arc::new(store),
            materializer: Arc::new(Materializer::new(Arc::new(source))),
            keys: Arc::new(DefaultKeyStrategy),
            policy,
        }
    }

    pub fn with_key_strategy<K: KeyStrategy + 'static>(mut self, keys: K) -> Self {
        self.keys = Arc::new(keys);
        self
    }

    /// Same store and source, different policy
    pub fn with_policy(&self, policy: UploadPolicy) -> Self {
        Self {
            store: Arc::clone(&self.store),
            materializer: Arc::clone(&self.materializer),
            keys: Arc::clone(&self.keys),
            policy,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Upload `local_ref` for `user_id`, tagging the key with `purpose`
    pub async fn upload(
        &self,
        local_ref: &str,
        user_id: &str,
        purpose: &str,
    ) -> Result<UploadReceipt, UploadFailure> {
        match self.run(local_ref, user_id, purpose).await {
            Ok(receipt) => {
                info!(
                    key = %receipt.key,
                    bytes = receipt.size_bytes,
                    transport = ?receipt.transport,
                    "Upload complete"
                );
                Ok(receipt)
            }
            Err(error) => {
                warn!(local_ref, code = error.code(), error = %error, "Upload failed");
                Err(UploadFailure::new(error, local_ref))
            }
        }
    }

    async fn run(
        &self,
        local_ref: &str,
        user_id: &str,
        purpose: &str,
    ) -> Result<UploadReceipt, UploadError> {
        Self::validate(local_ref, user_id, purpose)?;

        if self.policy.preflight {
            let size = self.materializer.preflight(local_ref).await?;
            self.check_size(size)?;
        }

        let payload = self.materializer.materialize(local_ref, &self.policy.reads).await?;
        self.check_size(payload.len())?;

        let key = self.keys.object_key(user_id, purpose, self.policy.random_suffix);
        let options = UploadOptions::new(payload.content_type.clone())
            .with_cache_control(self.policy.cache_control_secs);

        let mut transports = self.policy.transports.iter().copied();
        let mut transport = transports.next().unwrap_or(Transport::Blob);
        self.send(&key, transport, &payload, &options).await?;

        let verification = match self.policy.verify {
            VerifyMode::Skip => Verification::Skipped,
            VerifyMode::Confirm => self.verify(&key).await,
            VerifyMode::Repair => {
                let mut outcome = self.verify(&key).await;
                let mut repaired = false;
                while outcome == Verification::ZeroByte {
                    let Some(next) = transports.next() else {
                        break;
                    };
                    warn!(key = %key, from = ?transport, to = ?next, "Server reports zero bytes, retrying upload");

                    if let Err(e) = self.store.remove(std::slice::from_ref(&key)).await {
                        warn!(key = %key, error = %e, "Could not remove zero-byte object before retry");
                    }
                    let retry_options = options.clone().with_upsert(true);
                    self.send(&key, next, &payload, &retry_options).await?;
                    transport = next;
                    repaired = true;
                    outcome = self.verify(&key).await;
                }
                match outcome {
                    Verification::Confirmed { server_size } if repaired => {
                        Verification::Repaired { server_size }
                    }
                    other => other,
                }
            }
        };

        let public_url = self
            .store
            .public_url(&key)
            .await
            .map_err(|_| UploadError::PublicUrlUnavailable { key: key.clone() })?;

        Ok(UploadReceipt::new(key, public_url, payload.len())
            .with_content_type(payload.content_type.clone())
            .with_read(payload.method)
            .with_transport(transport)
            .with_verification(verification))
    }

    fn validate(local_ref: &str, user_id: &str, purpose: &str) -> Result<(), UploadError> {
        let missing: Vec<&str> = [("local_ref", local_ref), ("user_id", user_id), ("purpose", purpose)]
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(UploadError::MissingParameters {
                missing: missing.join(", "),
            });
        }
        if !is_local_reference(local_ref) {
            return Err(UploadError::InvalidUriScheme {
                uri: local_ref.to_string(),
            });
        }
        Ok(())
    }

    fn check_size(&self, size: u64) -> Result<(), UploadError> {
        match self.policy.max_bytes {
            Some(max) if size > max => Err(UploadError::SizeExceeded { size, max }),
            _ => Ok(()),
        }
    }

    async fn send(
        &self,
        key: &str,
        transport: Transport,
        payload: &MediaPayload,
        options: &UploadOptions,
    ) -> Result<(), UploadError> {
        let body = match transport {
            Transport::Blob => UploadBody::blob(payload.bytes.clone()),
            Transport::RawBuffer => UploadBody::raw(payload.bytes.clone()),
        };
        self.store
            .upload(key, body, options)
            .await
            .map_err(UploadError::transport)
    }

    /// List the destination folder and look for the uploaded object
    async fn verify(&self, key: &str) -> Verification {
        let listing = match self.store.list(parent_folder(key)).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!(key, error = %e, "Could not verify upload");
                return Verification::Unavailable {
                    reason: e.to_string(),
                };
            }
        };

        let found = listing.into_iter().find_map(|entry| match entry {
            ListEntry::Object(object) if object.key == key => Some(object),
            _ => None,
        });

        match found {
            Some(object) if object.size_bytes == Some(0) => {
                warn!(key, "Uploaded object is zero bytes on the server");
                Verification::ZeroByte
            }
            Some(object) => Verification::Confirmed {
                server_size: object.size_bytes,
            },
            None => {
                warn!(key, "Uploaded object missing from folder listing");
                Verification::Missing
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryMediaStore, MemorySource};

    fn uploader(store: &MemoryMediaStore, source: MemorySource, policy: UploadPolicy) -> MediaUploader {
        MediaUploader::new(store.clone(), source, policy)
    }

    #[tokio::test]
    async fn missing_parameters_are_named() {
        let store = MemoryMediaStore::default();
        let up = uploader(&store, MemorySource::new(), UploadPolicy::simple());

        let failure = up.upload("file:///a.jpg", "", " ").await.unwrap_err();
        match failure.error {
            UploadError::MissingParameters { missing } => assert_eq!(missing, "user_id, purpose"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(store.calls().uploads.is_empty());
    }

    #[tokio::test]
    async fn remote_reference_is_an_invalid_scheme() {
        let store = MemoryMediaStore::default();
        let up = uploader(&store, MemorySource::new(), UploadPolicy::robust());

        let failure = up.upload("https://cdn/a.jpg", "userA", "snap").await.unwrap_err();
        assert!(matches!(failure.error, UploadError::InvalidUriScheme { .. }));
    }

    #[tokio::test]
    async fn robust_rejects_files_over_the_ceiling() {
        let store = MemoryMediaStore::default();
        let source = MemorySource::new().with_file("file:///big.jpg", &[1u8; 64]);
        let up = uploader(&store, source, UploadPolicy::robust().with_max_bytes(32));

        let failure = up.upload("file:///big.jpg", "userA", "snap").await.unwrap_err();
        assert!(matches!(failure.error, UploadError::SizeExceeded { size: 64, max: 32 }));
        assert!(store.calls().uploads.is_empty());
    }

    #[tokio::test]
    async fn transport_error_is_surfaced_without_retry() {
        let store = MemoryMediaStore::default();
        store.fail_uploads(true);
        let source = MemorySource::new().with_file("file:///a.jpg", b"abc");
        let up = uploader(&store, source, UploadPolicy::robust());

        let failure = up.upload("file:///a.jpg", "userA", "snap").await.unwrap_err();
        assert!(matches!(failure.error, UploadError::Transport { .. }));
        assert_eq!(store.calls().uploads.len(), 1);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn failed_verification_is_a_warning_not_a_failure() {
        let store = MemoryMediaStore::default();
        store.fail_listing(true);
        let source = MemorySource::new().with_file("file:///a.jpg", b"abc");
        let up = uploader(&store, source, UploadPolicy::robust());

        let receipt = up.upload("file:///a.jpg", "userA", "snap").await.unwrap();
        assert!(matches!(receipt.verification, Verification::Unavailable { .. }));
        assert!(logs_contain("Could not verify upload"));
    }

    #[tokio::test]
    async fn simple_policy_never_lists() {
        let store = MemoryMediaStore::default();
        let source = MemorySource::new().with_file("file:///a.jpg", b"abc");
        let up = uploader(&store, source, UploadPolicy::simple());

        let receipt = up.upload("file:///a.jpg", "userA", "snap").await.unwrap();
        assert_eq!(receipt.verification, Verification::Skipped);
        assert_eq!(store.calls().lists, 0);
        assert!(receipt.key.starts_with("userA/snap_"));
        assert_eq!(
            receipt.public_url,
            format!("https://memory.local/storage/v1/object/public/media/{}", receipt.key)
        );
    }
}
