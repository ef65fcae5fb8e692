use std::io::Write;

use snap_blob::{
    FsSource, MediaUploader, MemoryMediaStore, MemorySource, ReadStrategy, Transport,
    UploadError, UploadPolicy, Verification,
};

fn all_policies() -> Vec<(&'static str, UploadPolicy)> {
    vec![
        ("simple", UploadPolicy::simple()),
        ("direct", UploadPolicy::direct()),
        ("robust", UploadPolicy::robust()),
    ]
}

/// Zero-byte local files never reach the store, whatever the policy
#[tokio::test]
async fn test_zero_byte_source_never_uploads() {
    for (name, policy) in all_policies() {
        let store = MemoryMediaStore::default();
        let source = MemorySource::new().with_file("file:///tmp/empty.jpg", b"");
        let uploader = MediaUploader::new(store.clone(), source, policy);

        let failure = uploader
            .upload("file:///tmp/empty.jpg", "userA", "snap")
            .await
            .unwrap_err();

        assert!(
            matches!(failure.error, UploadError::SourceEmpty | UploadError::BlobEmpty),
            "{name}: unexpected {:?}",
            failure.error
        );
        assert_eq!(failure.local_ref, "file:///tmp/empty.jpg");
        assert!(store.calls().uploads.is_empty(), "{name} issued an upload");
    }
}

#[tokio::test]
async fn test_simple_upload_of_empty_file_reports_blob_empty() {
    let store = MemoryMediaStore::default();
    let source = MemorySource::new().with_file("file:///tmp/a.jpg", b"");
    let uploader = MediaUploader::new(store, source, UploadPolicy::simple());

    let failure = uploader.upload("file:///tmp/a.jpg", "userA", "snap").await.unwrap_err();

    assert!(matches!(failure.error, UploadError::BlobEmpty));
    assert_eq!(failure.to_string(), "Blob is empty");
}

#[tokio::test]
async fn test_robust_rejects_empty_source_before_reading() {
    let store = MemoryMediaStore::default();
    let source = MemorySource::new().with_file("file:///tmp/a.jpg", b"");
    let uploader = MediaUploader::new(store, source, UploadPolicy::robust());

    let failure = uploader.upload("file:///tmp/a.jpg", "userA", "snap").await.unwrap_err();
    assert!(matches!(failure.error, UploadError::SourceEmpty));
}

/// Server lists the first upload as zero bytes: delete, retry over the raw
/// buffer, report the original payload size
#[tokio::test]
async fn test_robust_repairs_zero_byte_object_with_raw_buffer() {
    let image = vec![0xabu8; 5 * 1024 * 1024];
    let store = MemoryMediaStore::default();
    store.report_zero_size_for_next(1);
    let source = MemorySource::new().with_file("file:///tmp/big.jpg", &image);
    let uploader = MediaUploader::new(store.clone(), source, UploadPolicy::robust());

    let receipt = uploader.upload("file:///tmp/big.jpg", "userA", "snap").await.unwrap();

    assert_eq!(receipt.size_bytes, image.len() as u64);
    assert_eq!(receipt.transport, Transport::RawBuffer);
    assert_eq!(
        receipt.verification,
        Verification::Repaired {
            server_size: Some(image.len() as u64)
        }
    );

    let calls = store.calls();
    assert_eq!(
        calls.uploads,
        vec![
            (receipt.key.clone(), Transport::Blob),
            (receipt.key.clone(), Transport::RawBuffer),
        ]
    );
    assert_eq!(calls.removed, vec![receipt.key.clone()]);
    assert_eq!(store.object_len(&receipt.key), Some(image.len() as u64));
}

#[tokio::test]
async fn test_robust_keeps_success_when_retry_still_reports_zero() {
    let store = MemoryMediaStore::default();
    store.report_zero_size_for_next(2);
    let source = MemorySource::new().with_file("file:///tmp/a.jpg", b"abc");
    let uploader = MediaUploader::new(store.clone(), source, UploadPolicy::robust());

    let receipt = uploader.upload("file:///tmp/a.jpg", "userA", "snap").await.unwrap();

    assert_eq!(receipt.verification, Verification::ZeroByte);
    assert_eq!(receipt.size_bytes, 3);
    assert_eq!(store.calls().uploads.len(), 2);
}

#[tokio::test]
async fn test_direct_flags_zero_byte_without_retry() {
    let store = MemoryMediaStore::default();
    store.report_zero_size_for_next(1);
    let source = MemorySource::new().with_file("file:///tmp/a.jpg", b"abc");
    let uploader = MediaUploader::new(store.clone(), source, UploadPolicy::direct());

    let receipt = uploader.upload("file:///tmp/a.jpg", "userA", "chat").await.unwrap();

    assert_eq!(receipt.read, ReadStrategy::Base64);
    assert_eq!(receipt.verification, Verification::ZeroByte);
    assert_eq!(store.calls().uploads.len(), 1);
    assert!(store.calls().removed.is_empty());
}

#[tokio::test]
async fn test_robust_falls_back_to_base64_when_fetch_truncates() {
    let store = MemoryMediaStore::default();
    let source = MemorySource::new()
        .with_file("file:///tmp/a.jpg", b"jpeg-bytes")
        .truncate_fetch();
    let uploader = MediaUploader::new(store.clone(), source, UploadPolicy::robust());

    let receipt = uploader.upload("file:///tmp/a.jpg", "userA", "memory").await.unwrap();

    assert_eq!(receipt.read, ReadStrategy::Base64);
    assert_eq!(store.object_len(&receipt.key), Some(10));
}

#[tokio::test]
async fn test_simple_fails_when_fetch_truncates() {
    let store = MemoryMediaStore::default();
    let source = MemorySource::new()
        .with_file("file:///tmp/a.jpg", b"jpeg-bytes")
        .truncate_fetch();
    let uploader = MediaUploader::new(store.clone(), source, UploadPolicy::simple());

    let failure = uploader.upload("file:///tmp/a.jpg", "userA", "snap").await.unwrap_err();
    assert!(matches!(failure.error, UploadError::BlobEmpty));
    assert!(store.calls().uploads.is_empty());
}

#[tokio::test]
async fn test_policies_share_store_through_with_policy() {
    let store = MemoryMediaStore::default();
    let source = MemorySource::new().with_file("file:///tmp/a.jpg", b"abc");
    let robust = MediaUploader::new(store.clone(), source, UploadPolicy::robust());
    let simple = robust.with_policy(UploadPolicy::simple());

    let first = robust.upload("file:///tmp/a.jpg", "userA", "snap").await.unwrap();
    let second = simple.upload("file:///tmp/a.jpg", "userB", "snap").await.unwrap();

    assert!(store.contains(&first.key));
    assert!(store.contains(&second.key));
    assert!(second.key.starts_with("userB/snap_"));
}

#[tokio::test]
async fn test_robust_upload_from_disk() {
    let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
    file.write_all(&[0x89, b'P', b'N', b'G', 1, 2, 3]).unwrap();
    let uri = format!("file://{}", file.path().display());

    let store = MemoryMediaStore::default();
    let uploader = MediaUploader::new(store.clone(), FsSource::new(), UploadPolicy::robust());

    let receipt = uploader.upload(&uri, "userA", "story").await.unwrap();

    assert_eq!(receipt.size_bytes, 7);
    assert_eq!(receipt.content_type, "image/png");
    assert_eq!(receipt.verification, Verification::Confirmed { server_size: Some(7) });
}

#[tokio::test]
async fn test_missing_disk_file_is_source_not_found() {
    let store = MemoryMediaStore::default();
    let uploader = MediaUploader::new(store, FsSource::new(), UploadPolicy::robust());

    let failure = uploader
        .upload("file:///no/such/dir/photo.jpg", "userA", "snap")
        .await
        .unwrap_err();
    assert!(matches!(failure.error, UploadError::SourceNotFound { .. }));
}
