use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use snap_blob::{FsSource, MediaStore, MediaUploader, S3MediaStore, UploadPolicy};
use snap_records::{ExpirySweeper, PostgrestRecords, RecordStore};
use snap_repair::RepairToolkit;
use snap_resolve::{HttpProbe, MediaProbe, ResolverCache, UrlResolver};

use crate::config::SnapConfig;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn media_store(config: &SnapConfig) -> Arc<dyn MediaStore> {
    Arc::new(S3MediaStore::new(config.s3.clone()).await)
}

fn records(config: &SnapConfig) -> Result<Arc<dyn RecordStore>> {
    let records = PostgrestRecords::new(&config.project_url, &config.api_key)?;
    Ok(Arc::new(records))
}

/// `file://` URI for a path given on the command line
pub fn local_reference(file: &Path) -> Result<String> {
    let absolute = std::fs::canonicalize(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let uri = url::Url::from_file_path(&absolute)
        .map_err(|_| anyhow!("cannot express {} as a file URI", absolute.display()))?;
    Ok(uri.to_string())
}

pub async fn upload(
    config: &SnapConfig,
    file: &Path,
    user: &str,
    purpose: &str,
    policy: &str,
) -> Result<()> {
    let mut policy =
        UploadPolicy::named(policy).ok_or_else(|| anyhow!("unknown upload policy: {}", policy))?;
    if let Some(max) = config.max_upload_bytes {
        policy = policy.with_max_bytes(max);
    }

    let local_ref = local_reference(file)?;
    let store = S3MediaStore::new(config.s3.clone()).await;
    let uploader = MediaUploader::new(store, FsSource::new(), policy);

    match uploader.upload(&local_ref, user, purpose).await {
        Ok(receipt) => print_json(&receipt),
        Err(failure) => {
            print_json(&json!({
                "success": false,
                "error": failure.error.code(),
                "message": failure.to_string(),
                "local_ref": failure.local_ref,
            }))?;
            bail!("upload failed: {}", failure)
        }
    }
}

pub async fn resolve(config: &SnapConfig, reference: &str, consumer: &str, probe: bool) -> Result<()> {
    let resolver = UrlResolver::from_shared(media_store(config).await, Arc::new(ResolverCache::new()));

    let mut resolution = resolver.resolve(reference, consumer).await;
    if probe {
        if let Ok(url) = &resolution {
            if let Err(failure) = HttpProbe::new().probe(url).await {
                let error = failure.classify();
                resolver.record_render_failure(reference, consumer, error.clone());
                resolution = Err(error);
            }
        }
    }

    match resolution {
        Ok(url) => print_json(&json!({ "reference": reference, "url": url })),
        Err(error) => print_json(&json!({
            "reference": reference,
            "error": error.code(),
            "message": error.to_string(),
        })),
    }
}

fn toolkit(config: &SnapConfig, store: Arc<dyn MediaStore>) -> Result<RepairToolkit> {
    Ok(RepairToolkit::new(records(config)?, store))
}

pub async fn scan(config: &SnapConfig) -> Result<()> {
    let toolkit = toolkit(config, media_store(config).await)?;
    let diagnostics = toolkit.diagnose().await?;
    info!(issues = diagnostics.issue_count(), "Scan complete");
    print_json(&diagnostics)
}

pub async fn cleanup(config: &SnapConfig, dry_run: bool) -> Result<()> {
    let toolkit = toolkit(config, media_store(config).await)?;
    if dry_run {
        let diagnostics = toolkit.diagnose().await?;
        return print_json(&json!({
            "dry_run": true,
            "would_mark": diagnostics.messages.bad,
            "would_delete": diagnostics.storage.empty_keys,
            "diagnostics": diagnostics,
        }));
    }

    let report = toolkit.run_full_cleanup().await?;
    print_json(&report)
}

pub async fn sweep(config: &SnapConfig, once: bool) -> Result<()> {
    let sweeper = ExpirySweeper::new(records(config)?);
    if once {
        let expired = sweeper.run_once().await?;
        return print_json(&json!({ "expired": expired }));
    }

    tokio::select! {
        _ = sweeper.start() => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for shutdown signal")?;
            info!("Shutting down expiry sweeper");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_become_file_uris() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let uri = local_reference(file.path()).unwrap();
        assert!(uri.starts_with("file:///"));
        assert!(uri.ends_with(&file.path().file_name().unwrap().to_string_lossy().to_string()));
    }

    #[test]
    fn missing_files_are_reported() {
        let err = local_reference(Path::new("/definitely/not/here.jpg")).unwrap_err();
        assert!(err.to_string().contains("cannot read"));
    }
}
