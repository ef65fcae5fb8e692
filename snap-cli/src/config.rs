use anyhow::{anyhow, Context, Result};
use std::env;

use snap_blob::S3Config;

/// Runtime configuration, read from the environment (and `.env`)
#[derive(Debug, Clone)]
pub struct SnapConfig {
    pub project_url: String,
    pub api_key: String,
    pub s3: S3Config,
    pub max_upload_bytes: Option<u64>,
}

impl SnapConfig {
    pub fn from_env() -> Result<Self> {
        let project_url = required("SNAP_PROJECT_URL")?;
        let api_key = required("SNAP_API_KEY")?;
        let s3 = S3Config::from_env().context("object store configuration")?;
        let max_upload_bytes = parse_max_upload_mb(env::var("SNAP_MAX_UPLOAD_MB").ok().as_deref())?;

        Ok(Self {
            project_url,
            api_key,
            s3,
            max_upload_bytes,
        })
    }
}

fn required(key: &str) -> Result<String> {
    env::var(key).map_err(|_| anyhow!("{} environment variable required", key))
}

pub fn parse_max_upload_mb(raw: Option<&str>) -> Result<Option<u64>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let mb: u64 = raw
        .parse()
        .with_context(|| format!("SNAP_MAX_UPLOAD_MB must be a whole number, got {:?}", raw))?;
    let bytes = mb
        .checked_mul(1024 * 1024)
        .with_context(|| format!("SNAP_MAX_UPLOAD_MB is too large: {}", mb))?;
    Ok(Some(bytes))
}
