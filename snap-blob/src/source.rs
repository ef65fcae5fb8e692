use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use std::io;
use std::path::PathBuf;

use crate::LOCAL_FILE_SCHEME;

/// Access to files on the capturing device
#[async_trait]
pub trait LocalSource: Send + Sync {
    /// Size of the file, or `None` if it does not exist
    async fn stat(&self, uri: &str) -> io::Result<Option<u64>>;

    /// Primary read path
    async fn fetch(&self, uri: &str) -> io::Result<Bytes>;

    /// Fallback read path: the whole file, base64-encoded
    async fn read_base64(&self, uri: &str) -> io::Result<String>;
}

/// Whether `uri` is a reference a [`LocalSource`] can read
pub fn is_local_reference(uri: &str) -> bool {
    uri.starts_with(LOCAL_FILE_SCHEME) || uri.starts_with('/')
}

/// Local filesystem source for `file://` URIs and absolute paths
#[derive(Debug, Clone, Default)]
pub struct FsSource;

impl FsSource {
    pub fn new() -> Self {
        Self
    }

    fn path_of(uri: &str) -> io::Result<PathBuf> {
        if uri.starts_with(LOCAL_FILE_SCHEME) {
            let parsed = url::Url::parse(uri)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
            parsed.to_file_path().map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, format!("not a file path: {}", uri))
            })
        } else {
            Ok(PathBuf::from(uri))
        }
    }
}

#[async_trait]
impl LocalSource for FsSource {
    async fn stat(&self, uri: &str) -> io::Result<Option<u64>> {
        let path = Self::path_of(uri)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(meta.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn fetch(&self, uri: &str) -> io::Result<Bytes> {
        let path = Self::path_of(uri)?;
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn read_base64(&self, uri: &str) -> io::Result<String> {
        let path = Self::path_of(uri)?;
        let data = tokio::fs::read(&path).await?;
        Ok(base64::engine::general_purpose::STANDARD.encode(data))
    }
}
