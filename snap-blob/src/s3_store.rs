use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, Client};
use futures::StreamExt;
use std::env;
use tracing::debug;

use crate::{
    canonical_public_url, BlobError, BlobResult, ListEntry, MediaStore, StoredObject,
    UploadBody, UploadOptions,
};

/// Connection settings for the hosted store's S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3Config {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    /// Project base URL used to build canonical public URLs
    pub public_base_url: String,
}

impl S3Config {
    /// Read `SNAP_S3_*`, `SNAP_BUCKET` and `SNAP_PROJECT_URL`
    pub fn from_env() -> BlobResult<Self> {
        fn get_env(key: &str) -> BlobResult<String> {
            env::var(key).map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        Ok(Self {
            endpoint_url: get_env("SNAP_S3_ENDPOINT")?,
            region: env::var("SNAP_S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id: get_env("SNAP_S3_ACCESS_KEY_ID")?,
            secret_access_key: get_env("SNAP_S3_SECRET_ACCESS_KEY")?,
            bucket: env::var("SNAP_BUCKET").unwrap_or_else(|_| "media".to_string()),
            public_base_url: get_env("SNAP_PROJECT_URL")?,
        })
    }
}

/// Object store backed by the AWS SDK against an S3-compatible endpoint
#[derive(Clone)]
pub struct S3MediaStore {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl S3MediaStore {
    pub async fn new(config: S3Config) -> Self {
        let bucket = config.bucket.clone();
        let public_base_url = config.public_base_url.clone();
        let client = Self::create_client(config).await;
        Self {
            client,
            bucket,
            public_base_url,
        }
    }

    async fn create_client(config: S3Config) -> Client {
        let credentials = Credentials::new(
            config.access_key_id,
            config.secret_access_key,
            None,
            None,
            "snap",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .endpoint_url(config.endpoint_url)
            .load()
            .await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&aws_config)
                .force_path_style(true)
                .build(),
        )
    }

    async fn body_bytes(body: UploadBody) -> BlobResult<Vec<u8>> {
        match body {
            UploadBody::Raw(bytes) => Ok(bytes.to_vec()),
            UploadBody::Blob(mut stream) => {
                let mut data = Vec::new();
                while let Some(chunk) = stream.next().await {
                    data.extend_from_slice(&chunk?);
                }
                Ok(data)
            }
        }
    }

    fn folder_scope(prefix: &str) -> Option<String> {
        let folder = prefix.trim_matches('/');
        if folder.is_empty() {
            None
        } else {
            Some(format!("{}/", folder))
        }
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn upload(&self, key: &str, body: UploadBody, options: &UploadOptions) -> BlobResult<()> {
        let data = Self::body_bytes(body).await?;
        let size = data.len();

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(&options.content_type)
            .cache_control(format!("max-age={}", options.cache_control))
            .content_length(size as i64)
            .body(AwsByteStream::from(data));

        if !options.upsert {
            request = request.if_none_match("*");
        }

        request.send().await.map_err(BlobError::backend)?;
        debug!(key, bytes = size, "Stored object");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<ListEntry>> {
        let scope = Self::folder_scope(prefix);
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .delimiter("/");

            if let Some(scope) = &scope {
                request = request.prefix(scope);
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let result = request.send().await.map_err(BlobError::backend)?;

            for folder in result.common_prefixes() {
                if let Some(prefix) = folder.prefix() {
                    entries.push(ListEntry::Folder {
                        prefix: prefix.trim_end_matches('/').to_string(),
                    });
                }
            }

            for object in result.contents() {
                if let Some(key) = object.key() {
                    entries.push(ListEntry::Object(StoredObject {
                        key: key.to_string(),
                        size_bytes: object.size().map(|s| s.max(0) as u64),
                        content_type: None,
                        last_modified: object.last_modified().map(|dt| dt.secs()),
                    }));
                }
            }

            match result.next_continuation_token() {
                Some(token) if result.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(entries)
    }

    async fn remove(&self, keys: &[String]) -> BlobResult<()> {
        for key in keys {
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
                .map_err(BlobError::backend)?;
        }
        Ok(())
    }

    async fn public_url(&self, key: &str) -> BlobResult<String> {
        if key.is_empty() {
            return Err(BlobError::invalid("empty object key"));
        }
        Ok(canonical_public_url(&self.public_base_url, &self.bucket, key))
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
