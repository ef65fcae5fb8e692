use async_trait::async_trait;
use reqwest::header::CONTENT_LENGTH;
use std::time::Duration;

use crate::ResolveError;

/// Why a resolved URL did not render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub status: Option<u16>,
    pub content_length: Option<u64>,
    pub message: String,
}

impl RenderFailure {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            status: None,
            content_length: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_content_length(mut self, length: u64) -> Self {
        self.content_length = Some(length);
        self
    }

    /// Status codes win over the body length; an empty body only means an
    /// empty file when the server otherwise answered successfully.
    pub fn classify(&self) -> ResolveError {
        match self.status {
            Some(401) | Some(403) => ResolveError::Forbidden,
            Some(404) => ResolveError::NotFound,
            Some(status) if !(200..300).contains(&status) => {
                ResolveError::Remote(self.message.clone())
            }
            _ if self.content_length == Some(0) => ResolveError::EmptyFile,
            _ => ResolveError::Remote(self.message.clone()),
        }
    }
}

/// Checks that a resolved URL actually serves an image
#[async_trait]
pub trait MediaProbe: Send + Sync {
    async fn probe(&self, url: &str) -> Result<(), RenderFailure>;
}

/// HEAD request against the resolved URL
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    timeout: Duration,
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl MediaProbe for HttpProbe {
    async fn probe(&self, url: &str) -> Result<(), RenderFailure> {
        let response = self
            .client
            .head(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RenderFailure::new(format!("request failed: {}", e)))?;

        let status = response.status();
        let content_length = response
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        if !status.is_success() {
            let mut failure = RenderFailure::new(format!("server responded {}", status))
                .with_status(status.as_u16());
            failure.content_length = content_length;
            return Err(failure);
        }
        if content_length == Some(0) {
            return Err(RenderFailure::new("server reports Content-Length 0")
                .with_status(status.as_u16())
                .with_content_length(0));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(
            RenderFailure::new("x").with_status(200).with_content_length(0).classify(),
            ResolveError::EmptyFile
        );
        assert_eq!(RenderFailure::new("x").with_status(403).classify(), ResolveError::Forbidden);
        assert_eq!(RenderFailure::new("x").with_status(404).classify(), ResolveError::NotFound);
        assert_eq!(
            RenderFailure::new("timeout").classify(),
            ResolveError::Remote("timeout".to_string())
        );
    }

    #[test]
    fn status_beats_empty_body() {
        let empty = |status| {
            RenderFailure::new("x")
                .with_status(status)
                .with_content_length(0)
                .classify()
        };
        assert_eq!(empty(404), ResolveError::NotFound);
        assert_eq!(empty(403), ResolveError::Forbidden);
        assert_eq!(empty(401), ResolveError::Forbidden);
        assert_eq!(empty(500), ResolveError::Remote("x".to_string()));
        assert_eq!(
            RenderFailure::new("x").with_content_length(0).classify(),
            ResolveError::EmptyFile
        );
    }
}
