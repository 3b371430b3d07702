//! Downloading external archives.
use std::time::Duration;

use crate::error::FetchError;

/// Largest archive accepted from the network.
const MAX_DOWNLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Overall timeout for a single download.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Source of external archive bytes.
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher: Send + Sync {
    /// Download `url` completely.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] when the URL cannot be read.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Production [`Fetcher`]: `http(s)://` through ureq, `file://` from disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if let Some(path) = url.strip_prefix("file://") {
            return std::fs::read(path).map_err(|e| FetchError::Unreachable {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetchError::UnsupportedScheme(url.to_string()));
        }

        let unreachable = |e: ureq::Error| FetchError::Unreachable {
            url: url.to_string(),
            reason: e.to_string(),
        };
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(DOWNLOAD_TIMEOUT))
            .build()
            .into();
        let mut response = agent.get(url).call().map_err(unreachable)?;
        response
            .body_mut()
            .with_config()
            .limit(MAX_DOWNLOAD_BYTES)
            .read_to_vec()
            .map_err(unreachable)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn reads_file_urls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.tar");
        std::fs::write(&path, b"bytes").unwrap();
        let url = format!("file://{}", path.display());
        assert_eq!(HttpFetcher.fetch(&url).unwrap(), b"bytes");
    }

    #[test]
    fn missing_file_is_unreachable() {
        let err = HttpFetcher
            .fetch("file:///nonexistent/dotrender/archive.tar")
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn other_schemes_are_rejected() {
        let err = HttpFetcher.fetch("ftp://example.com/a.tar").unwrap_err();
        assert_eq!(err, FetchError::UnsupportedScheme("ftp://example.com/a.tar".into()));
        assert!(!err.is_retryable());
    }
}
