//! Remote media fetching for the `SQLite` record store.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default timeout for a media download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default upper bound on a downloaded media body (32 MiB).
pub const DEFAULT_MAX_MEDIA_BYTES: u64 = 32 * 1024 * 1024;

/// A downloaded media file.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    /// Raw file bytes.
    pub bytes: Vec<u8>,
    /// Hex-encoded SHA-256 of the bytes.
    pub sha256: String,
    /// Content type reported by the server.
    pub mime_type: Option<String>,
    /// File name derived from the URL.
    pub file_name: String,
}

/// Downloads media over HTTP and optionally stores it on disk.
pub struct MediaFetcher {
    client: reqwest::blocking::Client,
    media_dir: Option<PathBuf>,
    max_bytes: u64,
}

impl MediaFetcher {
    /// Creates a fetcher with the given request timeout.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|err| {
                tracing::warn!("Failed to build media HTTP client: {err}");
                reqwest::blocking::Client::new()
            });
        Self {
            client,
            media_dir: None,
            max_bytes: DEFAULT_MAX_MEDIA_BYTES,
        }
    }

    /// Rejects bodies larger than `max_bytes`.
    #[must_use]
    pub const fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Returns the body size limit.
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Stores downloaded files under `dir`.
    #[must_use]
    pub fn with_media_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.media_dir = Some(dir.into());
        self
    }

    /// Returns the media directory, if files are kept on disk.
    #[must_use]
    pub fn media_dir(&self) -> Option<&Path> {
        self.media_dir.as_deref()
    }

    /// Downloads a URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] on network failure, a non-success
    /// status or a body over the size limit.
    pub fn fetch(&self, url: &str) -> Result<FetchedMedia> {
        let response = self.client.get(url).send().map_err(|e| Error::OperationFailed {
            operation: "media_fetch".to_string(),
            cause: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(Error::OperationFailed {
                operation: "media_fetch".to_string(),
                cause: format!("{url} returned status: {}", response.status()),
            });
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string);

        if let Some(length) = response.content_length()
            && length > self.max_bytes
        {
            return Err(too_large(url, self.max_bytes));
        }
        let bytes = read_capped(response, self.max_bytes).map_err(|e| match e {
            Error::InvalidInput(_) => too_large(url, self.max_bytes),
            other => other,
        })?;

        Ok(FetchedMedia {
            sha256: content_hash(&bytes),
            mime_type,
            file_name: file_name_from_url(url),
            bytes,
        })
    }

    /// Writes a fetched file into the media directory, named by its hash.
    ///
    /// Returns `None` when no media directory is configured.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the file cannot be written.
    pub fn persist(&self, media: &FetchedMedia) -> Result<Option<PathBuf>> {
        let Some(dir) = &self.media_dir else {
            return Ok(None);
        };
        std::fs::create_dir_all(dir).map_err(|e| Error::OperationFailed {
            operation: "create_media_dir".to_string(),
            cause: e.to_string(),
        })?;

        let extension = Path::new(&media.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let path = dir.join(format!("{}{extension}", media.sha256));
        if !path.exists() {
            std::fs::write(&path, &media.bytes).map_err(|e| Error::OperationFailed {
                operation: "write_media_file".to_string(),
                cause: e.to_string(),
            })?;
        }
        Ok(Some(path))
    }
}

impl Default for MediaFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

/// Reads at most `max_bytes` from `reader`.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] when the input is longer than the limit and
/// [`Error::OperationFailed`] when reading fails.
pub fn read_capped<R: Read>(reader: R, max_bytes: u64) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take(max_bytes.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|e| Error::OperationFailed {
            operation: "media_read".to_string(),
            cause: e.to_string(),
        })?;
    if bytes.len() as u64 > max_bytes {
        return Err(Error::InvalidInput(format!(
            "body exceeds {max_bytes} bytes"
        )));
    }
    Ok(bytes)
}

fn too_large(url: &str, max_bytes: u64) -> Error {
    Error::OperationFailed {
        operation: "media_fetch".to_string(),
        cause: format!("{url} is larger than the {max_bytes} byte limit"),
    }
}

/// Computes the hex-encoded SHA-256 of a byte slice.
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Derives a file name from the last path segment of a URL.
#[must_use]
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| {
            rest.split_once('/').map_or("", |(_, path)| path)
        });
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("media")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_content_hash_is_stable() {
        assert_eq!(
            content_hash(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test_case("https://example.com/img/photo.jpg", "photo.jpg" ; "plain path")]
    #[test_case("https://example.com/img/photo.jpg?w=300", "photo.jpg" ; "query string")]
    #[test_case("https://example.com/", "media" ; "no path")]
    fn test_file_name_from_url(url: &str, expected: &str) {
        assert_eq!(file_name_from_url(url), expected);
    }

    #[test]
    fn test_read_capped_accepts_body_at_limit() {
        assert_eq!(read_capped(&b"12345"[..], 5).unwrap(), b"12345");
    }

    #[test]
    fn test_read_capped_rejects_larger_body() {
        let err = read_capped(&b"123456"[..], 5).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_default_limit() {
        let fetcher = MediaFetcher::default();
        assert_eq!(fetcher.max_bytes(), DEFAULT_MAX_MEDIA_BYTES);
        assert_eq!(fetcher.with_max_bytes(10).max_bytes(), 10);
    }

    #[test]
    fn test_persist_without_dir_is_noop() {
        let fetcher = MediaFetcher::default();
        let media = FetchedMedia {
            bytes: b"x".to_vec(),
            sha256: content_hash(b"x"),
            mime_type: None,
            file_name: "x.png".to_string(),
        };
        assert!(fetcher.persist(&media).unwrap().is_none());
    }

    #[test]
    fn test_persist_writes_hash_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MediaFetcher::default().with_media_dir(dir.path());
        let media = FetchedMedia {
            bytes: b"x".to_vec(),
            sha256: content_hash(b"x"),
            mime_type: Some("image/png".to_string()),
            file_name: "x.png".to_string(),
        };
        let path = fetcher.persist(&media).unwrap().unwrap();
        assert!(path.ends_with(format!("{}.png", media.sha256)));
        assert_eq!(std::fs::read(path).unwrap(), b"x");
    }
}
