//! Upstream fetcher
//!
//! Thin retrieval layer over `reqwest` with a trait seam so the manifest
//! cache and the link validator can be exercised with a stub in tests.
//! Non-200 responses are returned as data, never raised, and are not
//! retried here.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::debug;

use crate::errors::FetchError;

/// Conventional playlist path extension.
pub const PLAYLIST_EXTENSION: &str = ".m3u8";

/// The two standard HLS MIME types.
pub const HLS_CONTENT_TYPES: [&str; 2] = [
    "application/vnd.apple.mpegurl",
    "application/x-mpegurl",
];

/// Default content type used when the origin does not declare one.
pub const DEFAULT_PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// One fetched upstream body with enough context to classify and rewrite it.
#[derive(Debug, Clone)]
pub struct FetchedBody {
    pub body: Bytes,
    pub status: u16,
    pub content_type: Option<String>,
    /// URL after redirects; relative URIs in the body resolve against this.
    pub final_url: String,
}

impl FetchedBody {
    /// Whether this body should be treated as an HLS playlist.
    ///
    /// Classification uses both the path suffix and the `content-type`
    /// header: either signal is enough. Anything else is an opaque asset
    /// and passes through unmodified.
    pub fn is_playlist(&self) -> bool {
        if is_playlist_url(&self.final_url) {
            return true;
        }
        self.content_type
            .as_deref()
            .map(is_playlist_content_type)
            .unwrap_or(false)
    }
}

/// Check whether a URL's path (query and fragment excluded) names a playlist.
pub fn is_playlist_url(url: &str) -> bool {
    let end = url.find(['?', '#']).unwrap_or(url.len());
    url[..end].to_ascii_lowercase().ends_with(PLAYLIST_EXTENSION)
}

/// Check a `content-type` header value against the standard HLS MIME types.
pub fn is_playlist_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();
    HLS_CONTENT_TYPES.contains(&essence.as_str())
}

/// Fetch trait implemented by [`UpstreamFetcher`] and by test stubs.
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Retrieve a playlist or asset. Non-200 statuses come back in the body.
    async fn fetch(&self, url: &str) -> Result<FetchedBody, FetchError>;

    /// Lightweight existence probe (HEAD) used by the link validator.
    async fn exists(&self, url: &str) -> bool;
}

/// Production fetcher over a shared `reqwest` client.
pub struct UpstreamFetcher {
    client: Client,
}

impl UpstreamFetcher {
    /// Build a fetcher carrying both a connect timeout and an overall
    /// request timeout. Exceeding either is an origin error; retries, if
    /// wanted, are layered above.
    pub fn new(
        connect_timeout: Duration,
        request_timeout: Duration,
        user_agent: &str,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    /// Build a fetcher around an already configured client.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ManifestFetcher for UpstreamFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedBody, FetchError> {
        let response = self
            .client
            .get(url)
            .header("Accept-Encoding", "gzip, deflate")
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let final_url = response.url().to_string();

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Body {
                url: url.to_string(),
                source: e,
            })?;

        debug!(url, status, bytes = body.len(), "fetched upstream body");

        Ok(FetchedBody {
            body,
            status,
            content_type,
            final_url,
        })
    }

    async fn exists(&self, url: &str) -> bool {
        match self.client.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_url_matches_extension_only_in_path() {
        assert!(is_playlist_url("https://cdn.example.com/v/master.m3u8"));
        assert!(is_playlist_url(
            "https://cdn.example.com/v/master.M3U8?token=abc"
        ));
        assert!(!is_playlist_url("https://cdn.example.com/seg-001.ts"));
        assert!(!is_playlist_url(
            "https://proxy.example.com/proxy/manifest?url=https%3A%2F%2Fcdn%2Fa.m3u8"
        ));
    }

    #[test]
    fn content_type_matches_both_standard_mime_types() {
        assert!(is_playlist_content_type("application/vnd.apple.mpegurl"));
        assert!(is_playlist_content_type(
            "application/x-mpegURL; charset=utf-8"
        ));
        assert!(!is_playlist_content_type("video/mp2t"));
    }

    #[test]
    fn body_classification_uses_path_or_header() {
        let playlist_by_path = FetchedBody {
            body: Bytes::from_static(b"#EXTM3U"),
            status: 200,
            content_type: Some("text/plain".into()),
            final_url: "https://cdn.example.com/x/index.m3u8".into(),
        };
        assert!(playlist_by_path.is_playlist());

        let playlist_by_header = FetchedBody {
            body: Bytes::from_static(b"#EXTM3U"),
            status: 200,
            content_type: Some("application/x-mpegurl".into()),
            final_url: "https://cdn.example.com/x/index".into(),
        };
        assert!(playlist_by_header.is_playlist());

        let asset = FetchedBody {
            body: Bytes::from_static(b"\x00\x01"),
            status: 200,
            content_type: Some("application/octet-stream".into()),
            final_url: "https://cdn.example.com/x/key.bin".into(),
        };
        assert!(!asset.is_playlist());
    }
}
