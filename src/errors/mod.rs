//! Error type definitions for the HLS Bridge application
//!
//! Errors are split by layer: `FetchError` covers upstream transport,
//! `PoolError` the credential pool, and `ResolveError` the composed
//! stream-resolution path. The binary seam uses `anyhow::Result`.

use thiserror::Error;

/// Upstream fetch errors
///
/// A non-200 origin response is *not* a `FetchError`; the fetcher returns it
/// as data so callers decide how to propagate the status. Only transport
/// failures and timeouts surface here. Retry policy is the caller's.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Connect or overall timeout exceeded
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Transport-level failure (DNS, TLS, connection reset, ...)
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Response body could not be read
    #[error("failed to read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// Map a reqwest error for `url` into the matching variant.
    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Credential pool errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// No authenticated profile is available
    #[error("credential pool is empty")]
    Empty,
}

/// Errors raised while resolving a manifest or a full stream request
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Upstream returned a non-200 status; propagated as the proxy response
    #[error("origin returned status {status} for {url}")]
    Origin { status: u16, url: String },

    /// Transport failure below the status layer
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// No session available to call the link-resolution endpoint
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Collaborator endpoint answered with an unusable payload
    #[error("upstream api error: {message}")]
    Api { message: String },
}

impl ResolveError {
    /// HTTP status code to surface on the proxy endpoint.
    pub fn proxy_status(&self) -> u16 {
        match self {
            ResolveError::Origin { status, .. } => *status,
            ResolveError::Fetch(FetchError::Timeout { .. }) => 504,
            _ => 502,
        }
    }
}
