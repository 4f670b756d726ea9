//! HLS Bridge - manifest rewriting and caching reverse proxy
//!
//! The crate is organized around a small set of explicitly owned components:
//! an upstream fetcher, a pure playlist rewrite engine, a TTL/capacity bound
//! manifest cache, a round-robin credential pool, a link cache with a
//! liveness validator, and a stream variant formatter. The web layer wires
//! them into an addon-style HTTP surface.

pub mod cache;
pub mod config;
pub mod errors;
pub mod fetch;
pub mod jobs;
pub mod metadata;
pub mod pool;
pub mod resolver;
pub mod rewrite;
pub mod variants;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use errors::{FetchError, PoolError, ResolveError};
