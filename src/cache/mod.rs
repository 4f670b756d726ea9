//! Caching layer: manifest cache (TTL + capacity bound) and the link cache
//! with its liveness validator.

pub mod links;
pub mod manifest;

pub use links::{LinkCache, LinkKey, SweepStats};
pub use manifest::{CachedManifest, ManifestCache};
