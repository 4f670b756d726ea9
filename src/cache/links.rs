//! Link cache and liveness validator
//!
//! Resolved candidate URLs are cached per (media id, movie/episode flag,
//! season, episode). A scheduled sweep probes every cached URL; an entry is
//! purged only when *every* URL under it is dead, and purging cascades an
//! invalidation into the manifest cache so stale-but-warm rewritten bodies
//! cannot outlive their dead origins.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::{debug, info};

use crate::cache::ManifestCache;
use crate::fetch::ManifestFetcher;

/// Composite resolution key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LinkKey {
    pub media_id: String,
    pub is_movie: bool,
    pub season: u32,
    pub episode: u32,
}

impl LinkKey {
    pub fn movie(media_id: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            is_movie: true,
            season: 0,
            episode: 0,
        }
    }

    pub fn episode(media_id: impl Into<String>, season: u32, episode: u32) -> Self {
        Self {
            media_id: media_id.into(),
            is_movie: false,
            season,
            episode,
        }
    }
}

/// Outcome of one validation sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub probed_urls: usize,
    pub purged_entries: usize,
}

/// Cache of resolved media URLs per composite key.
#[derive(Default)]
pub struct LinkCache {
    entries: Mutex<HashMap<LinkKey, Vec<String>>>,
}

impl LinkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &LinkKey) -> Option<Vec<String>> {
        self.entries
            .lock()
            .expect("link cache lock poisoned")
            .get(key)
            .cloned()
    }

    /// Store the first successful resolution for a key. Empty URL lists are
    /// not worth remembering.
    pub fn insert(&self, key: LinkKey, urls: Vec<String>) {
        if urls.is_empty() {
            return;
        }
        self.entries
            .lock()
            .expect("link cache lock poisoned")
            .insert(key, urls);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("link cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Probe every cached URL; purge keys whose URLs are all dead and
    /// cascade each purged URL into the manifest cache.
    pub async fn sweep(
        &self,
        prober: &dyn ManifestFetcher,
        manifests: &ManifestCache,
    ) -> SweepStats {
        let snapshot: Vec<(LinkKey, Vec<String>)> = {
            let entries = self.entries.lock().expect("link cache lock poisoned");
            entries.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        let mut stats = SweepStats::default();
        let mut dead_keys: Vec<(LinkKey, Vec<String>)> = Vec::new();

        for (key, urls) in snapshot {
            let mut any_alive = false;
            for url in &urls {
                stats.probed_urls += 1;
                if prober.exists(url).await {
                    any_alive = true;
                    break;
                }
            }
            if !any_alive {
                dead_keys.push((key, urls));
            }
        }

        if !dead_keys.is_empty() {
            let mut entries = self.entries.lock().expect("link cache lock poisoned");
            for (key, urls) in &dead_keys {
                // The entry may have been re-resolved while probing; purge
                // only if the URL list is still the one we probed.
                if entries.get(key) == Some(urls) {
                    entries.remove(key);
                    stats.purged_entries += 1;
                    debug!(?key, "link cache entry purged");
                }
            }
        }

        for (_, urls) in &dead_keys {
            for url in urls {
                manifests.invalidate(url);
            }
        }

        info!(
            probed = stats.probed_urls,
            purged = stats.purged_entries,
            remaining = self.len(),
            "link validation sweep finished"
        );
        stats
    }
}
