//! Manifest cache
//!
//! Keyed store from source URL to rewritten content behind a get-or-compute
//! interface composing the fetcher and the rewrite engine. Entries expire
//! after a TTL; before an insertion would exceed capacity, a batch of the
//! least-recently-used entries is evicted. Eviction is best-effort
//! housekeeping and never fails the caller.
//!
//! Two concurrent requests for the same uncached URL may both fetch
//! upstream; no single-flight coalescing is provided.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::errors::ResolveError;
use crate::fetch::{DEFAULT_PLAYLIST_CONTENT_TYPE, ManifestFetcher};
use crate::rewrite::rewrite_playlist;

/// A resolved manifest (or opaque asset) ready to serve.
#[derive(Debug, Clone)]
pub struct CachedManifest {
    pub content: Bytes,
    pub content_type: String,
}

#[derive(Debug, Clone)]
struct Entry {
    content: Bytes,
    content_type: String,
    stored_at: Instant,
    last_access: Instant,
}

/// TTL + capacity bound cache over fetch-and-rewrite.
pub struct ManifestCache {
    fetcher: Arc<dyn ManifestFetcher>,
    /// Proxy base URL baked into rewritten bodies.
    proxy_base: String,
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

impl ManifestCache {
    pub fn new(
        fetcher: Arc<dyn ManifestFetcher>,
        proxy_base: String,
        ttl: Duration,
        capacity: usize,
    ) -> Self {
        Self {
            fetcher,
            proxy_base,
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a source URL to rewritten content, serving from cache when
    /// the entry is younger than the TTL. A TTL of zero always refetches
    /// but still exercises the write path.
    pub async fn resolve(&self, url: &str) -> Result<CachedManifest, ResolveError> {
        if let Some(hit) = self.lookup(url) {
            debug!(url, "manifest cache hit");
            return Ok(hit);
        }

        let fetched = self.fetcher.fetch(url).await?;
        if fetched.status != 200 {
            return Err(ResolveError::Origin {
                status: fetched.status,
                url: url.to_string(),
            });
        }

        let content_type = fetched
            .content_type
            .clone()
            .unwrap_or_else(|| DEFAULT_PLAYLIST_CONTENT_TYPE.to_string());

        let content = if fetched.is_playlist() {
            let text = String::from_utf8_lossy(&fetched.body).into_owned();
            let base_url = fetched.final_url.clone();
            let proxy_base = self.proxy_base.clone();
            // Rewriting large playlists is CPU-bound; keep it off the
            // request-serving scheduler.
            let rewritten =
                tokio::task::spawn_blocking(move || rewrite_playlist(&text, &base_url, &proxy_base))
                    .await
                    .map_err(|e| ResolveError::Api {
                        message: format!("rewrite task failed: {e}"),
                    })?;
            Bytes::from(rewritten)
        } else {
            fetched.body
        };

        let resolved = CachedManifest {
            content,
            content_type,
        };
        self.store(url, &resolved);
        Ok(resolved)
    }

    /// Drop one entry; used by the link validator cascade.
    pub fn invalidate(&self, url: &str) {
        let mut entries = self.entries.lock().expect("manifest cache lock poisoned");
        if entries.remove(url).is_some() {
            debug!(url, "manifest cache entry invalidated");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("manifest cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, url: &str) -> Option<CachedManifest> {
        if self.ttl.is_zero() {
            return None;
        }
        let mut entries = self.entries.lock().expect("manifest cache lock poisoned");
        let entry = entries.get_mut(url)?;
        if entry.stored_at.elapsed() >= self.ttl {
            return None;
        }
        entry.last_access = Instant::now();
        Some(CachedManifest {
            content: entry.content.clone(),
            content_type: entry.content_type.clone(),
        })
    }

    fn store(&self, url: &str, manifest: &CachedManifest) {
        let now = Instant::now();
        let mut entries = self.entries.lock().expect("manifest cache lock poisoned");

        if entries.len() >= self.capacity && !entries.contains_key(url) {
            Self::evict_batch(&mut entries, self.capacity);
        }

        entries.insert(
            url.to_string(),
            Entry {
                content: manifest.content.clone(),
                content_type: manifest.content_type.clone(),
                stored_at: now,
                last_access: now,
            },
        );
    }

    /// Remove roughly a quarter of capacity, oldest access first.
    fn evict_batch(entries: &mut HashMap<String, Entry>, capacity: usize) {
        let batch = (capacity / 4).max(1);
        let mut by_age: Vec<(String, Instant)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.last_access))
            .collect();
        by_age.sort_by_key(|(_, accessed)| *accessed);

        let mut evicted = 0usize;
        for (key, _) in by_age.into_iter().take(batch) {
            entries.remove(&key);
            evicted += 1;
        }
        if evicted > 0 {
            warn!(evicted, remaining = entries.len(), "manifest cache evicted LRU batch");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::fetch::FetchedBody;

    struct StubFetcher {
        status: u16,
        body: &'static str,
        content_type: &'static str,
        fetches: AtomicUsize,
    }

    impl StubFetcher {
        fn playlist(body: &'static str) -> Self {
            Self {
                status: 200,
                body,
                content_type: "application/vnd.apple.mpegurl",
                fetches: AtomicUsize::new(0),
            }
        }

        fn count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ManifestFetcher for StubFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedBody, crate::errors::FetchError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(FetchedBody {
                body: Bytes::from_static(self.body.as_bytes()),
                status: self.status,
                content_type: Some(self.content_type.to_string()),
                final_url: url.to_string(),
            })
        }

        async fn exists(&self, _url: &str) -> bool {
            true
        }
    }

    const PLAYLIST: &str = "#EXTM3U\n#EXTINF:6.0,\nseg-001.ts";

    fn cache(fetcher: Arc<StubFetcher>, ttl: Duration, capacity: usize) -> ManifestCache {
        ManifestCache::new(fetcher, "https://addon.example.com".into(), ttl, capacity)
    }

    #[tokio::test]
    async fn fresh_entries_are_served_without_refetching() {
        let fetcher = Arc::new(StubFetcher::playlist(PLAYLIST));
        let cache = cache(fetcher.clone(), Duration::from_secs(60), 8);

        let first = cache.resolve("https://cdn/x/a.m3u8").await.unwrap();
        let second = cache.resolve("https://cdn/x/a.m3u8").await.unwrap();

        assert_eq!(fetcher.count(), 1);
        assert_eq!(first.content, second.content);
        assert!(
            std::str::from_utf8(&first.content)
                .unwrap()
                .contains("https://cdn/x/seg-001.ts")
        );
    }

    #[tokio::test]
    async fn entries_older_than_ttl_are_refetched() {
        let fetcher = Arc::new(StubFetcher::playlist(PLAYLIST));
        let cache = cache(fetcher.clone(), Duration::from_millis(50), 8);

        cache.resolve("https://cdn/x/a.m3u8").await.unwrap();
        cache.resolve("https://cdn/x/a.m3u8").await.unwrap();
        assert_eq!(fetcher.count(), 1);

        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.resolve("https://cdn/x/a.m3u8").await.unwrap();
        assert_eq!(fetcher.count(), 2);
    }

    #[tokio::test]
    async fn zero_ttl_always_refetches_but_still_writes() {
        let fetcher = Arc::new(StubFetcher::playlist(PLAYLIST));
        let cache = cache(fetcher.clone(), Duration::ZERO, 8);

        cache.resolve("https://cdn/x/a.m3u8").await.unwrap();
        cache.resolve("https://cdn/x/a.m3u8").await.unwrap();

        assert_eq!(fetcher.count(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn insertion_beyond_capacity_evicts_a_batch() {
        let fetcher = Arc::new(StubFetcher::playlist(PLAYLIST));
        let capacity = 8;
        let cache = cache(fetcher.clone(), Duration::from_secs(60), capacity);

        for i in 0..capacity + 1 {
            cache
                .resolve(&format!("https://cdn/x/{i}.m3u8"))
                .await
                .unwrap();
        }

        assert!(cache.len() <= capacity, "len={} cap={capacity}", cache.len());
    }

    #[tokio::test]
    async fn non_200_origin_is_propagated_not_cached() {
        let fetcher = Arc::new(StubFetcher {
            status: 404,
            body: "",
            content_type: "text/plain",
            fetches: AtomicUsize::new(0),
        });
        let cache = cache(fetcher.clone(), Duration::from_secs(60), 8);

        let err = cache.resolve("https://cdn/x/a.m3u8").await.unwrap_err();
        assert_eq!(err.proxy_status(), 404);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn opaque_assets_pass_through_unrewritten() {
        let fetcher = Arc::new(StubFetcher {
            status: 200,
            body: "binary-ish",
            content_type: "application/octet-stream",
            fetches: AtomicUsize::new(0),
        });
        let cache = cache(fetcher.clone(), Duration::from_secs(60), 8);

        let resolved = cache.resolve("https://cdn/x/key.bin").await.unwrap();
        assert_eq!(resolved.content, Bytes::from_static(b"binary-ish"));
        assert_eq!(resolved.content_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn invalidate_forces_a_refetch() {
        let fetcher = Arc::new(StubFetcher::playlist(PLAYLIST));
        let cache = cache(fetcher.clone(), Duration::from_secs(60), 8);

        cache.resolve("https://cdn/x/a.m3u8").await.unwrap();
        cache.invalidate("https://cdn/x/a.m3u8");
        cache.resolve("https://cdn/x/a.m3u8").await.unwrap();

        assert_eq!(fetcher.count(), 2);
    }
}
