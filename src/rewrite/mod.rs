//! Playlist rewrite engine
//!
//! Pure text transforms: raw playlist + base URL + proxy base URL in,
//! rewritten playlist out. Every URI in the output is absolute; URIs that
//! themselves point at playlists are routed back through the proxy, while
//! segments, keys and images stay as bare absolute links. Rewriting is
//! CPU-bound and has no I/O, so callers run it on a blocking worker.

pub mod audio;
pub mod master;
pub mod media;
pub mod tags;

use url::Url;

pub use master::{MasterVariant, filter_variant, parse_master_variants, rewrite_master};
pub use media::rewrite_media;

/// Path of the proxy endpoint that self-referential URLs point at.
pub const PROXY_MANIFEST_PATH: &str = "/proxy/manifest";

/// A single line failed to rewrite; the caller emits it unchanged.
#[derive(Debug, thiserror::Error)]
#[error("line rewrite failed: {0}")]
pub struct LineRewriteError(#[from] url::ParseError);

/// How a rewritten URI was routed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedUri {
    /// Absolute target is a playlist: routed back through this proxy.
    Proxied(String),
    /// Absolute target is an opaque asset: emitted as a bare absolute URL.
    Direct(String),
}

impl RoutedUri {
    pub fn into_string(self) -> String {
        match self {
            RoutedUri::Proxied(s) | RoutedUri::Direct(s) => s,
        }
    }
}

/// Build a self-referential proxy URL encoding `target` as a query parameter.
pub fn proxy_route(target: &str, proxy_base: &str) -> String {
    format!(
        "{}{}?url={}",
        proxy_base.trim_end_matches('/'),
        PROXY_MANIFEST_PATH,
        urlencoding::encode(target)
    )
}

/// Resolve `uri` against `base_url` and route it by the playlist-vs-asset
/// rule: playlist targets become proxy URLs, anything else stays a bare
/// absolute URL (bypass for encryption keys, images, segments).
///
/// An already proxy-routed target is returned unchanged so that rewriting
/// a rewritten playlist never nests proxy encodings.
pub fn resolve_and_route(
    uri: &str,
    base_url: &str,
    proxy_base: &str,
) -> Result<RoutedUri, LineRewriteError> {
    let absolute = Url::parse(base_url)?.join(uri)?;

    if is_self_referential(&absolute, proxy_base) {
        return Ok(RoutedUri::Proxied(absolute.into()));
    }

    let path = absolute.path().to_ascii_lowercase();
    if path.contains(crate::fetch::PLAYLIST_EXTENSION) {
        Ok(RoutedUri::Proxied(proxy_route(absolute.as_str(), proxy_base)))
    } else {
        Ok(RoutedUri::Direct(absolute.into()))
    }
}

/// Recursion guard: does this URL already point at our own proxy endpoint?
fn is_self_referential(url: &Url, proxy_base: &str) -> bool {
    url.path() == PROXY_MANIFEST_PATH
        && url
            .as_str()
            .starts_with(proxy_base.trim_end_matches('/'))
}

/// Whether a playlist body is a master playlist (declares variant streams).
pub fn is_master_playlist(content: &str) -> bool {
    content
        .lines()
        .any(|l| l.starts_with("#EXT-X-STREAM-INF"))
}

/// Rewrite a playlist of either shape.
pub fn rewrite_playlist(content: &str, base_url: &str, proxy_base: &str) -> String {
    if is_master_playlist(content) {
        rewrite_master(content, base_url, proxy_base)
    } else {
        rewrite_media(content, base_url, proxy_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example.com/v1/master.m3u8";
    const PROXY: &str = "https://addon.example.com";

    #[test]
    fn playlist_targets_are_proxy_routed() {
        let routed = resolve_and_route("audio/es.m3u8", BASE, PROXY).unwrap();
        assert_eq!(
            routed,
            RoutedUri::Proxied(
                "https://addon.example.com/proxy/manifest?url=https%3A%2F%2Fcdn.example.com%2Fv1%2Faudio%2Fes.m3u8"
                    .into()
            )
        );
    }

    #[test]
    fn asset_targets_bypass_the_proxy() {
        let routed = resolve_and_route("keys/k1.bin", BASE, PROXY).unwrap();
        assert_eq!(
            routed,
            RoutedUri::Direct("https://cdn.example.com/v1/keys/k1.bin".into())
        );
    }

    #[test]
    fn already_routed_uri_is_not_nested() {
        let once = resolve_and_route("audio/es.m3u8", BASE, PROXY)
            .unwrap()
            .into_string();
        let twice = resolve_and_route(&once, BASE, PROXY).unwrap().into_string();
        assert_eq!(once, twice);
    }

    #[test]
    fn rewriting_twice_is_idempotent() {
        let playlist = concat!(
            "#EXTM3U\n",
            "#EXT-X-STREAM-INF:BANDWIDTH=800000\n",
            "low/index.m3u8\n",
        );
        let first = rewrite_playlist(playlist, BASE, PROXY);
        let second = rewrite_playlist(&first, BASE, PROXY);
        assert_eq!(first, second);
    }
}
