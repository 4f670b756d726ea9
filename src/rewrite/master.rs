//! Master playlist rewriting
//!
//! Pairs each `#EXT-X-STREAM-INF` declaration with the following URI line,
//! rewrites audio renditions, and reassembles the document as headers,
//! audio lines, then variants by descending bandwidth (stable on ties).

use tracing::debug;

use super::audio::rewrite_audio_track;
use super::tags::{self, Line};
use super::resolve_and_route;

/// One variant-stream declaration paired with its URI line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MasterVariant {
    /// Bits per second, 0 when the declaration carries no `BANDWIDTH`.
    pub bandwidth: u64,
    /// Vertical resolution in pixels, 0 when unknown.
    pub height: u32,
    /// The full `#EXT-X-STREAM-INF:` line.
    pub declaration: String,
    /// The URI line following the declaration.
    pub uri: String,
}

/// Extract variant declaration/URI pairs in source order.
pub fn parse_master_variants(content: &str) -> Vec<MasterVariant> {
    let mut out = Vec::new();
    let mut pending: Option<(u64, u32, String)> = None;

    for raw in content.lines() {
        match tags::classify(raw) {
            Line::StreamInf(attrs) => {
                pending = Some((
                    tags::bandwidth(attrs),
                    tags::resolution_height(attrs),
                    raw.trim_end_matches('\r').to_string(),
                ));
            }
            Line::Uri(uri) => {
                if let Some((bandwidth, height, declaration)) = pending.take() {
                    out.push(MasterVariant {
                        bandwidth,
                        height,
                        declaration,
                        uri: uri.to_string(),
                    });
                }
            }
            _ => {}
        }
    }

    out
}

/// Rewrite a master playlist against `base_url`, routing playlist URIs back
/// through `proxy_base`.
pub fn rewrite_master(content: &str, base_url: &str, proxy_base: &str) -> String {
    let mut headers: Vec<String> = Vec::new();
    let mut audio: Vec<String> = Vec::new();
    let mut variants = parse_master_variants(content);
    let mut rewritten_lines = 0usize;
    let mut failed_lines = 0usize;

    for raw in content.lines() {
        match tags::classify(raw) {
            Line::AudioMedia(attrs) => {
                match rewrite_audio_track(attrs, base_url, proxy_base) {
                    Ok(line) => {
                        rewritten_lines += 1;
                        audio.push(line);
                    }
                    // Fail-soft per line: keep the original declaration.
                    Err(_) => {
                        failed_lines += 1;
                        audio.push(raw.trim_end_matches('\r').to_string());
                    }
                }
            }
            Line::Comment(line) => headers.push(line.to_string()),
            // Variant declarations and their URIs were collected above;
            // blank lines between them carry nothing in a master playlist.
            _ => {}
        }
    }

    // Descending bandwidth; sort_by is stable so ties keep source order.
    variants.sort_by(|a, b| b.bandwidth.cmp(&a.bandwidth));

    let mut out: Vec<String> = headers;
    out.append(&mut audio);
    for variant in variants {
        let uri = match resolve_and_route(&variant.uri, base_url, proxy_base) {
            Ok(routed) => {
                rewritten_lines += 1;
                routed.into_string()
            }
            Err(_) => {
                failed_lines += 1;
                variant.uri.clone()
            }
        };
        out.push(variant.declaration);
        out.push(uri);
    }

    debug!(
        rewritten = rewritten_lines,
        failed = failed_lines,
        "master playlist rewritten"
    );

    out.join("\n")
}

/// Reduce a master playlist to the single variant matching `bandwidth`,
/// keeping header and audio lines intact. Returns the input unchanged when
/// no variant matches.
pub fn filter_variant(content: &str, bandwidth: u64) -> String {
    let variants = parse_master_variants(content);
    let Some(selected) = variants.iter().find(|v| v.bandwidth == bandwidth) else {
        return content.to_string();
    };

    let mut out: Vec<&str> = Vec::new();
    for raw in content.lines() {
        match tags::classify(raw) {
            Line::StreamInf(_) | Line::Uri(_) => {}
            Line::Blank => {}
            _ => out.push(raw),
        }
    }
    out.push(&selected.declaration);
    out.push(&selected.uri);
    out.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example.com/v1/master.m3u8";
    const PROXY: &str = "https://addon.example.com";

    const MASTER: &str = concat!(
        "#EXTM3U\n",
        "#EXT-X-VERSION:4\n",
        "#EXT-X-MEDIA:TYPE=AUDIO,GROUP-ID=\"aud\",LANGUAGE=\"spa\",NAME=\"5\",CHANNELS=\"6\",URI=\"audio/es.m3u8\"\n",
        "#EXT-X-STREAM-INF:BANDWIDTH=500000,RESOLUTION=842x480\n",
        "low/index.m3u8\n",
        "#EXT-X-STREAM-INF:BANDWIDTH=2000000,RESOLUTION=1920x1080\n",
        "high/index.m3u8\n",
    );

    #[test]
    fn variants_sorted_by_descending_bandwidth_with_absolute_uris() {
        let out = rewrite_master(MASTER, BASE, PROXY);
        let lines: Vec<&str> = out.lines().collect();

        let hi = lines
            .iter()
            .position(|l| l.contains("BANDWIDTH=2000000"))
            .unwrap();
        let lo = lines
            .iter()
            .position(|l| l.contains("BANDWIDTH=500000"))
            .unwrap();
        assert!(hi < lo, "2000000 variant must come first:\n{out}");

        // Both URIs resolved against the base and proxy-routed.
        assert!(
            lines[hi + 1].starts_with("https://addon.example.com/proxy/manifest?url="),
            "{out}"
        );
        assert!(
            lines[hi + 1].contains("high%2Findex.m3u8"),
            "{out}"
        );
        assert!(
            lines[lo + 1].contains("low%2Findex.m3u8"),
            "{out}"
        );
    }

    #[test]
    fn variant_count_is_preserved_and_ties_keep_source_order() {
        let master = concat!(
            "#EXTM3U\n",
            "#EXT-X-STREAM-INF:BANDWIDTH=1000000,NAME=\"first\"\n",
            "a.m3u8\n",
            "#EXT-X-STREAM-INF:BANDWIDTH=1000000,NAME=\"second\"\n",
            "b.m3u8\n",
            "#EXT-X-STREAM-INF:BANDWIDTH=3000000\n",
            "c.m3u8\n",
        );
        let out = rewrite_master(master, BASE, PROXY);
        let rewritten = parse_master_variants(&out);
        assert_eq!(rewritten.len(), 3);
        assert_eq!(rewritten[0].bandwidth, 3_000_000);
        assert!(rewritten[1].declaration.contains("first"));
        assert!(rewritten[2].declaration.contains("second"));
        assert!(rewritten.iter().all(|v| v.uri.starts_with("https://")));
    }

    #[test]
    fn audio_lines_are_emitted_before_variants() {
        let out = rewrite_master(MASTER, BASE, PROXY);
        let lines: Vec<&str> = out.lines().collect();
        let audio = lines
            .iter()
            .position(|l| l.starts_with("#EXT-X-MEDIA"))
            .unwrap();
        let variant = lines
            .iter()
            .position(|l| l.starts_with("#EXT-X-STREAM-INF"))
            .unwrap();
        assert!(audio < variant);
        assert!(lines[audio].contains("Castellano (5.1)"), "{out}");
    }

    #[test]
    fn filter_variant_keeps_only_the_matching_block() {
        let out = rewrite_master(MASTER, BASE, PROXY);
        let filtered = filter_variant(&out, 500_000);
        let variants = parse_master_variants(&filtered);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].bandwidth, 500_000);
        assert!(filtered.contains("#EXT-X-MEDIA"), "{filtered}");

        // Unknown bandwidth leaves the playlist untouched.
        assert_eq!(filter_variant(&out, 42), out);
    }
}
