//! Stream variant formatter
//!
//! Turns a rewritten master playlist plus duration metadata into the
//! client-facing stream descriptors: quality label, estimated size, audio
//! language glyphs, and a playable URL routed through the proxy filter
//! endpoint carrying the variant's bandwidth.

use serde::Serialize;

use crate::rewrite::master::parse_master_variants;
use crate::rewrite::tags::{self, Line};

/// Display name prefix shared by all descriptors of this deployment.
const SERVICE_LABEL: &str = "HLS Bridge";

/// Regional default shown when no audio language matches the glyph table.
const DEFAULT_GLYPH: &str = "\u{1F1EA}\u{1F1F8}";

/// Audio language code → display glyph.
const GLYPH_TABLE: &[(&[&str], &str)] = &[
    (&["en", "eng", "english"], "\u{1F1EC}\u{1F1E7}"),
    (
        &["es", "spa", "es-es", "spanish", "castellano"],
        "\u{1F1EA}\u{1F1F8}",
    ),
    (
        &["lat", "mx", "es-mx", "latino", "es-419"],
        "\u{1F1F2}\u{1F1FD}",
    ),
    (&["ja", "jp", "jpn"], "\u{1F1EF}\u{1F1F5}"),
    (&["fr", "fra"], "\u{1F1EB}\u{1F1F7}"),
    (&["it", "ita"], "\u{1F1EE}\u{1F1F9}"),
    (&["de", "deu"], "\u{1F1E9}\u{1F1EA}"),
    (&["pt", "por"], "\u{1F1F5}\u{1F1F9}"),
    (&["ru", "rus"], "\u{1F1F7}\u{1F1FA}"),
    (&["multi"], "\u{1F30E}"),
];

/// One client-facing stream descriptor.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub name: String,
    pub title: String,
    pub url: String,
    #[serde(rename = "behaviorHints")]
    pub behavior_hints: BehaviorHints,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BehaviorHints {
    #[serde(rename = "notWebReady")]
    pub not_web_ready: bool,
    /// Grouping key for client-side quality switching.
    #[serde(rename = "bingeGroup")]
    pub binge_group: String,
}

fn glyph_for(code: &str) -> Option<&'static str> {
    let needle = code.trim().to_ascii_lowercase();
    GLYPH_TABLE
        .iter()
        .find(|(aliases, _)| aliases.contains(&needle.as_str()))
        .map(|(_, glyph)| *glyph)
}

/// Collect distinct audio languages from a rewritten master playlist and
/// map them to glyphs, joined with " / ". Falls back to the regional
/// default when nothing matches.
fn language_glyphs(content: &str) -> String {
    let mut glyphs: Vec<&str> = Vec::new();
    for raw in content.lines() {
        if let Line::AudioMedia(attrs) = tags::classify(raw)
            && let Some(language) = tags::attribute(attrs, "LANGUAGE")
            && let Some(glyph) = glyph_for(&language)
            && !glyphs.contains(&glyph)
        {
            glyphs.push(glyph);
        }
    }
    if glyphs.is_empty() {
        DEFAULT_GLYPH.to_string()
    } else {
        glyphs.join(" / ")
    }
}

/// Estimated download size in gigabytes for a known duration.
fn estimated_size_gb(bandwidth_bits: u64, duration_minutes: u32) -> f64 {
    let seconds = f64::from(duration_minutes) * 60.0;
    bandwidth_bits as f64 * seconds / 8.0 / (1024.0 * 1024.0 * 1024.0)
}

/// Format one descriptor per variant of a rewritten master playlist.
///
/// `master_url` is the unmodified upstream master URL; playable URLs route
/// through `{proxy_base}/proxy/filter` with the variant's bandwidth. When
/// no variants parse, exactly one fallback descriptor points at the master
/// URL itself.
pub fn format_streams(
    master_url: &str,
    rewritten_master: &str,
    title: &str,
    duration_minutes: u32,
    proxy_base: &str,
) -> Vec<StreamDescriptor> {
    let glyphs = language_glyphs(rewritten_master);
    let base = proxy_base.trim_end_matches('/');

    let variants = parse_master_variants(rewritten_master);
    let mut streams: Vec<StreamDescriptor> = Vec::with_capacity(variants.len());

    for variant in variants.iter().filter(|v| v.bandwidth > 0) {
        let quality = if variant.height > 0 {
            format!("{}p", variant.height)
        } else {
            "Auto".to_string()
        };

        let size_info = if duration_minutes > 0 {
            format!(
                "\u{1F4BE} {:.2}GB ",
                estimated_size_gb(variant.bandwidth, duration_minutes)
            )
        } else {
            String::new()
        };

        streams.push(StreamDescriptor {
            name: format!("{SERVICE_LABEL} {quality}"),
            title: format!("{title}\n{quality} {size_info}{glyphs}"),
            url: format!(
                "{}/proxy/filter?url={}&bw={}",
                base,
                urlencoding::encode(master_url),
                variant.bandwidth
            ),
            behavior_hints: BehaviorHints {
                not_web_ready: false,
                binge_group: format!("hls-bridge-{quality}"),
            },
        });
    }

    if streams.is_empty() {
        streams.push(StreamDescriptor {
            name: format!("{SERVICE_LABEL} Default"),
            title: format!("{title}\nUnknown Quality {glyphs}"),
            url: master_url.to_string(),
            behavior_hints: BehaviorHints {
                not_web_ready: false,
                binge_group: "hls-bridge-default".to_string(),
            },
        });
    }

    streams
}
