//! Audio-track declaration rewriting
//!
//! Normalizes `#EXT-X-MEDIA:TYPE=AUDIO` lines: canonical language naming,
//! channel descriptor, codec quality hint, and URI routing. Failure on one
//! line never aborts the document; the caller emits the original line.

use super::tags::{Attribute, format_attributes, parse_attributes};
use super::{LineRewriteError, resolve_and_route};

/// Canonical (display name, IETF-ish code) pairs keyed by the raw language
/// codes and names seen upstream. Unmatched codes pass through unchanged.
const LANGUAGE_TABLE: &[(&[&str], (&str, &str))] = &[
    (
        &["lat", "latino", "mx", "es-mx", "es-419", "spa-419"],
        ("Latino", "es-MX"),
    ),
    (
        &["es", "spa", "es-es", "spanish", "castellano", "esp"],
        ("Castellano", "es-ES"),
    ),
    (&["en", "eng", "english"], ("English", "en")),
    (&["ja", "jp", "jpn", "japanese"], ("Japonés", "ja")),
    (&["it", "ita", "italian", "italiano"], ("Italiano", "it")),
    (&["fr", "fra", "fre", "french"], ("Francés", "fr")),
    (&["de", "deu", "ger", "german"], ("Alemán", "de")),
];

/// Codec hints that mark a track as the high-quality rendition.
const HQ_HINTS: &[&str] = &["eac3", "ec-3", "ec3", "ddp", "atmos"];

/// Look up a raw language code or name against the canonical table.
pub fn canonical_language(raw: &str) -> Option<(&'static str, &'static str)> {
    let needle = raw.trim().to_ascii_lowercase();
    LANGUAGE_TABLE
        .iter()
        .find(|(aliases, _)| aliases.contains(&needle.as_str()))
        .map(|(_, pair)| *pair)
}

/// Derive the display channel descriptor from a `CHANNELS` attribute value.
fn channel_descriptor(channels: &str) -> String {
    let value = channels.trim();
    if value == "6" || value.contains("5.1") {
        "5.1".to_string()
    } else if value == "2" {
        "2.0".to_string()
    } else {
        format!("{value}ch")
    }
}

/// Rewrite one audio-track attribute list into a normalized declaration.
///
/// Returns the full rewritten line. Any URI resolution failure is an error;
/// the caller keeps the original line (fail-soft per line).
pub fn rewrite_audio_track(
    attrs: &str,
    base_url: &str,
    proxy_base: &str,
) -> Result<String, LineRewriteError> {
    let mut attributes = parse_attributes(attrs);

    let language = find(&attributes, "LANGUAGE");
    let uri = find(&attributes, "URI");
    let raw_name = find(&attributes, "NAME").unwrap_or_default();

    // Purely numeric names carry no information on their own.
    let mut name = if !raw_name.is_empty() && raw_name.chars().all(|c| c.is_ascii_digit()) {
        format!("Track {raw_name}")
    } else {
        raw_name.clone()
    };

    // Canonical language wins over whatever name the origin chose. Try the
    // language code first, then the raw name itself.
    let matched = language
        .as_deref()
        .and_then(canonical_language)
        .or_else(|| canonical_language(&raw_name));
    if let Some((display, code)) = matched {
        name = display.to_string();
        set(&mut attributes, "LANGUAGE", code, true);
    }

    if let Some(channels) = find(&attributes, "CHANNELS") {
        name = format!("{} ({})", name, channel_descriptor(&channels));
    }

    let hq_haystack = format!(
        "{} {}",
        raw_name.to_ascii_lowercase(),
        uri.as_deref().unwrap_or("").to_ascii_lowercase()
    );
    if HQ_HINTS.iter().any(|hint| hq_haystack.contains(hint)) {
        name.push_str(" HQ");
    }

    set(&mut attributes, "NAME", &name, true);

    if let Some(uri) = uri {
        let routed = resolve_and_route(&uri, base_url, proxy_base)?;
        set(&mut attributes, "URI", &routed.into_string(), true);
    }

    Ok(format!("#EXT-X-MEDIA:{}", format_attributes(&attributes)))
}

fn find(attributes: &[Attribute], key: &str) -> Option<String> {
    attributes
        .iter()
        .find(|a| a.key.eq_ignore_ascii_case(key))
        .map(|a| a.value.clone())
}

fn set(attributes: &mut Vec<Attribute>, key: &str, value: &str, quoted: bool) {
    match attributes.iter_mut().find(|a| a.key.eq_ignore_ascii_case(key)) {
        Some(attr) => {
            attr.value = value.to_string();
            attr.quoted = quoted;
        }
        None => attributes.push(Attribute {
            key: key.to_string(),
            value: value.to_string(),
            quoted,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example.com/v1/master.m3u8";
    const PROXY: &str = "https://addon.example.com";

    #[test]
    fn spanish_numeric_name_normalizes_to_castellano() {
        let line = rewrite_audio_track(
            r#"TYPE=AUDIO,GROUP-ID="aud",LANGUAGE="spa",NAME="5",CHANNELS="6",URI="audio/es.m3u8""#,
            BASE,
            PROXY,
        )
        .unwrap();
        assert!(line.contains(r#"NAME="Castellano (5.1)""#), "{line}");
        assert!(line.contains(r#"LANGUAGE="es-ES""#), "{line}");
    }

    #[test]
    fn latin_american_spanish_maps_to_latino() {
        let line = rewrite_audio_track(
            r#"TYPE=AUDIO,LANGUAGE="lat",NAME="2",CHANNELS="2",URI="audio/lat.m3u8""#,
            BASE,
            PROXY,
        )
        .unwrap();
        assert!(line.contains(r#"NAME="Latino (2.0)""#), "{line}");
        assert!(line.contains(r#"LANGUAGE="es-MX""#), "{line}");
    }

    #[test]
    fn unknown_language_passes_through() {
        let line = rewrite_audio_track(
            r#"TYPE=AUDIO,LANGUAGE="ko",NAME="Korean",URI="audio/ko.m3u8""#,
            BASE,
            PROXY,
        )
        .unwrap();
        assert!(line.contains(r#"LANGUAGE="ko""#), "{line}");
        assert!(line.contains(r#"NAME="Korean""#), "{line}");
    }

    #[test]
    fn odd_channel_counts_get_a_ch_suffix() {
        assert_eq!(channel_descriptor("8"), "8ch");
        assert_eq!(channel_descriptor("6/JOC"), "6/JOCch");
        assert_eq!(channel_descriptor("5.1"), "5.1");
        assert_eq!(channel_descriptor("16/JOC/5.1"), "5.1");
    }

    #[test]
    fn codec_hint_appends_hq_tag() {
        let line = rewrite_audio_track(
            r#"TYPE=AUDIO,LANGUAGE="en",NAME="English",URI="audio/en-eac3.m3u8""#,
            BASE,
            PROXY,
        )
        .unwrap();
        assert!(line.contains(r#"NAME="English HQ""#), "{line}");
    }

    #[test]
    fn playlist_uri_is_proxy_routed_and_key_uri_is_not() {
        let routed = rewrite_audio_track(
            r#"TYPE=AUDIO,LANGUAGE="en",NAME="English",URI="audio/en.m3u8""#,
            BASE,
            PROXY,
        )
        .unwrap();
        assert!(routed.contains("/proxy/manifest?url="), "{routed}");

        let bypassed = rewrite_audio_track(
            r#"TYPE=AUDIO,LANGUAGE="en",NAME="English",URI="art/cover.jpg""#,
            BASE,
            PROXY,
        )
        .unwrap();
        assert!(!bypassed.contains("/proxy/manifest"), "{bypassed}");
        assert!(
            bypassed.contains(r#"URI="https://cdn.example.com/v1/art/cover.jpg""#),
            "{bypassed}"
        );
    }
}
