//! Per-line tag tokenizer and attribute-list parser
//!
//! Each playlist line is classified into a small tag taxonomy; the
//! transforms in `master`/`media` operate on classified lines only. The
//! attribute parser handles HLS attribute lists where values are either
//! bare or quoted (quoted values may contain commas).

/// Classification of one playlist line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
    /// Empty or whitespace-only line, preserved verbatim.
    Blank,
    /// `#EXT-X-STREAM-INF:` variant declaration; payload is the attribute list.
    StreamInf(&'a str),
    /// `#EXT-X-MEDIA:` declaration with `TYPE=AUDIO`; payload is the attribute list.
    AudioMedia(&'a str),
    /// Any other comment or tag line, preserved verbatim.
    Comment(&'a str),
    /// Plain (non-comment) line: a URI.
    Uri(&'a str),
}

const STREAM_INF_PREFIX: &str = "#EXT-X-STREAM-INF:";
const MEDIA_PREFIX: &str = "#EXT-X-MEDIA:";

/// Classify a single raw playlist line.
pub fn classify(raw: &str) -> Line<'_> {
    let line = raw.trim_end_matches('\r');
    if line.trim().is_empty() {
        return Line::Blank;
    }
    if let Some(attrs) = line.strip_prefix(STREAM_INF_PREFIX) {
        return Line::StreamInf(attrs);
    }
    if let Some(attrs) = line.strip_prefix(MEDIA_PREFIX) {
        if attribute(attrs, "TYPE").is_some_and(|v| v.eq_ignore_ascii_case("AUDIO")) {
            return Line::AudioMedia(attrs);
        }
        return Line::Comment(line);
    }
    if line.starts_with('#') {
        return Line::Comment(line);
    }
    Line::Uri(line.trim())
}

/// One parsed attribute, remembering whether the value was quoted so the
/// line can be reassembled in its original shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: String,
    pub quoted: bool,
}

/// Parse an HLS attribute list into an order-preserving attribute vector.
///
/// Splits on commas outside quotes; a malformed trailing fragment without
/// `=` is dropped rather than failing the line.
pub fn parse_attributes(attrs: &str) -> Vec<Attribute> {
    let mut out = Vec::new();
    let mut rest = attrs;

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().to_string();
        rest = &rest[eq + 1..];

        let (value, quoted, consumed) = if let Some(inner) = rest.strip_prefix('"') {
            match inner.find('"') {
                Some(close) => (inner[..close].to_string(), true, close + 2),
                // Unterminated quote: take the remainder as the value.
                None => (inner.to_string(), true, rest.len()),
            }
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            (rest[..end].trim().to_string(), false, end)
        };

        out.push(Attribute { key, value, quoted });

        rest = &rest[consumed.min(rest.len())..];
        rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
    }

    out
}

/// Reassemble an attribute vector into an HLS attribute list.
pub fn format_attributes(attrs: &[Attribute]) -> String {
    attrs
        .iter()
        .map(|a| {
            if a.quoted {
                format!("{}=\"{}\"", a.key, a.value)
            } else {
                format!("{}={}", a.key, a.value)
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Look up one attribute value in an unparsed attribute list.
pub fn attribute(attrs: &str, key: &str) -> Option<String> {
    parse_attributes(attrs)
        .into_iter()
        .find(|a| a.key.eq_ignore_ascii_case(key))
        .map(|a| a.value)
}

/// Extract `BANDWIDTH` from a variant attribute list (0 when absent).
pub fn bandwidth(attrs: &str) -> u64 {
    attribute(attrs, "BANDWIDTH")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

/// Extract the vertical component of `RESOLUTION` (0 when absent).
pub fn resolution_height(attrs: &str) -> u32 {
    attribute(attrs, "RESOLUTION")
        .and_then(|v| {
            v.split_once('x')
                .and_then(|(_, h)| h.trim().parse().ok())
        })
        .unwrap_or(0)
}
