//! Media playlist rewriting
//!
//! Line-by-line pass over a segment list: blank lines preserved, tag lines
//! carrying a quoted URI attribute get the playlist-vs-asset routing rule,
//! plain lines become absolute segment URLs (proxy-routed only when they
//! are nested sub-playlist references).

use tracing::debug;
use url::Url;

use super::tags::{self, Line};
use super::{LineRewriteError, proxy_route, resolve_and_route};

/// Rewrite a media playlist against `base_url`.
pub fn rewrite_media(content: &str, base_url: &str, proxy_base: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut rewritten_lines = 0usize;

    for raw in content.lines() {
        let line = raw.trim_end_matches('\r');
        match tags::classify(line) {
            Line::Blank => out.push(line.to_string()),
            Line::Uri(uri) => match rewrite_segment_uri(uri, base_url, proxy_base) {
                Ok(rewritten) => {
                    rewritten_lines += 1;
                    out.push(rewritten);
                }
                Err(_) => out.push(line.to_string()),
            },
            // Tag lines with an embedded quoted URI (EXT-X-KEY, EXT-X-MAP,
            // EXT-X-MEDIA, ...) get the same routing rule, fail-soft.
            _ if line.contains("URI=\"") => {
                match rewrite_uri_attribute(line, base_url, proxy_base) {
                    Ok(rewritten) => {
                        rewritten_lines += 1;
                        out.push(rewritten);
                    }
                    Err(_) => out.push(line.to_string()),
                }
            }
            _ => out.push(line.to_string()),
        }
    }

    debug!(rewritten = rewritten_lines, "media playlist rewritten");
    out.join("\n")
}

/// Absolutize a plain segment line; nested sub-playlist references are
/// proxy-routed, segment URLs stay direct.
fn rewrite_segment_uri(
    uri: &str,
    base_url: &str,
    proxy_base: &str,
) -> Result<String, LineRewriteError> {
    let absolute = Url::parse(base_url)?.join(uri)?;
    if absolute.path().to_ascii_lowercase().ends_with(crate::fetch::PLAYLIST_EXTENSION) {
        Ok(proxy_route(absolute.as_str(), proxy_base))
    } else {
        Ok(absolute.into())
    }
}

/// Rewrite the `URI="..."` span inside a tag line.
fn rewrite_uri_attribute(
    line: &str,
    base_url: &str,
    proxy_base: &str,
) -> Result<String, LineRewriteError> {
    let Some(start) = line.find("URI=\"") else {
        return Ok(line.to_string());
    };
    let value_start = start + "URI=\"".len();
    let Some(len) = line[value_start..].find('"') else {
        return Ok(line.to_string());
    };
    let value = &line[value_start..value_start + len];
    let routed = resolve_and_route(value, base_url, proxy_base)?;
    Ok(format!(
        "{}{}{}",
        &line[..value_start],
        routed.into_string(),
        &line[value_start + len..]
    ))
}
