//! Metadata provider boundary
//!
//! The core consumes only the `MediaMetadata` shape: an internal id, one or
//! more display titles, optional season/episode, and a runtime in minutes.
//! The TMDB-backed implementation softens every failure to `None`/`0`;
//! stream resolution degrades to an empty result instead of erroring.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

/// What kind of title is being resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    /// Parse the addon path segment (`movie` / `series`).
    pub fn from_path(value: &str) -> Option<Self> {
        match value {
            "movie" => Some(MediaKind::Movie),
            "series" => Some(MediaKind::Series),
            _ => None,
        }
    }
}

/// The metadata shape the core consumes.
#[derive(Debug, Clone)]
pub struct MediaMetadata {
    pub id: String,
    pub titles: Vec<String>,
    pub kind: MediaKind,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl MediaMetadata {
    /// Human title used in stream descriptors, e.g. `Title S1E3` for series.
    pub fn display_title(&self) -> String {
        let base = self.titles.first().cloned().unwrap_or_default();
        match (self.kind, self.season, self.episode) {
            (MediaKind::Series, Some(season), Some(episode)) => {
                format!("{base} S{season}E{episode}")
            }
            _ => base,
        }
    }
}

/// Lookup boundary implemented by the TMDB client and by test stubs.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Resolve an external identifier (e.g. `tt1234567` or
    /// `tt1234567:1:3`) into metadata; `None` on any failure.
    async fn lookup(&self, external_id: &str, kind: MediaKind) -> Option<MediaMetadata>;

    /// Runtime in minutes, 0 when unknown.
    async fn runtime_minutes(&self, metadata: &MediaMetadata) -> u32;
}

#[derive(Debug, Deserialize)]
struct FindResponse {
    #[serde(default)]
    movie_results: Vec<FindEntry>,
    #[serde(default)]
    tv_results: Vec<FindEntry>,
}

#[derive(Debug, Deserialize)]
struct FindEntry {
    id: u64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RuntimeResponse {
    #[serde(default)]
    runtime: Option<u32>,
    #[serde(default)]
    episode_run_time: Vec<u32>,
}

/// TMDB-backed metadata provider.
pub struct TmdbProvider {
    client: Client,
    api_key: String,
    language: String,
}

impl TmdbProvider {
    const BASE: &'static str = "https://api.themoviedb.org/3";

    pub fn new(client: Client, api_key: String, language: String) -> Self {
        Self {
            client,
            api_key,
            language,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Option<T> {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "metadata request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(status = %response.status(), "metadata request rejected");
            return None;
        }
        match response.json().await {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!(error = %e, "metadata response was not valid JSON");
                None
            }
        }
    }
}

#[async_trait]
impl MetadataProvider for TmdbProvider {
    async fn lookup(&self, external_id: &str, kind: MediaKind) -> Option<MediaMetadata> {
        // Series ids arrive as `imdb:season:episode`.
        let mut parts = external_id.split(':');
        let imdb_id = parts.next()?;
        let season: Option<u32> = parts.next().and_then(|s| s.parse().ok());
        let episode: Option<u32> = parts.next().and_then(|s| s.parse().ok());

        let url = format!(
            "{}/find/{}?api_key={}&external_source=imdb_id&language={}",
            Self::BASE,
            imdb_id,
            self.api_key,
            self.language
        );
        let found: FindResponse = self.get_json(&url).await?;

        let entry = match kind {
            MediaKind::Movie => found.movie_results.into_iter().next(),
            MediaKind::Series => found.tv_results.into_iter().next(),
        }?;

        let title = entry.title.or(entry.name).unwrap_or_default();
        debug!(external_id, title, "metadata resolved");

        Some(MediaMetadata {
            id: entry.id.to_string(),
            titles: vec![title],
            kind,
            season,
            episode,
        })
    }

    async fn runtime_minutes(&self, metadata: &MediaMetadata) -> u32 {
        let url = match (metadata.kind, metadata.season, metadata.episode) {
            (MediaKind::Movie, _, _) => format!(
                "{}/movie/{}?api_key={}&language={}",
                Self::BASE,
                metadata.id,
                self.api_key,
                self.language
            ),
            (MediaKind::Series, Some(season), Some(episode)) => format!(
                "{}/tv/{}/season/{}/episode/{}?api_key={}&language={}",
                Self::BASE,
                metadata.id,
                season,
                episode,
                self.api_key,
                self.language
            ),
            (MediaKind::Series, _, _) => format!(
                "{}/tv/{}?api_key={}&language={}",
                Self::BASE,
                metadata.id,
                self.api_key,
                self.language
            ),
        };

        let Some(body) = self.get_json::<RuntimeResponse>(&url).await else {
            return 0;
        };
        body.runtime
            .or_else(|| body.episode_run_time.first().copied())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_kind_parses_addon_path_segments() {
        assert_eq!(MediaKind::from_path("movie"), Some(MediaKind::Movie));
        assert_eq!(MediaKind::from_path("series"), Some(MediaKind::Series));
        assert_eq!(MediaKind::from_path("channel"), None);
    }

    #[test]
    fn series_display_title_carries_season_and_episode() {
        let meta = MediaMetadata {
            id: "42".into(),
            titles: vec!["Some Show".into()],
            kind: MediaKind::Series,
            season: Some(2),
            episode: Some(7),
        };
        assert_eq!(meta.display_title(), "Some Show S2E7");

        let movie = MediaMetadata {
            id: "7".into(),
            titles: vec!["Some Film".into()],
            kind: MediaKind::Movie,
            season: None,
            episode: None,
        };
        assert_eq!(movie.display_title(), "Some Film");
    }
}
