//! HTTP request handlers
//!
//! Handlers stay thin and delegate to the core components. Stream
//! resolution never surfaces an error page: every failure mode collapses
//! to an empty stream list.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, warn};

use crate::cache::LinkKey;
use crate::errors::ResolveError;
use crate::metadata::MediaKind;
use crate::rewrite::filter_variant;
use crate::variants::{StreamDescriptor, format_streams};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct ManifestParams {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct FilterParams {
    pub url: String,
    pub bw: u64,
}

/// `GET/HEAD /proxy/manifest?url=<target>`
///
/// Rewritten body with the origin's content type, or the origin's status
/// code on failure.
pub async fn proxy_manifest(
    State(state): State<AppState>,
    Query(params): Query<ManifestParams>,
) -> Response {
    match state.manifests.resolve(&params.url).await {
        Ok(manifest) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, manifest.content_type),
                (header::CACHE_CONTROL, "public, max-age=120".to_string()),
            ],
            manifest.content,
        )
            .into_response(),
        Err(e) => resolve_error_response(&e),
    }
}

/// `GET /proxy/filter?url=<target>&bw=<bandwidth>`
///
/// The rewritten master reduced to the variant matching `bw`.
pub async fn proxy_filter(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Response {
    let manifest = match state.manifests.resolve(&params.url).await {
        Ok(m) => m,
        Err(e) => return resolve_error_response(&e),
    };

    let Ok(text) = std::str::from_utf8(&manifest.content) else {
        // Not a text playlist; nothing to filter.
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, manifest.content_type.clone())],
            manifest.content,
        )
            .into_response();
    };

    let filtered = filter_variant(text, params.bw);
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, manifest.content_type),
            (header::CACHE_CONTROL, "public, max-age=120".to_string()),
        ],
        filtered,
    )
        .into_response()
}

fn resolve_error_response(error: &ResolveError) -> Response {
    warn!(error = %error, "proxy resolution failed");
    StatusCode::from_u16(error.proxy_status())
        .unwrap_or(StatusCode::BAD_GATEWAY)
        .into_response()
}

/// `GET /stream/{type}/{id}` — the full resolution flow.
pub async fn stream(
    State(state): State<AppState>,
    Path((stream_type, stream_id)): Path<(String, String)>,
) -> Json<serde_json::Value> {
    let streams = resolve_streams(&state, &stream_type, &stream_id)
        .await
        .unwrap_or_else(|e| {
            error!(stream_type, stream_id, error = %e, "stream resolution failed");
            Vec::new()
        });
    Json(json!({ "streams": streams }))
}

async fn resolve_streams(
    state: &AppState,
    stream_type: &str,
    stream_id: &str,
) -> Result<Vec<StreamDescriptor>, ResolveError> {
    let Some(kind) = MediaKind::from_path(stream_type) else {
        debug!(stream_type, "unsupported stream type");
        return Ok(Vec::new());
    };
    let external_id = stream_id.trim_end_matches(".json");

    let Some(metadata) = state.metadata.lookup(external_id, kind).await else {
        debug!(external_id, "no metadata for id");
        return Ok(Vec::new());
    };

    let key = match kind {
        MediaKind::Movie => LinkKey::movie(metadata.id.clone()),
        MediaKind::Series => LinkKey::episode(
            metadata.id.clone(),
            metadata.season.unwrap_or(0),
            metadata.episode.unwrap_or(0),
        ),
    };

    let urls = match state.links.get(&key) {
        Some(cached) => cached,
        None => {
            let profile = state.pool.next().await?;
            let urls = state
                .api
                .resolve_links(
                    &profile.sid,
                    &metadata.id,
                    key.is_movie,
                    key.season,
                    key.episode,
                )
                .await?;
            state.links.insert(key, urls.clone());
            urls
        }
    };

    let title = metadata.display_title();
    let duration_minutes = state.metadata.runtime_minutes(&metadata).await;

    let mut streams = Vec::new();
    for url in &urls {
        match state.manifests.resolve(url).await {
            Ok(manifest) => {
                if let Ok(text) = std::str::from_utf8(&manifest.content) {
                    streams.extend(format_streams(
                        url,
                        text,
                        &title,
                        duration_minutes,
                        &state.proxy_base,
                    ));
                }
            }
            // One dead candidate must not sink the others.
            Err(e) => warn!(url, error = %e, "candidate manifest failed to resolve"),
        }
    }

    Ok(streams)
}

/// `GET /manifest.json` — addon descriptor.
pub async fn addon_manifest() -> Json<serde_json::Value> {
    Json(json!({
        "id": "community.hls-bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "name": "HLS Bridge",
        "resources": ["stream"],
        "types": ["movie", "series"],
        "catalogs": [],
        "behaviorHints": { "configurable": false },
    }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let uptime = chrono::Utc::now() - state.start_time;
    Json(json!({
        "status": "healthy",
        "uptime_seconds": uptime.num_seconds(),
        "pool_profiles": state.pool.len().await,
        "cached_manifests": state.manifests.len(),
        "cached_links": state.links.len(),
    }))
}
