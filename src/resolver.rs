//! Upstream API client
//!
//! Collaborator boundary for the identity and link-resolution endpoints:
//! `POST {base}/get/login/{app_key}` with a form body, and
//! `POST {base}/get/hash_link_v5/{app_key}/{sid}/{type}/{media_id}` with a
//! JSON body. Shapes follow the upstream service, not this crate.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{FetchError, ResolveError};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    result: Option<LoginResult>,
}

#[derive(Debug, Deserialize)]
struct LoginResult {
    sid: Option<String>,
}

#[derive(Debug, Serialize)]
struct LinkRequest<'a> {
    auth: &'a str,
    season: u32,
    episode: u32,
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    #[serde(default)]
    data: serde_json::Value,
}

/// Client for the upstream identity and link-resolution endpoints.
pub struct UpstreamApi {
    client: Client,
    base: String,
    app_key: String,
    auth_token: String,
}

impl UpstreamApi {
    pub fn new(client: Client, base: String, app_key: String, auth_token: String) -> Self {
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            app_key,
            auth_token,
        }
    }

    /// Authenticate one credential pair. A profile is valid only when the
    /// response carries a session identifier.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ResolveError> {
        let url = format!("{}/get/login/{}", self.base, self.app_key);
        let response = self
            .client
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ResolveError::Origin { status, url });
        }

        let body: LoginResponse = response.json().await.map_err(|e| ResolveError::Api {
            message: format!("login response was not valid JSON: {e}"),
        })?;

        body.result
            .and_then(|r| r.sid)
            .ok_or_else(|| ResolveError::Api {
                message: "login response carried no session identifier".to_string(),
            })
    }

    /// Resolve candidate playlist URLs for one title. The upstream answers
    /// with `{data: [urls]}`; a bare string is tolerated and wrapped.
    pub async fn resolve_links(
        &self,
        sid: &str,
        media_id: &str,
        is_movie: bool,
        season: u32,
        episode: u32,
    ) -> Result<Vec<String>, ResolveError> {
        let kind = if is_movie { 0 } else { 1 };
        let url = format!(
            "{}/get/hash_link_v5/{}/{}/{}/{}",
            self.base, self.app_key, sid, kind, media_id
        );

        let response = self
            .client
            .post(&url)
            .json(&LinkRequest {
                auth: &self.auth_token,
                season,
                episode,
            })
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(&url, e))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ResolveError::Origin { status, url });
        }

        let body: LinkResponse = response.json().await.map_err(|e| ResolveError::Api {
            message: format!("link response was not valid JSON: {e}"),
        })?;

        let urls = flatten_links(body.data);
        debug!(media_id, candidates = urls.len(), "resolved upstream links");
        Ok(urls)
    }
}

fn flatten_links(data: serde_json::Value) -> Vec<String> {
    match data {
        serde_json::Value::String(s) => vec![s],
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|v| v.as_str().map(|s| s.to_string()))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_payload_may_be_list_or_single_string() {
        assert_eq!(
            flatten_links(serde_json::json!(["https://a", "https://b"])),
            vec!["https://a".to_string(), "https://b".to_string()]
        );
        assert_eq!(
            flatten_links(serde_json::json!("https://only")),
            vec!["https://only".to_string()]
        );
        assert!(flatten_links(serde_json::json!(null)).is_empty());
        assert!(flatten_links(serde_json::json!({"odd": true})).is_empty());
    }
}
