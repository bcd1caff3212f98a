use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::backend::SearchBackend;
use crate::config::{self, SERPAPI_KEY_VAR};
use crate::data_models::{SearchResponse, SearchResult};
use crate::error::ConfigError;

const SEARCH_ENDPOINT: &str = "https://serpapi.com/search.json";

/// Stateless backend over the hosted SerpApi search endpoint.
///
/// Construction fails with [`ConfigError::MissingCredential`] when no key is
/// available from the explicit argument or the environment; there is no
/// recoverable fallback, so this is the one place a backend raises at setup.
pub struct ApiBackend {
    api_key: String,
    client: reqwest::Client,
}

impl ApiBackend {
    pub fn new(api_key: Option<String>) -> Result<ApiBackend, ConfigError> {
        let api_key = api_key
            .filter(|k| !k.is_empty())
            .or_else(|| config::get_env(SERPAPI_KEY_VAR))
            .ok_or(ConfigError::MissingCredential(SERPAPI_KEY_VAR))?;

        Ok(ApiBackend {
            api_key,
            client: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl SearchBackend for ApiBackend {
    async fn search(&self, query: &str) -> Result<SearchResponse> {
        anyhow::ensure!(!query.trim().is_empty(), "query must be non-empty");

        let raw: SerpApiResponse = self
            .client
            .get(SEARCH_ENDPOINT)
            .query(&[
                ("engine", "google"),
                ("q", query),
                ("hl", "en"),
                ("gl", "us"),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("SerpApi request failed")?
            .error_for_status()
            .context("SerpApi returned an error status")?
            .json()
            .await
            .context("failed to decode SerpApi response")?;

        Ok(raw.into_response())
    }
}

// The API response passes through largely unmodified; coercion only drops
// titleless entries and re-assigns positions so the uniform invariants hold
// for every backend.

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    organic_results: Vec<SerpApiResult>,
    #[serde(default)]
    ai_overview: Option<AiOverview>,
}

#[derive(Debug, Deserialize)]
struct SerpApiResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    snippet: String,
}

#[derive(Debug, Deserialize)]
struct AiOverview {
    #[serde(default)]
    text_blocks: Vec<TextBlock>,
}

#[derive(Debug, Deserialize)]
struct TextBlock {
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    text_blocks: Vec<TextBlock>,
}

impl SerpApiResponse {
    fn into_response(self) -> SearchResponse {
        let mut organic_results = Vec::with_capacity(self.organic_results.len());
        for result in self.organic_results {
            let title = result.title.trim().to_string();
            if title.is_empty() {
                continue;
            }
            organic_results.push(SearchResult {
                position: organic_results.len() as u32 + 1,
                title,
                link: result.link,
                snippet: result.snippet,
            });
        }

        let ai_overview = self
            .ai_overview
            .map(|overview| {
                let mut lines = Vec::new();
                collect_text_blocks(&overview.text_blocks, &mut lines);
                lines.join("\n")
            })
            .unwrap_or_default();

        SearchResponse {
            organic_results,
            ai_overview,
        }
    }
}

fn collect_text_blocks(blocks: &[TextBlock], out: &mut Vec<String>) {
    for block in blocks {
        if let Some(snippet) = &block.snippet {
            let snippet = snippet.trim();
            if !snippet.is_empty() {
                out.push(snippet.to_string());
            }
        }
        collect_text_blocks(&block.text_blocks, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credential_fails_construction() {
        // The env var may be set on a dev machine; clear it for this check.
        unsafe { std::env::remove_var(SERPAPI_KEY_VAR) };
        let result = ApiBackend::new(None);
        assert!(matches!(result, Err(ConfigError::MissingCredential(_))));
    }

    #[test]
    fn test_explicit_key_wins_without_env() {
        unsafe { std::env::remove_var(SERPAPI_KEY_VAR) };
        assert!(ApiBackend::new(Some("test-key".to_string())).is_ok());
    }

    #[test]
    fn test_coercion_drops_titleless_and_renumbers() {
        let raw: SerpApiResponse = serde_json::from_str(
            r#"{
                "organic_results": [
                    {"position": 3, "title": "Kept one", "link": "https://a.example", "snippet": "s1"},
                    {"position": 4, "title": "", "link": "https://ghost.example", "snippet": "dropped"},
                    {"position": 9, "title": "Kept two", "snippet": "s2"}
                ]
            }"#,
        )
        .unwrap();

        let response = raw.into_response();
        assert_eq!(response.organic_results.len(), 2);
        assert_eq!(response.organic_results[0].position, 1);
        assert_eq!(response.organic_results[1].position, 2);
        assert_eq!(response.organic_results[1].title, "Kept two");
        assert_eq!(response.organic_results[1].link, None);
        assert_eq!(response.ai_overview, "");
    }

    #[test]
    fn test_ai_overview_text_blocks_flatten() {
        let raw: SerpApiResponse = serde_json::from_str(
            r#"{
                "organic_results": [],
                "ai_overview": {
                    "text_blocks": [
                        {"snippet": "Top level."},
                        {"text_blocks": [{"snippet": "Nested."}]}
                    ]
                }
            }"#,
        )
        .unwrap();

        assert_eq!(raw.into_response().ai_overview, "Top level.\nNested.");
    }
}
