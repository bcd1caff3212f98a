use anyhow::Result;

use crate::backend::SearchBackend;
use crate::data_models::VerificationRecord;

/// How many results the diagnostic listing shows.
const TOP_N: usize = 10;

/// Wraps exactly one search backend and turns a candidate prompt into a
/// [`VerificationRecord`]: one `search` call, a derived result count, and a
/// fixed-format analysis line. The top-N listing is diagnostic output only.
pub struct Verifier {
    backend: Box<dyn SearchBackend>,
}

impl Verifier {
    pub fn new(backend: Box<dyn SearchBackend>) -> Verifier {
        Verifier { backend }
    }

    pub async fn verify(&self, prompt: &str) -> Result<VerificationRecord> {
        log::info!("verifying prompt: {prompt}");

        let response = self.backend.search(prompt).await?;
        let result_count = response.organic_results.len();
        let shown = result_count.min(TOP_N);

        for result in response.organic_results.iter().take(TOP_N) {
            log::info!(
                "result {}: {} | {} | {}",
                result.position,
                result.title,
                result.link.as_deref().unwrap_or("-"),
                result.snippet
            );
        }
        if !response.ai_overview.is_empty() {
            log::info!(
                "ai overview captured ({} chars)",
                response.ai_overview.len()
            );
        }

        Ok(VerificationRecord {
            prompt: prompt.to_string(),
            result_count,
            analysis: format!("collected {result_count} organic results; top {shown} reviewed"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_models::{SearchResponse, SearchResult};
    use async_trait::async_trait;

    struct StaticBackend {
        results: usize,
    }

    #[async_trait]
    impl SearchBackend for StaticBackend {
        async fn search(&self, _query: &str) -> Result<SearchResponse> {
            let organic_results = (1..=self.results)
                .map(|i| SearchResult {
                    position: i as u32,
                    title: format!("result {i}"),
                    link: Some(format!("https://example.com/{i}")),
                    snippet: String::new(),
                })
                .collect();
            Ok(SearchResponse {
                organic_results,
                ai_overview: String::new(),
            })
        }
    }

    /// Behaves like a captcha-walled session: empty response, no error.
    struct BlockedBackend;

    #[async_trait]
    impl SearchBackend for BlockedBackend {
        async fn search(&self, _query: &str) -> Result<SearchResponse> {
            Ok(SearchResponse::empty())
        }
    }

    #[tokio::test]
    async fn test_result_count_matches_organic_results() {
        for k in [0usize, 3, 15] {
            let verifier = Verifier::new(Box::new(StaticBackend { results: k }));
            let record = verifier.verify("who holds the record?").await.unwrap();
            assert_eq!(record.result_count, k);
            assert!(!record.analysis.is_empty());
        }
    }

    #[tokio::test]
    async fn test_blocked_search_verifies_as_zero_results() {
        let verifier = Verifier::new(Box::new(BlockedBackend));
        let record = verifier.verify("anything at all").await.unwrap();
        assert_eq!(record.result_count, 0);
        assert_eq!(record.analysis, "collected 0 organic results; top 0 reviewed");
    }

    #[tokio::test]
    async fn test_prompt_round_trips_into_record() {
        let verifier = Verifier::new(Box::new(StaticBackend { results: 2 }));
        let record = verifier.verify("which theater is oldest?").await.unwrap();
        assert_eq!(record.prompt, "which theater is oldest?");
    }
}
