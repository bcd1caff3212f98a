use anyhow::Result;
use async_trait::async_trait;

use quarry::backend::SearchBackend;
use quarry::data_models::{Candidate, CandidateBatch, SearchResponse, SearchResult};
use quarry::export;
use quarry::generation::{self, QueryGenerator};
use quarry::pipeline;
use quarry::verifier::Verifier;

mod test_helpers {
    use super::*;
    use nanoid::nanoid;
    use std::path::PathBuf;

    pub fn tmp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("quarry_{tag}_{}.json", nanoid!(8)))
    }

    /// Deterministic stand-in for the model call.
    pub struct TemplateGenerator;

    #[async_trait]
    impl QueryGenerator for TemplateGenerator {
        async fn generate_query(&self, topic: &str) -> Result<String> {
            Ok(format!("What little-known fact about {topic} is officially recorded?"))
        }
    }

    /// Returns a fixed number of results for any query.
    pub struct StaticBackend {
        pub results: usize,
    }

    #[async_trait]
    impl SearchBackend for StaticBackend {
        async fn search(&self, _query: &str) -> Result<SearchResponse> {
            let organic_results = (1..=self.results)
                .map(|i| SearchResult {
                    position: i as u32,
                    title: format!("result {i}"),
                    link: Some(format!("https://example.com/{i}")),
                    snippet: format!("snippet {i}"),
                })
                .collect();
            Ok(SearchResponse {
                organic_results,
                ai_overview: String::new(),
            })
        }
    }

    /// Fails like a crashed driver whenever the query contains the marker.
    pub struct FlakyBackend {
        pub poison: &'static str,
    }

    #[async_trait]
    impl SearchBackend for FlakyBackend {
        async fn search(&self, query: &str) -> Result<SearchResponse> {
            if query.contains(self.poison) {
                anyhow::bail!("driver crashed");
            }
            Ok(SearchResponse::empty())
        }
    }
}

use test_helpers::*;

#[test]
fn test_candidate_artifact_round_trips_exactly() -> Result<()> {
    let batch = CandidateBatch::new(
        "test-model".to_string(),
        vec![
            Candidate::new("roman roads".to_string(), "Which road came first?".to_string()),
            Candidate::new(
                "boston theaters".to_string(),
                "Which theater is officially the oldest?".to_string(),
            ),
        ],
    );

    let path = tmp_path("batch");
    generation::write_batch(&batch, &path)?;
    let loaded = generation::read_batch(&path)?;
    std::fs::remove_file(&path)?;

    assert_eq!(loaded.model, batch.model);
    assert_eq!(loaded.generated_at, batch.generated_at);
    assert_eq!(loaded.candidates, batch.candidates);
    Ok(())
}

#[tokio::test]
async fn test_generate_batch_produces_one_candidate_per_topic() -> Result<()> {
    let topics = vec![
        "roman roads".to_string(),
        "boston theaters".to_string(),
        "lighthouse keepers".to_string(),
    ];

    let batch = generation::generate_batch(&TemplateGenerator, "test-model", topics.clone()).await?;

    assert_eq!(batch.candidates.len(), 3);
    for (candidate, topic) in batch.candidates.iter().zip(&topics) {
        assert_eq!(&candidate.topic, topic);
        assert!(candidate.generated_query.contains(topic));
    }
    Ok(())
}

#[tokio::test]
async fn test_three_topics_end_to_end_yields_three_records() -> Result<()> {
    // Generation phase: worker body writes the artifact, orchestrator reads
    // it back before any verification starts.
    let topics = vec![
        "roman roads".to_string(),
        "boston theaters".to_string(),
        "lighthouse keepers".to_string(),
    ];
    let batch = generation::generate_batch(&TemplateGenerator, "test-model", topics).await?;

    let artifact = tmp_path("e2e_batch");
    generation::write_batch(&batch, &artifact)?;
    let loaded = generation::read_batch(&artifact)?;
    std::fs::remove_file(&artifact)?;

    // Verification phase.
    let verifier = Verifier::new(Box::new(StaticBackend { results: 4 }));
    let report = pipeline::verify_candidates(&verifier, loaded.candidates, 2).await;

    assert_eq!(report.records.len(), 3);
    assert!(report.skipped.is_empty());
    for record in &report.records {
        assert_eq!(record.result_count, 4);
        assert!(!record.analysis.is_empty());
    }

    // Export collaborator: one row per verified candidate.
    let export_path = tmp_path("e2e_export");
    export::export_records(&report.records, &export_path)?;
    let contents = std::fs::read_to_string(&export_path)?;
    std::fs::remove_file(&export_path)?;
    assert_eq!(contents.lines().count(), 3);
    Ok(())
}

#[tokio::test]
async fn test_unexpected_backend_failure_records_a_skip_reason() -> Result<()> {
    let candidates = vec![
        Candidate::new("ok one".to_string(), "first question".to_string()),
        Candidate::new("bad".to_string(), "poisoned question".to_string()),
        Candidate::new("ok two".to_string(), "third question".to_string()),
    ];

    let verifier = Verifier::new(Box::new(FlakyBackend { poison: "poisoned" }));
    let report = pipeline::verify_candidates(&verifier, candidates, 1).await;

    assert_eq!(report.records.len(), 2);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].topic, "bad");
    assert!(report.skipped[0].reason.contains("driver crashed"));
    Ok(())
}

#[tokio::test]
async fn test_soft_blocked_candidates_still_export_as_zero_results() -> Result<()> {
    let candidates = vec![Candidate::new(
        "walled off".to_string(),
        "harmless question".to_string(),
    )];

    // FlakyBackend without its poison behaves like a blocked session.
    let verifier = Verifier::new(Box::new(FlakyBackend { poison: "never" }));
    let report = pipeline::verify_candidates(&verifier, candidates, 1).await;

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].result_count, 0);
    assert!(report.skipped.is_empty());
    Ok(())
}
