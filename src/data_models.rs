use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One organic search result, in the uniform shape every backend returns.
///
/// `position` is the 1-based rank as encountered during extraction. It is
/// assigned by us, not taken from the page, so it stays contiguous even when
/// malformed result elements get skipped.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub position: u32,
    pub title: String,
    pub link: Option<String>,
    pub snippet: String,
}

/// Uniform response contract for all search backends.
///
/// A soft block (captcha wall, results never loading) is encoded as an empty
/// response rather than an error.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct SearchResponse {
    pub organic_results: Vec<SearchResult>,
    pub ai_overview: String,
}

impl SearchResponse {
    pub fn empty() -> SearchResponse {
        SearchResponse::default()
    }
}

/// Outcome of verifying a single candidate query. Derived from a
/// `SearchResponse` plus the originating prompt, never cached.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VerificationRecord {
    pub prompt: String,
    pub result_count: usize,
    pub analysis: String,
}

/// A generated query awaiting verification. Immutable once generated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub topic: String,
    pub generated_query: String,
}

impl Candidate {
    pub fn new(topic: String, generated_query: String) -> Candidate {
        Candidate {
            topic,
            generated_query,
        }
    }
}

/// The durable artifact the generation worker hands back to the pipeline.
/// Written as JSON by the worker process, read back by the orchestrator.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CandidateBatch {
    pub model: String,
    pub generated_at: DateTime<Utc>,
    pub candidates: Vec<Candidate>,
}

impl CandidateBatch {
    pub fn new(model: String, candidates: Vec<Candidate>) -> CandidateBatch {
        CandidateBatch {
            model,
            generated_at: Utc::now(),
            candidates,
        }
    }
}

/// A candidate dropped from the export because its backend call failed
/// unexpectedly (driver crash, transport error). Soft blocks never land
/// here; they verify as zero results.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SkippedCandidate {
    pub topic: String,
    pub generated_query: String,
    pub reason: String,
}

/// Everything a pipeline run produced.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub records: Vec<VerificationRecord>,
    pub skipped: Vec<SkippedCandidate>,
}
