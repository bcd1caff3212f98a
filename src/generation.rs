use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;

use crate::config::{self, GENERATION_KEY_VAR};
use crate::data_models::{Candidate, CandidateBatch};

/// Marker the model is instructed to put in front of the final question.
pub const OUTPUT_MARKER: &str = "###output:";

/// Prompt asking the model for one obscure-but-verifiable question on a
/// seed topic.
pub fn question_prompt(topic: &str) -> String {
    format!(
        r#"Given the seed topic: "{topic}", create a single question that:

1. Is Not Well-Known:
   - The question should be obscure enough that the correct answer is unlikely to appear as the first search result.

2. Appears Conflicting or Ambiguous on the Surface:
   - There may be multiple conflicting or misleading sources online.

3. Has a Single, Correct Answer:
   - The question should have only one officially recognized or verifiable answer.

4. Requires Multi-Step or Layered Reasoning:
   - It's not answered by a simple fact lookup; the question might reference official designations, historical records, or particular certifications that aren't widely known.

5. Is Grammatically Natural:
   - The question should read like something a curious person would genuinely ask.

6. Is Supported by Written Articles:
   - The answer should be corroborated by at least one credible or official source, even if it doesn't appear at the top of search results.

Output Format:
Provide the final question in a single sentence, keeping it clear and specific. {OUTPUT_MARKER} <question>"#
    )
}

/// The text-in/text-out generation seam: one topic in, one question out.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    async fn generate_query(&self, topic: &str) -> Result<String>;
}

/// Generator over any OpenAI-compatible chat endpoint. Pointing `api_base`
/// at a local vLLM server is the intended deployment; those accept any
/// non-empty API key.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    pub fn new(api_base: &str, model: &str) -> OpenAiGenerator {
        let api_key =
            config::get_env(GENERATION_KEY_VAR).unwrap_or_else(|| "unused".to_string());
        let config = OpenAIConfig::new()
            .with_api_base(api_base)
            .with_api_key(api_key);
        OpenAiGenerator {
            client: Client::with_config(config),
            model: model.to_string(),
        }
    }

    /// The model echoes the template before answering often enough that only
    /// the text after the last marker is trustworthy.
    fn extract_question(raw: &str) -> String {
        match raw.rfind(OUTPUT_MARKER) {
            Some(idx) => raw[idx + OUTPUT_MARKER.len()..].trim().to_string(),
            None => raw.trim().to_string(),
        }
    }
}

#[async_trait]
impl QueryGenerator for OpenAiGenerator {
    async fn generate_query(&self, topic: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(question_prompt(topic))
                .build()?
                .into()])
            .max_tokens(200u32)
            .top_p(0.9)
            .build()?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("chat completion request failed")?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("generation returned no content for topic {topic:?}"))?;

        Ok(Self::extract_question(&content))
    }
}

/// Produces one candidate per topic, in order. Any generation failure aborts
/// the batch; a partial artifact is worse than a loud worker exit.
pub async fn generate_batch(
    generator: &dyn QueryGenerator,
    model: &str,
    topics: Vec<String>,
) -> Result<CandidateBatch> {
    let mut candidates = Vec::with_capacity(topics.len());
    for topic in topics {
        let generated_query = generator
            .generate_query(&topic)
            .await
            .with_context(|| format!("generating candidate for topic {topic:?}"))?;
        log::info!("generated candidate for {topic:?}: {generated_query}");
        candidates.push(Candidate::new(topic, generated_query));
    }
    Ok(CandidateBatch::new(model.to_string(), candidates))
}

pub fn write_batch(batch: &CandidateBatch, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("creating candidate artifact {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), batch).context("serializing candidate batch")?;
    Ok(())
}

pub fn read_batch(path: &Path) -> Result<CandidateBatch> {
    let file = File::open(path)
        .with_context(|| format!("opening candidate artifact {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file)).context("decoding candidate batch")
}

/// Worker-process body. Runs inside the child spawned by the pipeline;
/// everything the orchestrator needs back goes through the artifact file.
pub async fn run_worker(
    topics_path: &Path,
    out_path: &Path,
    model: &str,
    api_base: &str,
) -> Result<()> {
    let raw = std::fs::read_to_string(topics_path)
        .with_context(|| format!("reading topics artifact {}", topics_path.display()))?;
    let topics: Vec<String> = serde_json::from_str(&raw).context("decoding topics artifact")?;

    log::info!(
        "generation worker starting: {} topics against {model} at {api_base}",
        topics.len()
    );

    let generator = OpenAiGenerator::new(api_base, model);
    let batch = generate_batch(&generator, model, topics).await?;
    write_batch(&batch, out_path)?;

    log::info!(
        "generation worker done: {} candidates written to {}",
        batch.candidates.len(),
        out_path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_question_takes_text_after_last_marker() {
        let raw = format!(
            "Some preamble echoing the template {OUTPUT_MARKER} <question> \
             then the real one. {OUTPUT_MARKER} Which bridge was first?  "
        );
        assert_eq!(
            OpenAiGenerator::extract_question(&raw),
            "Which bridge was first?"
        );
    }

    #[test]
    fn test_extract_question_without_marker_trims_whole_reply() {
        assert_eq!(
            OpenAiGenerator::extract_question("  Which bridge was first?\n"),
            "Which bridge was first?"
        );
    }

    #[test]
    fn test_prompt_mentions_topic_and_marker() {
        let prompt = question_prompt("boston theaters");
        assert!(prompt.contains("\"boston theaters\""));
        assert!(prompt.contains(OUTPUT_MARKER));
    }
}
