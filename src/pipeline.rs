use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures::StreamExt;
use nanoid::nanoid;
use tokio::process::Command;

use crate::backend;
use crate::config::PipelineConfig;
use crate::data_models::{Candidate, PipelineReport, SkippedCandidate};
use crate::export;
use crate::generation;
use crate::verifier::Verifier;

/// Upper bound on the generation worker's lifetime. Model loading dominates;
/// a wedged model server must not hang the whole run.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Drives the two phases in strict order: the generation worker runs to
/// completion and materializes its candidate artifact before any
/// verification starts.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Pipeline {
        Pipeline { config }
    }

    pub async fn run(&self) -> Result<PipelineReport> {
        fs::create_dir_all(&self.config.tmp_dir).context("creating tmp dir")?;
        fs::create_dir_all(&self.config.output_dir).context("creating output dir")?;

        let topics_file = self.config.input_dir.join("topics.txt");
        let topics = export::load_topics(&topics_file, self.config.topic_limit)?;
        anyhow::ensure!(
            !topics.is_empty(),
            "no seed topics in {}",
            topics_file.display()
        );
        log::info!("loaded {} seed topics", topics.len());

        let run_id = nanoid!(8);
        let topics_path = self.config.tmp_dir.join(format!("topics-{run_id}.json"));
        let candidates_path = self
            .config
            .tmp_dir
            .join(format!("candidates-{run_id}.json"));

        fs::write(&topics_path, serde_json::to_string(&topics)?)
            .with_context(|| format!("writing topics artifact {}", topics_path.display()))?;

        self.spawn_generation_worker(&topics_path, &candidates_path)
            .await?;

        let batch = generation::read_batch(&candidates_path)?;
        log::info!(
            "worker produced {} candidates with {} at {}",
            batch.candidates.len(),
            batch.model,
            batch.generated_at
        );

        let verifier = Verifier::new(backend::build(
            self.config.backend,
            self.config.headless,
            self.config.driver_path.clone(),
        )?);

        let report =
            verify_candidates(&verifier, batch.candidates, self.config.concurrency).await;
        log::info!(
            "verification finished: {} records, {} skipped",
            report.records.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Generation runs in a freshly spawned child process, never a thread:
    /// the model runtime only gives accelerator memory back when the process
    /// exits. Device visibility is set on the child alone.
    async fn spawn_generation_worker(&self, topics_path: &Path, out_path: &Path) -> Result<()> {
        let exe = std::env::current_exe().context("locating current executable")?;

        let mut cmd = Command::new(exe);
        cmd.arg("generate")
            .arg("--topics-file")
            .arg(topics_path)
            .arg("--out")
            .arg(out_path)
            .arg("--model-name")
            .arg(&self.config.model_name)
            .arg("--api-base")
            .arg(&self.config.api_base);
        if let Some(devices) = &self.config.devices {
            // Device indices are only stable under PCI bus ordering.
            cmd.env("CUDA_DEVICE_ORDER", "PCI_BUS_ID");
            cmd.env("CUDA_VISIBLE_DEVICES", devices);
        }

        log::info!("spawning generation worker for model {}", self.config.model_name);
        let status = tokio::time::timeout(GENERATION_TIMEOUT, cmd.status())
            .await
            .map_err(|_| anyhow!("generation worker timed out after {GENERATION_TIMEOUT:?}"))?
            .context("failed to launch generation worker")?;
        anyhow::ensure!(status.success(), "generation worker exited with {status}");
        Ok(())
    }
}

/// Verifies candidates independently; they share no mutable state, so the
/// fan-out needs no synchronization. A candidate whose backend call errors
/// is recorded as skipped and the rest proceed.
pub async fn verify_candidates(
    verifier: &Verifier,
    candidates: Vec<Candidate>,
    concurrency: usize,
) -> PipelineReport {
    let outcomes: Vec<_> = futures::stream::iter(candidates)
        .map(|candidate| async move {
            let outcome = verifier.verify(&candidate.generated_query).await;
            (candidate, outcome)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut report = PipelineReport::default();
    for (candidate, outcome) in outcomes {
        match outcome {
            Ok(record) => report.records.push(record),
            Err(e) => {
                log::error!(
                    "skipping candidate for topic {:?}: {e:#}",
                    candidate.topic
                );
                report.skipped.push(SkippedCandidate {
                    topic: candidate.topic,
                    generated_query: candidate.generated_query,
                    reason: format!("{e:#}"),
                });
            }
        }
    }
    report
}
