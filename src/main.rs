use std::path::PathBuf;

use clap::{Parser, Subcommand};

use quarry::backend::{self, BackendKind};
use quarry::config::PipelineConfig;
use quarry::export;
use quarry::generation;
use quarry::pipeline::Pipeline;
use quarry::verifier::Verifier;

#[derive(Parser, Debug)]
#[command(name = "quarry")]
#[command(about = "Generate obscure candidate queries from seed topics and verify them via web search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full generate-then-verify pipeline
    Run {
        /// Directory holding topics.txt (one seed topic per line)
        #[arg(long, default_value = "data")]
        input_dir: PathBuf,
        /// Directory for the verified-queries export
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
        /// Directory for intermediate artifacts
        #[arg(long, default_value = "data")]
        tmp_dir: PathBuf,
        /// Model served by the generation endpoint
        #[arg(long, default_value = "meta-llama/Llama-3.1-70B-Instruct")]
        model_name: String,
        /// Base URL of the OpenAI-compatible generation server
        #[arg(long, default_value = "http://localhost:8000/v1")]
        api_base: String,
        /// CUDA_VISIBLE_DEVICES value for the generation worker
        #[arg(long)]
        devices: Option<String>,
        /// Search backend used for verification
        #[arg(long, value_enum, default_value = "serpapi")]
        backend: BackendKind,
        /// Run browser backends with a visible window
        #[arg(long)]
        headed: bool,
        /// Chrome executable path for the blocking browser backend
        #[arg(long)]
        driver_path: Option<PathBuf>,
        /// How many candidates to verify at once
        #[arg(long, default_value_t = 1)]
        concurrency: usize,
        /// Cap on seed topics read from the input file
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Verify a single query against a search backend
    Verify {
        #[arg(long)]
        query: String,
        #[arg(long, value_enum, default_value = "serpapi")]
        backend: BackendKind,
        /// Run browser backends with a visible window
        #[arg(long)]
        headed: bool,
        #[arg(long)]
        driver_path: Option<PathBuf>,
    },
    /// Generation worker entry point, spawned by `run`
    #[command(hide = true)]
    Generate {
        #[arg(long)]
        topics_file: PathBuf,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        model_name: String,
        #[arg(long)]
        api_base: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber (handles both tracing and log crate)
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(true)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            input_dir,
            output_dir,
            tmp_dir,
            model_name,
            api_base,
            devices,
            backend,
            headed,
            driver_path,
            concurrency,
            limit,
        } => {
            let config = PipelineConfig {
                model_name,
                input_dir,
                output_dir: output_dir.clone(),
                tmp_dir,
                backend,
                headless: !headed,
                driver_path,
                api_base,
                devices,
                concurrency,
                topic_limit: limit,
            };

            let report = Pipeline::new(config).run().await?;

            let export_path = output_dir.join("verified_queries.jsonl");
            export::export_records(&report.records, &export_path)?;
            println!(
                "Saved {} verified queries to {} ({} skipped)",
                report.records.len(),
                export_path.display(),
                report.skipped.len()
            );
        }
        Command::Verify {
            query,
            backend,
            headed,
            driver_path,
        } => {
            let verifier = Verifier::new(backend::build(backend, !headed, driver_path)?);
            let record = verifier.verify(&query).await?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Command::Generate {
            topics_file,
            out,
            model_name,
            api_base,
        } => {
            generation::run_worker(&topics_file, &out, &model_name, &api_base).await?;
        }
    }
    Ok(())
}
