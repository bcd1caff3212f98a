use std::env;
use std::path::PathBuf;

use crate::backend::BackendKind;

/// Environment variable holding the SerpApi credential.
pub const SERPAPI_KEY_VAR: &str = "SERPAPI_KEY";

/// Environment variable for the OpenAI-compatible generation endpoint key.
/// Local vLLM servers accept any non-empty value.
pub const GENERATION_KEY_VAR: &str = "GENERATION_API_KEY";

/// Settings for one pipeline run. Built from CLI arguments in main; nothing
/// here mutates process-global state (device visibility is applied to the
/// worker child's environment only).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub model_name: String,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub backend: BackendKind,
    pub headless: bool,
    pub driver_path: Option<PathBuf>,
    /// Base URL of the OpenAI-compatible generation server.
    pub api_base: String,
    /// Value for CUDA_VISIBLE_DEVICES on the generation worker, if set.
    pub devices: Option<String>,
    /// How many candidates to verify at once.
    pub concurrency: usize,
    /// Cap on the number of seed topics read from the input file.
    pub topic_limit: usize,
}

pub fn get_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
