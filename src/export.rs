use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::data_models::VerificationRecord;

/// Loads seed topics: one per line, blank lines and `#` comments skipped,
/// capped at `limit`.
pub fn load_topics(path: &Path, limit: usize) -> Result<Vec<String>> {
    let file =
        File::open(path).with_context(|| format!("opening topics file {}", path.display()))?;

    let mut topics = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        let topic = line.trim();
        if topic.is_empty() || topic.starts_with('#') {
            continue;
        }
        topics.push(topic.to_string());
        if topics.len() >= limit {
            break;
        }
    }
    Ok(topics)
}

/// Writes the final tabular result set, one JSON line per verified
/// candidate.
pub fn export_records(records: &[VerificationRecord], path: &Path) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating export file {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, record).context("serializing verification record")?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
