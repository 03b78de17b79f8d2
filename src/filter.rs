//! Near-duplicate filter for chosen/rejected pairs.
//!
//! Each pair is classified on its own, first match wins:
//! 1. `identical`: trimmed texts are byte-equal (no embedding calls),
//! 2. `too_similar`: cosine of the two embeddings is above the threshold,
//! 3. `kept`: everything else, written back unchanged.

use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use serde::Serialize;

use crate::config::STATS_FILE;
use crate::embed::{cosine_similarity, Embedder};
use crate::error::{PipelineError, Result};
use crate::generate::GeneratedRejection;
use crate::jsonl::{file_name, read_jsonl, require_jsonl_files, write_jsonl};
use crate::progress::file_bar;
use crate::stats::{FileStats, RunStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterVerdict {
    Identical,
    TooSimilar,
    Kept,
}

impl FilterVerdict {
    pub fn is_kept(self) -> bool {
        self == FilterVerdict::Kept
    }
}

/// Cosine similarity of the two texts' unit embeddings.
///
/// Blank text on either side scores 0.0 and nothing is embedded.
pub async fn pair_similarity(embedder: &dyn Embedder, chosen: &str, rejected: &str) -> Result<f32> {
    if chosen.trim().is_empty() || rejected.trim().is_empty() {
        return Ok(0.0);
    }
    let a = embedder.embed_normalized(chosen).await?;
    let b = embedder.embed_normalized(rejected).await?;
    if a.len() != b.len() {
        return Err(PipelineError::Embedding(format!(
            "dimension mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(cosine_similarity(&a, &b))
}

pub async fn classify_pair(
    embedder: &dyn Embedder,
    pair: &GeneratedRejection,
    max_similarity: f32,
) -> Result<FilterVerdict> {
    if pair.chosen.trim() == pair.rejected.trim() {
        return Ok(FilterVerdict::Identical);
    }
    let similarity = pair_similarity(embedder, &pair.chosen, &pair.rejected).await?;
    debug!("similarity {similarity:.4} for input {:?}", truncate(&pair.input, 60));
    if similarity > max_similarity {
        Ok(FilterVerdict::TooSimilar)
    } else {
        Ok(FilterVerdict::Kept)
    }
}

/// Classify every pair, tally into `stats`, return the kept ones in order.
pub async fn filter_pairs(
    embedder: &dyn Embedder,
    pairs: Vec<GeneratedRejection>,
    max_similarity: f32,
    stats: &mut FileStats,
    bar: &ProgressBar,
) -> Result<Vec<GeneratedRejection>> {
    let mut kept = Vec::with_capacity(pairs.len());
    for pair in pairs {
        let verdict = classify_pair(embedder, &pair, max_similarity).await?;
        stats.record(verdict);
        if verdict.is_kept() {
            kept.push(pair);
        }
        bar.inc(1);
    }
    Ok(kept)
}

/// Filter one pair file into `out_dir` under the same name.
///
/// Counts are only returned once the whole file has been classified and
/// written; a failure part way leaves no output and no counts for it.
pub async fn filter_file(
    embedder: &dyn Embedder,
    path: &Path,
    out_dir: &Path,
    max_similarity: f32,
    bar: &ProgressBar,
) -> Result<FileStats> {
    let loaded = read_jsonl::<GeneratedRejection>(path)?;
    if loaded.skipped > 0 {
        debug!("{}: {} malformed lines skipped", path.display(), loaded.skipped);
    }
    bar.set_length(loaded.rows.len() as u64);

    let mut stats = FileStats::default();
    let kept = filter_pairs(embedder, loaded.rows, max_similarity, &mut stats, bar).await?;
    write_jsonl(&out_dir.join(file_name(path)), &kept)?;

    info!(
        "{}: total={} kept={} identical={} too_similar={}",
        path.display(),
        stats.total(),
        stats.kept,
        stats.identical,
        stats.too_similar
    );
    Ok(stats)
}

/// Filter every `*.jsonl` file in `input_dir` into `out_dir`, then write
/// `filter_stats.json` there.
///
/// The stats file is written once, after every file has been tried. Files
/// that fail are logged and listed under `failed_files` with no counts; the
/// rest of the run carries on. An empty directory is
/// [`PipelineError::EmptyInputDirectory`] and nothing is created.
pub async fn filter_dir(
    embedder: &dyn Embedder,
    input_dir: &Path,
    out_dir: &Path,
    max_similarity: f32,
    style: Option<&ProgressStyle>,
) -> Result<RunStats> {
    let files = require_jsonl_files(input_dir)?;
    std::fs::create_dir_all(out_dir).map_err(|e| PipelineError::io(out_dir, e))?;

    let mut run = RunStats::new();
    for path in &files {
        let name = file_name(path);
        let bar = file_bar(style, name.clone());
        match filter_file(embedder, path, out_dir, max_similarity, &bar).await {
            Ok(stats) => {
                bar.finish_and_clear();
                run.add_file(name, stats);
            }
            Err(e) => {
                bar.abandon();
                error!("{name}: {e}");
                run.add_failure(name);
            }
        }
    }

    run.write(&out_dir.join(STATS_FILE), max_similarity, embedder.model_name())?;
    info!(
        "Filter finished: total={} kept={} filtered={} failed_files={}",
        run.total(),
        run.kept(),
        run.filtered(),
        run.failed_files().len()
    );
    Ok(run)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
