//! Rejected-answer generation and chosen/rejected pair building.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{SamplingParams, DEFAULT_BATCH_SIZE, DEFAULT_SEED, META_FILE};
use crate::engine::InferenceEngine;
use crate::error::{PipelineError, Result};
use crate::jsonl::{file_name, read_jsonl, require_jsonl_files, write_json_pretty, write_jsonl};
use crate::progress::file_bar;
use crate::template::ChatTemplate;

/// A prompt with its known-good answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferenceCandidate {
    pub input: String,
    pub output: String,
}

impl PreferenceCandidate {
    /// `None` unless both `input` and `output` are non-empty strings.
    pub fn from_record(record: &Map<String, Value>) -> Option<Self> {
        let input = record.get("input")?.as_str()?;
        let output = record.get("output")?.as_str()?;
        if input.is_empty() || output.is_empty() {
            return None;
        }
        Some(Self {
            input: input.to_string(),
            output: output.to_string(),
        })
    }
}

/// One preference pair. Fields the pipeline does not know about are carried
/// through untouched when a pair file is read back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedRejection {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub chosen: String,
    #[serde(default)]
    pub rejected: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GeneratedRejection {
    pub fn new(
        input: impl Into<String>,
        chosen: impl Into<String>,
        rejected: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            chosen: chosen.into(),
            rejected: rejected.into(),
            extra: Map::new(),
        }
    }
}

/// Candidates from one file, plus how many records were dropped.
#[derive(Debug, Default)]
pub struct LoadedCandidates {
    pub candidates: Vec<PreferenceCandidate>,
    /// Unparseable lines.
    pub malformed: usize,
    /// Parsed records without a usable `input` / `output`.
    pub incomplete: usize,
}

pub fn load_candidates(path: &Path) -> Result<LoadedCandidates> {
    let loaded = read_jsonl::<Map<String, Value>>(path)?;
    let total = loaded.rows.len();
    let candidates: Vec<_> = loaded
        .rows
        .iter()
        .filter_map(PreferenceCandidate::from_record)
        .collect();
    Ok(LoadedCandidates {
        incomplete: total - candidates.len(),
        candidates,
        malformed: loaded.skipped,
    })
}

/// Seeded random subset of `limit` candidates; everything when `limit` is
/// `None` or not smaller than the input.
pub fn sample_candidates(
    candidates: Vec<PreferenceCandidate>,
    limit: Option<usize>,
    seed: u64,
) -> Vec<PreferenceCandidate> {
    match limit {
        Some(limit) if limit < candidates.len() => {
            let mut rng = StdRng::seed_from_u64(seed);
            let picked = rand::seq::index::sample(&mut rng, candidates.len(), limit);
            picked.into_iter().map(|i| candidates[i].clone()).collect()
        }
        _ => candidates,
    }
}

/// Rejections for one candidate list, in input order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Generated {
    pub rejections: Vec<String>,
    /// Completions without the assistant marker (raw text used as the answer).
    pub marker_misses: usize,
    /// Slots where the engine returned no completion at all.
    pub empty_slots: usize,
    pub batches: usize,
}

/// Run every candidate input through `engine`, `batch_size` at a time.
///
/// One engine call per chunk, chunks strictly in sequence. Only the first
/// completion of each slot is used. An engine error aborts the whole list; an
/// engine answer of the wrong length is treated the same way.
pub async fn generate_rejections(
    engine: &dyn InferenceEngine,
    template: &ChatTemplate,
    candidates: &[PreferenceCandidate],
    batch_size: usize,
    params: &SamplingParams,
    bar: &ProgressBar,
) -> Result<Generated> {
    let mut out = Generated {
        rejections: Vec::with_capacity(candidates.len()),
        ..Generated::default()
    };

    for chunk in candidates.chunks(batch_size.max(1)) {
        let prompts: Vec<String> = chunk.iter().map(|c| template.render(&c.input)).collect();
        let outputs = engine.generate(&prompts, params).await?;
        out.batches += 1;

        if outputs.len() != prompts.len() {
            return Err(PipelineError::Generation(format!(
                "engine {} returned {} outputs for {} prompts",
                engine.name(),
                outputs.len(),
                prompts.len()
            )));
        }

        for output in &outputs {
            match output.first() {
                Some(raw) => {
                    let extracted = template.extract(raw);
                    if !extracted.marker_found {
                        out.marker_misses += 1;
                    }
                    out.rejections.push(extracted.text);
                }
                None => {
                    out.empty_slots += 1;
                    out.rejections.push(String::new());
                }
            }
        }
        bar.inc(chunk.len() as u64);
    }
    Ok(out)
}

/// Zip candidates with their generated rejections, order preserved.
pub fn build_pairs(
    candidates: &[PreferenceCandidate],
    rejections: Vec<String>,
) -> Vec<GeneratedRejection> {
    debug_assert_eq!(candidates.len(), rejections.len());
    candidates
        .iter()
        .zip(rejections)
        .map(|(c, rejected)| GeneratedRejection::new(c.input.clone(), c.output.clone(), rejected))
        .collect()
}

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub batch_size: usize,
    pub limit: Option<usize>,
    pub seed: u64,
    pub params: SamplingParams,
    pub template: ChatTemplate,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            limit: None,
            seed: DEFAULT_SEED,
            params: SamplingParams::default(),
            template: ChatTemplate::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub output_path: PathBuf,
    pub written: usize,
    pub dropped: usize,
    pub marker_misses: usize,
}

/// Load, cap, generate and write the pair file for one source file. The
/// output keeps the source's file name. Nothing is written if generation
/// fails part way.
pub async fn generate_file(
    engine: &dyn InferenceEngine,
    path: &Path,
    out_dir: &Path,
    opts: &GenerateOptions,
    bar: &ProgressBar,
) -> Result<FileOutcome> {
    let loaded = load_candidates(path)?;
    let dropped = loaded.malformed + loaded.incomplete;
    let candidates = sample_candidates(loaded.candidates, opts.limit, opts.seed);
    info!(
        "{}: {} candidates ({} dropped on load)",
        path.display(),
        candidates.len(),
        dropped
    );

    bar.set_length(candidates.len() as u64);
    let generated = generate_rejections(
        engine,
        &opts.template,
        &candidates,
        opts.batch_size,
        &opts.params,
        bar,
    )
    .await?;

    if generated.marker_misses > 0 {
        warn!(
            "{}: {}/{} completions had no {:?} marker; raw text kept as the rejected answer",
            path.display(),
            generated.marker_misses,
            candidates.len(),
            opts.template.assistant_marker
        );
    }
    if generated.empty_slots > 0 {
        warn!(
            "{}: {} prompts came back without a completion",
            path.display(),
            generated.empty_slots
        );
    }

    let pairs = build_pairs(&candidates, generated.rejections);
    let output_path = out_dir.join(file_name(path));
    write_jsonl(&output_path, &pairs)?;

    Ok(FileOutcome {
        output_path,
        written: pairs.len(),
        dropped,
        marker_misses: generated.marker_misses,
    })
}

/// Contents of `meta.json` written at the end of a generation run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationMeta {
    pub base_model: String,
    pub total_files: usize,
    pub total_samples: usize,
    pub batch_size: usize,
    pub limit_data: Option<usize>,
    pub source_dir: PathBuf,
    pub sampling: SamplingParams,
    pub failed_files: Vec<String>,
}

/// Outcome of a whole-directory generation run.
#[derive(Debug, Clone)]
pub struct GenerationRun {
    pub outcomes: Vec<FileOutcome>,
    pub meta: GenerationMeta,
    pub meta_path: PathBuf,
}

/// Generate pair files for every `*.jsonl` file in `input_dir`, then write
/// `meta.json` into `out_dir`.
///
/// Files are handled in name order. A file whose generation fails is logged,
/// gets no output and is listed in `failed_files`; later files still run. An
/// empty directory is [`PipelineError::EmptyInputDirectory`] and nothing is
/// written.
pub async fn generate_dir(
    engine: &dyn InferenceEngine,
    input_dir: &Path,
    out_dir: &Path,
    opts: &GenerateOptions,
    style: Option<&ProgressStyle>,
) -> Result<GenerationRun> {
    let files = require_jsonl_files(input_dir)?;

    let mut outcomes = Vec::with_capacity(files.len());
    let mut failed_files = Vec::new();
    for path in &files {
        let name = file_name(path);
        let bar = file_bar(style, name.clone());
        match generate_file(engine, path, out_dir, opts, &bar).await {
            Ok(outcome) => {
                bar.finish_and_clear();
                outcomes.push(outcome);
            }
            Err(e) => {
                bar.abandon();
                error!("{name}: {e}");
                failed_files.push(name);
            }
        }
    }

    let meta = GenerationMeta {
        base_model: engine.name().to_string(),
        total_files: files.len(),
        total_samples: outcomes.iter().map(|o| o.written).sum(),
        batch_size: opts.batch_size,
        limit_data: opts.limit,
        source_dir: input_dir.to_path_buf(),
        sampling: opts.params.clone(),
        failed_files,
    };
    let meta_path = out_dir.join(META_FILE);
    write_json_pretty(&meta_path, &meta)?;
    info!(
        "Generation finished: {} pairs, {} failed files",
        meta.total_samples,
        meta.failed_files.len()
    );

    Ok(GenerationRun {
        outcomes,
        meta,
        meta_path,
    })
}
