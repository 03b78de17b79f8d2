/*
cargo run --release --bin gen_rejections -- \
    --rlhf-data-dir   rlhf_data \
    --output-dir      dpo_data \
    --base-model-name meta-llama/Llama-3.1-8B-Instruct \
    --endpoint        http://localhost:8000/v1/completions \
    --batch-size      32 \
    --limit-data      2000
*/

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use indicatif::ProgressStyle;
use log::info;

use dpo_creator::config::{
    API_KEY_ENV, DEFAULT_BASE_MODEL, DEFAULT_BATCH_SIZE, DEFAULT_COMPLETIONS_URL, DEFAULT_SEED,
};
use dpo_creator::engine::CompletionsEngine;
use dpo_creator::generate::{generate_dir, GenerateOptions};
use dpo_creator::logging;
use dpo_creator::PipelineError;

#[derive(Parser, Debug)]
#[command(version, about = "Generate rejected answers for RLHF prompts with batched sampling")]
struct Cli {
    // Directory with the rlhf_*.jsonl files produced by split_corpus
    #[arg(long, default_value = "rlhf_data")]
    rlhf_data_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_BASE_MODEL)]
    base_model_name: String,

    #[arg(long, default_value = "dpo_data")]
    output_dir: PathBuf,

    // Prompts per inference request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    // Random subset per file (seeded); all records when omitted
    #[arg(long)]
    limit_data: Option<usize>,

    // OpenAI-compatible completions endpoint serving the base model
    #[arg(long, default_value = DEFAULT_COMPLETIONS_URL)]
    endpoint: String,

    #[arg(long = "api-key", env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    // Per-request timeout in seconds
    #[arg(long, default_value_t = 600)]
    timeout_secs: u64,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ensure!(cli.batch_size > 0, "--batch-size must be at least 1");

    let log_path = logging::init(&cli.log_dir, "gen_rejections")?;
    info!("Starting rejection generation. Model: {}", cli.base_model_name);

    let engine = CompletionsEngine::new(
        cli.endpoint.clone(),
        cli.base_model_name.clone(),
        cli.api_key.as_deref(),
        Duration::from_secs(cli.timeout_secs),
    )
    .context("building inference client")?;

    let opts = GenerateOptions {
        batch_size: cli.batch_size,
        limit: cli.limit_data,
        seed: DEFAULT_SEED,
        ..GenerateOptions::default()
    };
    info!("Sampling: {:?}", opts.params);

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )?
    .progress_chars("=>-");

    let result = generate_dir(
        &engine,
        &cli.rlhf_data_dir,
        &cli.output_dir,
        &opts,
        Some(&style),
    )
    .await;
    let run = match result {
        Ok(run) => run,
        Err(PipelineError::EmptyInputDirectory(dir)) => {
            info!("No .jsonl files in {:?}", dir);
            println!("No .jsonl files found in {}", dir.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for outcome in &run.outcomes {
        println!(
            "saved {} pairs → {} ({} records dropped on load)",
            outcome.written,
            outcome.output_path.display(),
            outcome.dropped
        );
    }

    let meta = &run.meta;
    println!("\n{}", "=".repeat(60));
    println!("Output dir : {}", cli.output_dir.display());
    println!("Total      : {} pairs from {} files", meta.total_samples, meta.total_files);
    if !meta.failed_files.is_empty() {
        println!("Failed     : {}", meta.failed_files.join(", "));
    }
    println!("Meta       : {}", run.meta_path.display());
    println!("Log file   : {:?}", log_path);
    Ok(())
}
