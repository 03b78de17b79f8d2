/*
cargo run --release --bin filter_pairs -- \
    --input-dir          dpo_data \
    --output-dir         dpo_data_filtered \
    --max-similarity     0.85 \
    --embedding-endpoint http://localhost:8080/v1/embeddings
*/

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use indicatif::ProgressStyle;
use log::info;

use dpo_creator::config::{
    API_KEY_ENV, DEFAULT_EMBEDDINGS_URL, DEFAULT_EMBEDDING_MODEL, DEFAULT_MAX_SIMILARITY,
    STATS_FILE,
};
use dpo_creator::embed::ApiEmbedder;
use dpo_creator::filter::filter_dir;
use dpo_creator::logging;
use dpo_creator::PipelineError;

#[derive(Parser, Debug)]
#[command(version, about = "Drop DPO pairs whose chosen and rejected answers are too similar")]
struct Cli {
    // Directory with DPO *.jsonl files (input / chosen / rejected)
    #[arg(long)]
    input_dir: PathBuf,

    // Filtered files and filter_stats.json go here
    #[arg(long)]
    output_dir: PathBuf,

    // Pairs with cosine similarity above this are dropped (lower = stricter)
    #[arg(long, default_value_t = DEFAULT_MAX_SIMILARITY)]
    max_similarity: f32,

    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    embedding_model: String,

    // OpenAI-compatible embeddings endpoint
    #[arg(long, default_value = DEFAULT_EMBEDDINGS_URL)]
    embedding_endpoint: String,

    #[arg(long = "api-key", env = API_KEY_ENV, hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ensure!(
        (-1.0..=1.0).contains(&cli.max_similarity),
        "--max-similarity must be within [-1, 1], got {}",
        cli.max_similarity
    );

    let log_path = logging::init(&cli.log_dir, "filter_pairs")?;
    info!("Input dir: {:?}", cli.input_dir);
    info!("Output dir: {:?}", cli.output_dir);
    info!("Max similarity: {}", cli.max_similarity);

    let embedder = ApiEmbedder::new(
        cli.embedding_endpoint.clone(),
        cli.embedding_model.clone(),
        cli.api_key.as_deref(),
        Duration::from_secs(cli.timeout_secs),
    )
    .context("building embedding client")?;

    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    )?
    .progress_chars("=>-");

    let result = filter_dir(
        &embedder,
        &cli.input_dir,
        &cli.output_dir,
        cli.max_similarity,
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

    for (name, stats) in run.files() {
        println!(
            "{name}: original {} | kept {} | filtered {}",
            stats.total(),
            stats.kept,
            stats.filtered()
        );
        println!("  - identical: {}", stats.identical);
        println!("  - similarity > {}: {}\n", cli.max_similarity, stats.too_similar);
    }

    run.print_summary(cli.max_similarity);
    println!("\nStats written to : {}", cli.output_dir.join(STATS_FILE).display());
    println!("Filtered data in : {}", cli.output_dir.display());
    if !run.is_complete() {
        println!("Failed files     : see {:?}", log_path);
    }
    Ok(())
}
