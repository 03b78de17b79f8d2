/*
cargo run --release --bin split_corpus -- \
    --input-dir  augmented_outputs \
    --sft-dir    sft_data \
    --rlhf-dir   rlhf_data \
    --test-dir   test_data
*/

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use log::info;

use dpo_creator::config::{DEFAULT_SEED, DEFAULT_SPLIT_RATIOS};
use dpo_creator::logging;
use dpo_creator::PipelineError;
use dpo_creator::split::{split_dir, SplitDirs};

#[derive(Parser, Debug)]
#[command(version, about = "Shuffle every JSONL file and split it 60/38/2 into SFT / RLHF / test")]
struct Cli {
    // Directory with the source *.jsonl files
    #[arg(long, default_value = "augmented_outputs")]
    input_dir: PathBuf,

    #[arg(long, default_value = "sft_data")]
    sft_dir: PathBuf,

    #[arg(long, default_value = "rlhf_data")]
    rlhf_dir: PathBuf,

    #[arg(long, default_value = "test_data")]
    test_dir: PathBuf,

    // Shuffle seed; same seed + same file = same split
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,
}

fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let ratios = DEFAULT_SPLIT_RATIOS.validated()?;

    let log_path = logging::init(&cli.log_dir, "split_corpus")?;
    info!("Starting corpus split");
    info!("Input dir: {:?}", cli.input_dir);
    info!(
        "Ratios - SFT: {}, RLHF: {}, Test: {} (seed {})",
        ratios.sft, ratios.pref, ratios.test, cli.seed
    );

    let dirs = SplitDirs {
        sft: cli.sft_dir.clone(),
        pref: cli.rlhf_dir.clone(),
        test: cli.test_dir.clone(),
    };

    let run = match split_dir(&cli.input_dir, &dirs, &ratios, cli.seed) {
        Ok(run) => run,
        Err(PipelineError::EmptyInputDirectory(dir)) => {
            info!("No .jsonl files in {:?}, nothing to do", dir);
            println!("No .jsonl files found in {}", dir.display());
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    for (name, counts) in &run.files {
        let n = counts.total();
        println!("{name}: {n} records (skipped {})", counts.skipped);
        println!("  SFT:  {} ({:.1}%)", counts.sft, pct(counts.sft, n));
        println!("  RLHF: {} ({:.1}%)", counts.pref, pct(counts.pref, n));
        println!("  Test: {} ({:.1}%)\n", counts.test, pct(counts.test, n));
    }

    let totals = run.totals;
    let all = totals.total();
    println!("{}", "=".repeat(60));
    println!("Total SFT:  {}", totals.sft);
    println!("Total RLHF: {}", totals.pref);
    println!("Total Test: {}", totals.test);
    println!(
        "Ratio: SFT {:.1}% | RLHF {:.1}% | Test {:.1}%",
        pct(totals.sft, all),
        pct(totals.pref, all),
        pct(totals.test, all)
    );
    if !run.failed_files.is_empty() {
        println!("Failed files: {}", run.failed_files.join(", "));
    }
    println!("Log file: {:?}", log_path);
    Ok(())
}
