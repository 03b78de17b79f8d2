//! Corpus splitter: seeded shuffle, then an SFT / preference / test cut.

use std::path::{Path, PathBuf};

use log::{error, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde_json::{Map, Value};

use crate::config::{SplitRatios, PREF_PREFIX, SFT_PREFIX, TEST_PREFIX};
use crate::error::Result;
use crate::jsonl::{file_name, read_jsonl, require_jsonl_files, write_jsonl};

/// The three disjoint slices of one record set.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusSplit<T> {
    pub sft: Vec<T>,
    pub pref: Vec<T>,
    pub test: Vec<T>,
}

impl<T> CorpusSplit<T> {
    pub fn len(&self) -> usize {
        self.sft.len() + self.pref.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `c1 = floor(n * sft)`, `c2 = floor(n * (sft + pref))`, both clamped to `n`.
pub fn cut_points(n: usize, ratios: &SplitRatios) -> (usize, usize) {
    let c1 = ((n as f64 * ratios.sft).floor() as usize).min(n);
    let c2 = ((n as f64 * (ratios.sft + ratios.pref)).floor() as usize).clamp(c1, n);
    (c1, c2)
}

/// Shuffle `records` with a `seed`-ed RNG and cut them at [`cut_points`].
///
/// Order inside each slice is the shuffled order. With the same seed and the
/// same input order the result is identical. For small inputs the test slice
/// may be empty.
pub fn split_records<T>(mut records: Vec<T>, ratios: &SplitRatios, seed: u64) -> CorpusSplit<T> {
    let mut rng = StdRng::seed_from_u64(seed);
    records.shuffle(&mut rng);

    let (c1, c2) = cut_points(records.len(), ratios);
    let test = records.split_off(c2);
    let pref = records.split_off(c1);
    CorpusSplit {
        sft: records,
        pref,
        test,
    }
}

/// Where each slice of a source file is written.
#[derive(Debug, Clone)]
pub struct SplitDirs {
    pub sft: PathBuf,
    pub pref: PathBuf,
    pub test: PathBuf,
}

impl SplitDirs {
    /// Output paths for a source file called `name`.
    pub fn targets(&self, name: &str) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.sft.join(format!("{SFT_PREFIX}{name}")),
            self.pref.join(format!("{PREF_PREFIX}{name}")),
            self.test.join(format!("{TEST_PREFIX}{name}")),
        )
    }
}

/// Slice sizes for one file, plus malformed lines dropped on load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SplitCounts {
    pub sft: usize,
    pub pref: usize,
    pub test: usize,
    pub skipped: usize,
}

impl SplitCounts {
    pub fn total(&self) -> usize {
        self.sft + self.pref + self.test
    }

    pub fn add(&mut self, other: &SplitCounts) {
        self.sft += other.sft;
        self.pref += other.pref;
        self.test += other.test;
        self.skipped += other.skipped;
    }
}

/// Split one JSONL file and write its three prefixed outputs.
pub fn split_file(
    path: &Path,
    dirs: &SplitDirs,
    ratios: &SplitRatios,
    seed: u64,
) -> Result<SplitCounts> {
    let loaded = read_jsonl::<Map<String, Value>>(path)?;
    let split = split_records(loaded.rows, ratios, seed);

    let name = file_name(path);
    let (sft_path, pref_path, test_path) = dirs.targets(&name);
    write_jsonl(&sft_path, &split.sft)?;
    write_jsonl(&pref_path, &split.pref)?;
    write_jsonl(&test_path, &split.test)?;

    let counts = SplitCounts {
        sft: split.sft.len(),
        pref: split.pref.len(),
        test: split.test.len(),
        skipped: loaded.skipped,
    };
    info!(
        "{name}: sft={} pref={} test={} (skipped {})",
        counts.sft, counts.pref, counts.test, counts.skipped
    );
    Ok(counts)
}

/// Outcome of splitting a whole input directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitRun {
    /// Successfully split files, in processing order.
    pub files: Vec<(String, SplitCounts)>,
    pub totals: SplitCounts,
    pub failed_files: Vec<String>,
}

/// Split every `*.jsonl` file in `input_dir`.
///
/// A file that cannot be read or written is logged and listed in
/// `failed_files`; the other files are still split. An empty directory is
/// [`PipelineError::EmptyInputDirectory`](crate::error::PipelineError) and
/// nothing is written.
pub fn split_dir(
    input_dir: &Path,
    dirs: &SplitDirs,
    ratios: &SplitRatios,
    seed: u64,
) -> Result<SplitRun> {
    let files = require_jsonl_files(input_dir)?;

    let mut run = SplitRun::default();
    for path in &files {
        let name = file_name(path);
        match split_file(path, dirs, ratios, seed) {
            Ok(counts) => {
                run.totals.add(&counts);
                run.files.push((name, counts));
            }
            Err(e) => {
                error!("{name}: {e}");
                run.failed_files.push(name);
            }
        }
    }
    info!(
        "Split finished: {} files, {} failed",
        files.len(),
        run.failed_files.len()
    );
    Ok(run)
}
