//! Filter counters: per file and for the whole run.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::filter::FilterVerdict;
use crate::jsonl::write_json_pretty;

/// Verdict counts for one file (or for the whole run).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileStats {
    pub identical: usize,
    pub too_similar: usize,
    pub kept: usize,
}

impl FileStats {
    pub fn record(&mut self, verdict: FilterVerdict) {
        match verdict {
            FilterVerdict::Identical => self.identical += 1,
            FilterVerdict::TooSimilar => self.too_similar += 1,
            FilterVerdict::Kept => self.kept += 1,
        }
    }

    pub fn merge(&mut self, other: &FileStats) {
        self.identical += other.identical;
        self.too_similar += other.too_similar;
        self.kept += other.kept;
    }

    pub fn total(&self) -> usize {
        self.identical + self.too_similar + self.kept
    }

    pub fn filtered(&self) -> usize {
        self.identical + self.too_similar
    }

    /// `filtered / total`, 0 for an empty run.
    pub fn filter_rate(&self) -> f64 {
        ratio(self.filtered(), self.total())
    }
}

fn ratio(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Run-wide accumulator. Created at run start, fed one finished (or failed)
/// file at a time, written once at the end.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RunStats {
    totals: FileStats,
    files: BTreeMap<String, FileStats>,
    failed_files: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatsConfig<'a> {
    max_similarity: f32,
    embedding_model: &'a str,
}

#[derive(Debug, Serialize)]
struct StatsReport<'a> {
    total_samples: usize,
    filtered_samples: usize,
    kept_samples: usize,
    filter_rate: f64,
    stats: &'a FileStats,
    files: &'a BTreeMap<String, FileStats>,
    failed_files: &'a [String],
    config: StatsConfig<'a>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, stats: FileStats) {
        self.totals.merge(&stats);
        self.files.entry(name.into()).or_default().merge(&stats);
    }

    /// A file that could not be filtered. It adds no counts, only its name.
    pub fn add_failure(&mut self, name: impl Into<String>) {
        self.failed_files.push(name.into());
    }

    pub fn failed_files(&self) -> &[String] {
        &self.failed_files
    }

    /// `true` when every input file made it into the counts.
    pub fn is_complete(&self) -> bool {
        self.failed_files.is_empty()
    }

    pub fn totals(&self) -> &FileStats {
        &self.totals
    }

    pub fn files(&self) -> &BTreeMap<String, FileStats> {
        &self.files
    }

    pub fn total(&self) -> usize {
        self.totals.total()
    }

    pub fn kept(&self) -> usize {
        self.totals.kept
    }

    pub fn filtered(&self) -> usize {
        self.totals.filtered()
    }

    pub fn filter_rate(&self) -> f64 {
        self.totals.filter_rate()
    }

    pub fn kept_rate(&self) -> f64 {
        ratio(self.kept(), self.total())
    }

    /// Serialise the run summary to `path` as pretty JSON.
    pub fn write(&self, path: &Path, max_similarity: f32, embedding_model: &str) -> Result<()> {
        let report = StatsReport {
            total_samples: self.total(),
            filtered_samples: self.filtered(),
            kept_samples: self.kept(),
            filter_rate: self.filter_rate(),
            stats: &self.totals,
            files: &self.files,
            failed_files: &self.failed_files,
            config: StatsConfig {
                max_similarity,
                embedding_model,
            },
        };
        write_json_pretty(path, &report)
    }

    pub fn print_summary(&self, max_similarity: f32) {
        println!("{}", "=".repeat(60));
        println!("Filter summary");
        println!("{}", "=".repeat(60));
        println!("Total samples    : {}", self.total());
        println!(
            "Kept samples     : {} ({:.1}%)",
            self.kept(),
            self.kept_rate() * 100.0
        );
        println!(
            "Filtered samples : {} ({:.1}%)",
            self.filtered(),
            self.filter_rate() * 100.0
        );
        println!("  - identical          : {}", self.totals.identical);
        println!("  - similarity > {max_similarity:<5} : {}", self.totals.too_similar);
        if !self.is_complete() {
            println!("Failed files     : {}", self.failed_files.join(", "));
        }
        println!("{}", "=".repeat(60));
    }
}
