//! Log setup shared by the stage binaries.
//!
//! Warnings go to stderr, the full info-level trace goes to a timestamped file
//! under the log directory.

use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use chrono::Local;
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, TermLogger, TerminalMode, WriteLogger,
};

use crate::error::{PipelineError, Result};

/// Build `<log_dir>/<stem>_<YYYYmmdd_HHMMSS>.log`.
pub fn log_file_path(log_dir: &Path, stem: &str) -> PathBuf {
    let ts = Local::now().format("%Y%m%d_%H%M%S");
    log_dir.join(format!("{stem}_{ts}.log"))
}

/// Initialise the global logger. Returns the log file path.
pub fn init(log_dir: &Path, stem: &str) -> Result<PathBuf> {
    create_dir_all(log_dir).map_err(|e| PipelineError::io(log_dir, e))?;
    let log_path = log_file_path(log_dir, stem);
    let file = File::create(&log_path).map_err(|e| PipelineError::io(&log_path, e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Warn,
            ConfigBuilder::new().build(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, ConfigBuilder::new().build(), file),
    ])?;

    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_is_stamped_and_placed_in_dir() {
        let p = log_file_path(Path::new("logs"), "filter_pairs");
        assert_eq!(p.parent(), Some(Path::new("logs")));
        let name = p.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("filter_pairs_"));
        assert!(name.ends_with(".log"));
    }
}
