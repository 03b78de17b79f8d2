//! Line-delimited JSON helpers.

use std::fs::{self, create_dir_all, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::JSONL_EXT;
use crate::error::{PipelineError, Result};

/// Rows parsed from one JSONL file plus the number of lines that were skipped.
#[derive(Debug)]
pub struct Loaded<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

/// Read every line of `path` as a `T`.
///
/// Blank lines are ignored; lines that do not parse (or are not valid UTF-8)
/// are skipped and counted, never fatal.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Loaded<T>> {
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                debug!("{}:{} not valid UTF-8, skipped", path.display(), lineno + 1);
                skipped += 1;
                continue;
            }
            Err(e) => return Err(PipelineError::io(path, e)),
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<T>(trimmed) {
            Ok(row) => rows.push(row),
            Err(e) => {
                debug!("{}:{} malformed record skipped: {e}", path.display(), lineno + 1);
                skipped += 1;
            }
        }
    }
    Ok(Loaded { rows, skipped })
}

/// Write `rows` to `path`, one compact JSON object per line. Parent
/// directories are created as needed.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n").map_err(|e| PipelineError::io(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))?;
    Ok(())
}

/// Pretty-printed single JSON document (stats / meta files).
pub fn write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
    }
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| PipelineError::io(path, e))
}

/// All `*.jsonl` files directly inside `dir`, sorted by name.
pub fn list_jsonl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| PipelineError::io(dir, e))?;
        let path = entry.path();
        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some(JSONL_EXT) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Like [`list_jsonl_files`] but an empty result is an error.
pub fn require_jsonl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let files = list_jsonl_files(dir)?;
    if files.is_empty() {
        return Err(PipelineError::EmptyInputDirectory(dir.to_path_buf()));
    }
    Ok(files)
}

/// File name of `path` as an owned string (`"output"` if it has none).
pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}
