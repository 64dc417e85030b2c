//! Input path expansion.
//!
//! The trips path may name a single file or a glob such as
//! `data/yellow_tripdata_2019-*.csv`. Matches are returned in sorted order so runs
//! over the same inputs always read files in the same sequence.

use anyhow::{Context, Result, bail};
use glob::glob;
use std::path::{Path, PathBuf};

/// Expand a glob pattern into a sorted list of matching files.
///
/// Directories are skipped. Zero matches is not an error here.
///
/// # Errors
/// If the pattern is invalid or a matched entry cannot be read.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let paths = glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;

    let mut result = Vec::new();
    for entry in paths {
        let path =
            entry.with_context(|| format!("error reading glob entry for pattern: {pattern}"))?;
        if path.is_file() {
            result.push(path);
        }
    }
    result.sort();
    Ok(result)
}

/// Resolve an input argument to at least one file.
///
/// An existing file is returned as-is, even if its name contains glob
/// metacharacters; anything else is expanded as a pattern.
///
/// # Errors
/// If nothing matches.
pub fn resolve_inputs(pattern: &str) -> Result<Vec<PathBuf>> {
    if Path::new(pattern).is_file() {
        return Ok(vec![PathBuf::from(pattern)]);
    }
    let files = expand_glob(pattern)?;
    if files.is_empty() {
        bail!("no files found matching pattern: {pattern}");
    }
    Ok(files)
}
