//! Typed CSV reading for trip and zone files.
//!
//! This module provides:
//! - [`read_csv_vec`] to load a whole file into `Vec<T>`
//! - [`read_csv_head`] to load at most the first `n` rows
//! - [`CsvChunks`] to stream a file as bounded `Vec<T>` chunks
//!
//! Every reader goes through [`auto_detect_reader`], so compressed inputs are
//! handled transparently. Fields are trimmed before deserialization, and parse
//! errors name the file and the 1-based data record that failed.

use crate::io::compression::auto_detect_reader;
use anyhow::{Context, Result};
use csv::{DeserializeRecordsIntoIter, ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

fn open_reader(path: &Path) -> Result<csv::Reader<Box<dyn Read>>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = auto_detect_reader(f, path)
        .with_context(|| format!("setup decompression for {}", path.display()))?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(rdr))
}

/// Read a whole CSV file into a typed `Vec<T>`.
///
/// # Errors
/// If the file cannot be opened or any record fails to deserialize.
pub fn read_csv_vec<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let mut rdr = open_reader(path)?;
    let mut out = Vec::<T>::new();
    for (i, rec) in rdr.deserialize::<T>().enumerate() {
        let v = rec.with_context(|| format!("parse CSV record #{} in {}", i + 1, path.display()))?;
        out.push(v);
    }
    Ok(out)
}

/// Read at most `limit` records; the rest of the file is never parsed.
///
/// # Errors
/// As [`read_csv_vec`], for the records actually read.
pub fn read_csv_head<T: DeserializeOwned>(path: impl AsRef<Path>, limit: usize) -> Result<Vec<T>> {
    let path = path.as_ref();
    let mut rdr = open_reader(path)?;
    let mut out = Vec::<T>::with_capacity(limit.min(64 * 1024));
    for (i, rec) in rdr.deserialize::<T>().take(limit).enumerate() {
        let v = rec.with_context(|| format!("parse CSV record #{} in {}", i + 1, path.display()))?;
        out.push(v);
    }
    Ok(out)
}

/// Lazy chunked reader over one CSV file.
///
/// Yields `Vec<T>` chunks of `chunk_rows` records (the last one may be shorter).
/// Iteration stops after the first error.
pub struct CsvChunks<T> {
    path: PathBuf,
    records: DeserializeRecordsIntoIter<Box<dyn Read>, T>,
    chunk_rows: usize,
    records_read: usize,
    done: bool,
}

impl<T: DeserializeOwned> CsvChunks<T> {
    /// Open `path` for chunked reading. `chunk_rows == 0` is treated as 1.
    ///
    /// # Errors
    /// If the file cannot be opened or its header cannot be read.
    pub fn open(path: impl AsRef<Path>, chunk_rows: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut rdr = open_reader(&path)?;
        rdr.headers()
            .with_context(|| format!("read CSV header of {}", path.display()))?;
        Ok(Self {
            records: rdr.into_deserialize(),
            path,
            chunk_rows: chunk_rows.max(1),
            records_read: 0,
            done: false,
        })
    }
}

impl<T: DeserializeOwned> Iterator for CsvChunks<T> {
    type Item = Result<Vec<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut chunk = Vec::with_capacity(self.chunk_rows);
        while chunk.len() < self.chunk_rows {
            match self.records.next() {
                None => {
                    self.done = true;
                    break;
                }
                Some(Ok(row)) => {
                    self.records_read += 1;
                    chunk.push(row);
                }
                Some(Err(e)) => {
                    self.done = true;
                    let record = self.records_read + 1;
                    return Some(Err(anyhow::Error::new(e).context(format!(
                        "parse CSV record #{record} in {}",
                        self.path.display()
                    ))));
                }
            }
        }
        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}
