//! Trip acquisition in one of three load modes.
//!
//! [`TripSource`] resolves the trips path (file or glob) and yields units of work:
//!
//! - [`LoadMode::Whole`]: one unit with every row of every file.
//! - [`LoadMode::Sample`]: one unit with the first `n` rows across the files.
//! - [`LoadMode::Chunked`]: many units of at most `n` rows, read lazily.
//!   A chunk never spans two files.
//!
//! Files are visited in sorted path order.

use crate::io::csv::{CsvChunks, read_csv_head, read_csv_vec};
use crate::io::glob::resolve_inputs;
use crate::record::TripRecord;
use anyhow::Result;
use std::collections::VecDeque;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tracing::debug;

/// How trips are pulled from the source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadMode {
    #[default]
    Whole,
    Sample(NonZeroUsize),
    Chunked(NonZeroUsize),
}

impl LoadMode {
    /// From the mutually exclusive `--chunksize` / `--samplesize` options.
    #[must_use]
    pub fn from_options(chunksize: Option<NonZeroUsize>, samplesize: Option<NonZeroUsize>) -> Self {
        match (chunksize, samplesize) {
            (Some(n), _) => LoadMode::Chunked(n),
            (None, Some(n)) => LoadMode::Sample(n),
            (None, None) => LoadMode::Whole,
        }
    }
}

impl Display for LoadMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        match self {
            LoadMode::Whole => write!(f, "whole dataset"),
            LoadMode::Sample(n) => write!(f, "sample of {n} rows"),
            LoadMode::Chunked(n) => write!(f, "chunks of {n} rows"),
        }
    }
}

/// Iterator of trip units.
pub struct TripSource {
    files: Vec<PathBuf>,
    pending: VecDeque<PathBuf>,
    mode: LoadMode,
    current: Option<CsvChunks<TripRecord>>,
    finished: bool,
}

impl TripSource {
    /// Resolve `pattern` and prepare to read in `mode`.
    ///
    /// # Errors
    /// If the pattern is invalid or matches nothing.
    pub fn open(pattern: &str, mode: LoadMode) -> Result<Self> {
        let files = resolve_inputs(pattern)?;
        debug!(files = files.len(), %mode, "resolved trip inputs");
        Ok(Self {
            pending: files.iter().cloned().collect(),
            files,
            mode,
            current: None,
            finished: false,
        })
    }

    fn read_whole(&self) -> Result<Vec<TripRecord>> {
        let mut out = Vec::new();
        for file in &self.files {
            out.append(&mut read_csv_vec(file)?);
        }
        Ok(out)
    }

    fn read_sample(&self, limit: usize) -> Result<Vec<TripRecord>> {
        let mut out = Vec::new();
        for file in &self.files {
            let remaining = limit - out.len();
            if remaining == 0 {
                break;
            }
            out.append(&mut read_csv_head(file, remaining)?);
        }
        Ok(out)
    }

    fn next_chunk(&mut self, rows: usize) -> Option<Result<Vec<TripRecord>>> {
        loop {
            if let Some(chunks) = self.current.as_mut() {
                match chunks.next() {
                    Some(Ok(chunk)) => return Some(Ok(chunk)),
                    Some(Err(e)) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                    None => self.current = None,
                }
            }
            let file = self.pending.pop_front()?;
            debug!(file = %file.display(), "opening trip file");
            match CsvChunks::open(&file, rows) {
                Ok(chunks) => self.current = Some(chunks),
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

impl Iterator for TripSource {
    type Item = Result<Vec<TripRecord>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.mode {
            LoadMode::Whole => {
                self.finished = true;
                Some(self.read_whole())
            }
            LoadMode::Sample(n) => {
                self.finished = true;
                Some(self.read_sample(n.get()))
            }
            LoadMode::Chunked(n) => {
                let next = self.next_chunk(n.get());
                if next.is_none() {
                    self.finished = true;
                }
                next
            }
        }
    }
}
