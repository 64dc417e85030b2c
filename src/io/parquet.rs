//! Hive-partitioned Parquet output.
//!
//! This module provides:
//! - [`output_fields`], the Arrow schema of a [`JoinedRecord`]
//! - [`PartitionedWriter`], which groups rows by `(date_PU, borough_PU)` and writes one
//!   new file per group under `date_PU=<v>/borough_PU=<v>/`
//! - [`read_partitioned`], which reads a dataset back and restores the partition
//!   columns from the directory names
//!
//! Writes only ever add files. Each file name carries the run's `app_id` and a
//! per-writer sequence number, so chunks and reruns never overwrite each other.
//! Rows are converted with `serde_arrow` against the explicit schema.

use crate::app_id::AppId;
use crate::record::{
    BOROUGH_PU_COLUMN, DATE_PU_COLUMN, JoinedRecord, LocationRole, PARTITION_COLUMNS,
    TRIP_COLUMNS,
};
use anyhow::{Context, Result, anyhow, bail};
use arrow::array::{ArrayRef, StringArray};
use arrow::datatypes::{DataType, Field, FieldRef, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rayon::prelude::*;
use serde_arrow::{from_record_batch, to_record_batch};
use std::collections::BTreeMap;
use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Value Hive uses for an empty partition value.
pub const HIVE_DEFAULT_PARTITION: &str = "__HIVE_DEFAULT_PARTITION__";

fn field_type(column: &str) -> (DataType, bool) {
    match column {
        "datetime_PU" | "datetime_DO" => (DataType::Timestamp(TimeUnit::Millisecond, None), false),
        "VendorID" | "passenger_count" | "RatecodeID" | "payment_type" => (DataType::Int32, true),
        "trip_distance" => (DataType::Float64, true),
        "store_and_fwd_flag" => (DataType::Boolean, true),
        "fare_amount" | "extra" | "mta_tax" | "tip_amount" | "tolls_amount"
        | "improvement_surcharge" | "total_amount" => (DataType::Decimal128(10, 2), false),
        _ => (DataType::Utf8, false),
    }
}

/// Arrow fields of a full [`JoinedRecord`], in column order.
#[must_use]
pub fn output_fields() -> Vec<FieldRef> {
    let mut fields: Vec<FieldRef> = TRIP_COLUMNS
        .iter()
        .map(|c| {
            let (ty, nullable) = field_type(c);
            Arc::new(Field::new(*c, ty, nullable))
        })
        .collect();
    for role in LocationRole::ALL {
        fields.push(Arc::new(Field::new(role.suffixed("Shape_Leng"), DataType::Float64, true)));
        fields.push(Arc::new(Field::new(role.suffixed("the_geom"), DataType::Utf8, true)));
        fields.push(Arc::new(Field::new(role.suffixed("Shape_Area"), DataType::Float64, true)));
        fields.push(Arc::new(Field::new(role.suffixed("zone"), DataType::Utf8, false)));
        fields.push(Arc::new(Field::new(role.suffixed("borough"), DataType::Utf8, false)));
    }
    fields.push(Arc::new(Field::new("app_id", DataType::Utf8, false)));
    fields.push(Arc::new(Field::new(DATE_PU_COLUMN, DataType::Utf8, false)));
    fields
}

/// Escape a partition value the way Hive does.
#[must_use]
pub fn escape_partition_value(value: &str) -> String {
    if value.is_empty() {
        return HIVE_DEFAULT_PARTITION.to_string();
    }
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if c.is_control()
            || matches!(
                c,
                '"' | '#' | '%' | '\'' | '*' | '/' | ':' | '=' | '?' | '\\' | '\u{7F}' | '{' | '[' | ']' | '^'
            )
        {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{b:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Inverse of [`escape_partition_value`].
///
/// # Errors
/// On a malformed `%XX` sequence or invalid UTF-8.
pub fn unescape_partition_value(value: &str) -> Result<String> {
    if value == HIVE_DEFAULT_PARTITION {
        return Ok(String::new());
    }
    let bytes = value.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = value
                .get(i + 1..i + 3)
                .ok_or_else(|| anyhow!("truncated escape in partition value '{value}'"))?;
            let decoded = hex::decode(hex)
                .with_context(|| format!("bad escape in partition value '{value}'"))?;
            out.extend(decoded);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).with_context(|| format!("partition value '{value}' is not UTF-8"))
}

/// Directory of one `(date_PU, borough_PU)` partition, relative to the dataset root.
#[must_use]
pub fn partition_dir(date_pu: &str, borough_pu: &str) -> PathBuf {
    PathBuf::from(format!(
        "{DATE_PU_COLUMN}={}",
        escape_partition_value(date_pu)
    ))
    .join(format!(
        "{BOROUGH_PU_COLUMN}={}",
        escape_partition_value(borough_pu)
    ))
}

/// Rows and files produced by one write.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub rows: usize,
    pub files: usize,
}

impl WriteSummary {
    fn add(self, other: WriteSummary) -> WriteSummary {
        WriteSummary {
            rows: self.rows + other.rows,
            files: self.files + other.files,
        }
    }
}

type Groups<'a> = BTreeMap<(&'a str, &'a str), Vec<&'a JoinedRecord>>;

fn group_by_partition(rows: &[JoinedRecord]) -> Groups<'_> {
    let mut groups: Groups<'_> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.date_PU.as_str(), row.borough_PU.as_str()))
            .or_default()
            .push(row);
    }
    groups
}

/// Appending writer for one run's partitioned dataset.
#[derive(Debug)]
pub struct PartitionedWriter {
    root: PathBuf,
    app_id: AppId,
    seq: AtomicU64,
    fields: Vec<FieldRef>,
    stored_columns: Vec<usize>,
}

impl PartitionedWriter {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, app_id: &AppId) -> Self {
        let fields = output_fields();
        let stored_columns = fields
            .iter()
            .enumerate()
            .filter(|(_, f)| !PARTITION_COLUMNS.contains(&f.name().as_str()))
            .map(|(i, _)| i)
            .collect();
        Self {
            root: root.into(),
            app_id: app_id.clone(),
            seq: AtomicU64::new(0),
            fields,
            stored_columns,
        }
    }

    /// Write every partition of `rows` sequentially.
    ///
    /// # Errors
    /// On conversion or I/O failure; files already written stay on disk.
    pub fn write(&self, rows: &[JoinedRecord]) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();
        for ((date, borough), group) in group_by_partition(rows) {
            summary = summary.add(self.write_group(date, borough, &group)?);
        }
        Ok(summary)
    }

    /// Write partitions in parallel on the current rayon pool.
    ///
    /// # Errors
    /// As [`PartitionedWriter::write`].
    pub fn write_par(&self, rows: &[JoinedRecord]) -> Result<WriteSummary> {
        let groups: Vec<_> = group_by_partition(rows).into_iter().collect();
        groups
            .par_iter()
            .map(|((date, borough), group)| self.write_group(date, borough, group))
            .try_reduce(WriteSummary::default, |a, b| Ok(a.add(b)))
    }

    fn next_file_name(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("part-{}-{seq:05}.parquet", self.app_id)
    }

    fn write_group(
        &self,
        date_pu: &str,
        borough_pu: &str,
        rows: &[&JoinedRecord],
    ) -> Result<WriteSummary> {
        if rows.is_empty() {
            return Ok(WriteSummary::default());
        }
        let dir = self.root.join(partition_dir(date_pu, borough_pu));
        create_dir_all(&dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
        let path = dir.join(self.next_file_name());

        let batch = to_record_batch(&self.fields, &rows).context("convert rows to RecordBatch")?;
        let batch = batch
            .project(&self.stored_columns)
            .context("drop partition columns")?;

        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        let props = WriterProperties::builder()
            .set_compression(Compression::SNAPPY)
            .build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
            .context("create ArrowWriter")?;
        writer.write(&batch).context("write batch to parquet")?;
        writer.close().context("close ArrowWriter")?;

        debug!(path = %path.display(), rows = rows.len(), "wrote partition file");
        Ok(WriteSummary {
            rows: rows.len(),
            files: 1,
        })
    }
}

fn partition_value(dir: &Path, column: &str) -> Result<String> {
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| anyhow!("no partition directory in {}", dir.display()))?;
    let Some(raw) = name.strip_prefix(&format!("{column}=")) else {
        bail!("expected {column}=<value> directory, found {}", dir.display());
    };
    unescape_partition_value(raw)
}

/// Read a single data file of a partitioned dataset, restoring the partition columns.
///
/// # Errors
/// If the path is not inside a `date_PU=/borough_PU=` layout or the file is unreadable.
pub fn read_partition_file(path: impl AsRef<Path>) -> Result<Vec<JoinedRecord>> {
    let path = path.as_ref();
    let borough_dir = path
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent", path.display()))?;
    let date_dir = borough_dir
        .parent()
        .ok_or_else(|| anyhow!("{} has no parent", borough_dir.display()))?;
    let borough_pu = partition_value(borough_dir, BOROUGH_PU_COLUMN)?;
    let date_pu = partition_value(date_dir, DATE_PU_COLUMN)?;

    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .context("open ParquetRecordBatchReader")?
        .with_batch_size(64 * 1024)
        .build()
        .context("build ParquetRecordBatchReader")?;

    let mut out = Vec::new();
    while let Some(batch) = reader.next().transpose().context("read next batch")? {
        let n = batch.num_rows();
        let mut fields: Vec<FieldRef> = batch.schema().fields().iter().cloned().collect();
        let mut columns: Vec<ArrayRef> = batch.columns().to_vec();
        for (name, value) in [(DATE_PU_COLUMN, &date_pu), (BOROUGH_PU_COLUMN, &borough_pu)] {
            fields.push(Arc::new(Field::new(name, DataType::Utf8, false)));
            columns.push(Arc::new(StringArray::from(vec![value.as_str(); n])));
        }
        let full = RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)
            .context("restore partition columns")?;
        let mut rows: Vec<JoinedRecord> =
            from_record_batch(&full).context("deserialize RecordBatch rows")?;
        out.append(&mut rows);
    }
    Ok(out)
}

/// Read every data file under `root` in path order.
///
/// # Errors
/// If any file fails to read.
pub fn read_partitioned(root: impl AsRef<Path>) -> Result<Vec<JoinedRecord>> {
    let files = partition_files(root)?;
    let mut out = Vec::new();
    for file in files {
        out.append(&mut read_partition_file(&file)?);
    }
    Ok(out)
}

/// Data files under `root`, sorted.
///
/// # Errors
/// If the directory listing fails.
pub fn partition_files(root: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let root = root.as_ref();
    let pattern = format!(
        "{}/{DATE_PU_COLUMN}=*/{BOROUGH_PU_COLUMN}=*/*.parquet",
        glob::Pattern::escape(&root.to_string_lossy())
    );
    crate::io::glob::expand_glob(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_like_hive() {
        assert_eq!(escape_partition_value("Manhattan"), "Manhattan");
        assert_eq!(escape_partition_value("Staten Island"), "Staten Island");
        assert_eq!(escape_partition_value("a/b=c"), "a%2Fb%3Dc");
        assert_eq!(escape_partition_value("50%"), "50%25");
        assert_eq!(escape_partition_value(""), HIVE_DEFAULT_PARTITION);
        for v in ["a/b=c", "50%", "", "Unknown", "x:y#z?"] {
            assert_eq!(unescape_partition_value(&escape_partition_value(v)).unwrap(), v);
        }
        assert!(unescape_partition_value("bad%2").is_err());
    }

    #[test]
    fn escapes_glob_and_caret_characters() {
        assert_eq!(escape_partition_value("a*b"), "a%2Ab");
        assert_eq!(escape_partition_value("[x]"), "%5Bx%5D");
        assert_eq!(escape_partition_value("{y}"), "%7By}");
        assert_eq!(escape_partition_value("^"), "%5E");
        assert_eq!(escape_partition_value("\u{7F}"), "%7F");
        for v in ["a*b", "[x]", "{y}", "^\u{7F}"] {
            assert_eq!(unescape_partition_value(&escape_partition_value(v)).unwrap(), v);
        }
    }

    #[test]
    fn escapes_must_be_two_hex_digits() {
        for bad in ["%+1", "%-1", "%G0", "%0x", "a%"] {
            assert!(unescape_partition_value(bad).is_err(), "{bad}");
        }
        assert_eq!(unescape_partition_value("%2f%2F").unwrap(), "//");
    }

    #[test]
    fn partition_dir_layout() {
        assert_eq!(
            partition_dir("20190615", "Manhattan"),
            PathBuf::from("date_PU=20190615").join("borough_PU=Manhattan")
        );
    }

    #[test]
    fn schema_follows_record_columns() {
        let names: Vec<String> = output_fields().iter().map(|f| f.name().clone()).collect();
        assert_eq!(names, JoinedRecord::columns());
    }
}
