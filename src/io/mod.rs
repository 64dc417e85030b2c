//! File-level I/O: input discovery, decompression, CSV reading and partitioned Parquet.

pub mod compression;
pub mod csv;
pub mod glob;
pub mod parquet;
