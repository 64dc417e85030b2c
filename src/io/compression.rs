//! Transparent compression for trip and zone inputs.
//!
//! TLC exports are often shipped compressed. Readers pick a codec from the file
//! extension first and fall back to the stream's magic bytes, so a renamed
//! `yellow_tripdata_2019-01.csv` that is really gzip still loads.
//!
//! Codecs are compiled in per feature:
//! - **Gzip** (`.gz`) via `flate2` (`compression-gzip`)
//! - **Zstd** (`.zst`) via `zstd` (`compression-zstd`)
//! - **Bzip2** (`.bz2`) via `bzip2` (`compression-bzip2`)
//! - **Xz** (`.xz`) via `xz2` (`compression-xz`)
//!
//! With no codec feature enabled both entry points are buffered pass-throughs.

use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A compression format that can wrap readers and writers.
pub trait CompressionCodec: Send + Sync {
    fn name(&self) -> &'static str;

    /// Lowercase extensions including the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    fn magic_bytes(&self) -> &'static [u8];

    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>>;

    fn wrap_writer(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>>;
}

static CODECS: &[&dyn CompressionCodec] = &[
    #[cfg(feature = "compression-gzip")]
    &GzipCodec,
    #[cfg(feature = "compression-zstd")]
    &ZstdCodec,
    #[cfg(feature = "compression-bzip2")]
    &Bzip2Codec,
    #[cfg(feature = "compression-xz")]
    &XzCodec,
];

/// Codecs compiled into this build.
#[must_use]
pub fn available_codecs() -> Vec<&'static str> {
    CODECS.iter().map(|c| c.name()).collect()
}

fn detect_from_extension(path: &Path) -> Option<&'static dyn CompressionCodec> {
    let name = path.to_string_lossy().to_lowercase();
    CODECS
        .iter()
        .copied()
        .find(|codec| codec.extensions().iter().any(|ext| name.ends_with(ext)))
}

fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<&'static dyn CompressionCodec> {
    let head = reader.fill_buf().ok()?;
    CODECS
        .iter()
        .copied()
        .find(|codec| head.starts_with(codec.magic_bytes()))
}

/// Wrap `reader` with a decompressor when the path or the content calls for one.
///
/// # Errors
/// If the codec rejects the stream header.
pub fn auto_detect_reader<R: Read + 'static>(
    reader: R,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Read>> {
    let path = path_hint.as_ref();
    if let Some(codec) = detect_from_extension(path) {
        return codec
            .wrap_reader(Box::new(BufReader::new(reader)))
            .with_context(|| format!("open {} as {}", path.display(), codec.name()));
    }

    let mut buffered = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buffered) {
        return codec
            .wrap_reader(Box::new(buffered))
            .with_context(|| format!("open {} as {}", path.display(), codec.name()));
    }
    Ok(Box::new(buffered))
}

/// Wrap `writer` with a compressor chosen by the path's extension.
///
/// # Errors
/// If the codec fails to initialize.
pub fn auto_detect_writer<W: Write + 'static>(
    writer: W,
    path_hint: impl AsRef<Path>,
) -> Result<Box<dyn Write>> {
    let path = path_hint.as_ref();
    if let Some(codec) = detect_from_extension(path) {
        return codec
            .wrap_writer(Box::new(BufWriter::new(writer)))
            .with_context(|| format!("create {} as {}", path.display(), codec.name()));
    }
    Ok(Box::new(BufWriter::new(writer)))
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }
    fn extensions(&self) -> &'static [&'static str] {
        &[".gz", ".gzip"]
    }
    fn magic_bytes(&self) -> &'static [u8] {
        &[0x1f, 0x8b]
    }
    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        // Multi-member streams show up when monthly files are concatenated.
        Ok(Box::new(flate2::read::MultiGzDecoder::new(reader)))
    }
    fn wrap_writer(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        Ok(Box::new(flate2::write::GzEncoder::new(
            writer,
            flate2::Compression::default(),
        )))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }
    fn extensions(&self) -> &'static [&'static str] {
        &[".zst", ".zstd"]
    }
    fn magic_bytes(&self) -> &'static [u8] {
        &[0x28, 0xb5, 0x2f, 0xfd]
    }
    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as Box<dyn Read>)
    }
    fn wrap_writer(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        zstd::stream::write::Encoder::new(writer, 3)
            .map(|e| Box::new(e.auto_finish()) as Box<dyn Write>)
    }
}

#[cfg(feature = "compression-bzip2")]
struct Bzip2Codec;

#[cfg(feature = "compression-bzip2")]
impl CompressionCodec for Bzip2Codec {
    fn name(&self) -> &'static str {
        "bzip2"
    }
    fn extensions(&self) -> &'static [&'static str] {
        &[".bz2", ".bzip2"]
    }
    fn magic_bytes(&self) -> &'static [u8] {
        b"BZh"
    }
    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(bzip2::read::MultiBzDecoder::new(reader)))
    }
    fn wrap_writer(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        Ok(Box::new(bzip2::write::BzEncoder::new(
            writer,
            bzip2::Compression::default(),
        )))
    }
}

#[cfg(feature = "compression-xz")]
struct XzCodec;

#[cfg(feature = "compression-xz")]
impl CompressionCodec for XzCodec {
    fn name(&self) -> &'static str {
        "xz"
    }
    fn extensions(&self) -> &'static [&'static str] {
        &[".xz"]
    }
    fn magic_bytes(&self) -> &'static [u8] {
        &[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]
    }
    fn wrap_reader(&self, reader: Box<dyn Read>) -> std::io::Result<Box<dyn Read>> {
        Ok(Box::new(xz2::read::XzDecoder::new(reader)))
    }
    fn wrap_writer(&self, writer: Box<dyn Write>) -> std::io::Result<Box<dyn Write>> {
        Ok(Box::new(xz2::write::XzEncoder::new(writer, 6)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn plain_input_passes_through() {
        let mut out = String::new();
        auto_detect_reader(Cursor::new(b"a,b\n1,2\n".to_vec()), "trips.csv")
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "a,b\n1,2\n");
    }

    #[cfg(feature = "compression-gzip")]
    #[test]
    fn gzip_is_found_by_magic_without_extension() {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"LocationID\n1\n").unwrap();
        let bytes = enc.finish().unwrap();

        let mut out = String::new();
        auto_detect_reader(Cursor::new(bytes), "zones.csv")
            .unwrap()
            .read_to_string(&mut out)
            .unwrap();
        assert_eq!(out, "LocationID\n1\n");
        assert!(available_codecs().contains(&"gzip"));
    }
}
