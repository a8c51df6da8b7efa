//! Version 1 data files: a zstd frame holding one bincode sequence of runs,
//! with no header. Still readable everywhere; only written by migration
//! tooling and compatibility tests.

use super::decode_slice;
use crate::error::bincode_io;
use crate::run::Run;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Storage format version of headerless files
pub const VERSION: u32 = 1;

/// Decode a legacy data file in full
///
/// The frame is decompressed before decoding so every length prefix is
/// checked against the bytes actually present.
pub fn read_v1(path: &Path) -> io::Result<Vec<Run>> {
    let payload = zstd::decode_all(File::open(path)?)?;
    decode_slice(&payload)
}

/// Write `runs` in the legacy layout
pub fn write_v1(path: &Path, runs: &[Run]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut encoder = zstd::Encoder::new(BufWriter::new(file), 0)?;
    bincode::serialize_into(&mut encoder, runs).map_err(bincode_io)?;
    encoder.finish()?.flush()
}
