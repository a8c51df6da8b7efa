//! Pre-calculated statistics cache: `{id}.stats` holds the zstd-compressed
//! bincode encoding of every [`PreCalculatedRun`] of a benchmark. It is
//! dropped whenever the benchmark is rewritten.

use super::{decode_slice, BenchmarkStore};
use crate::defaults::WRITE_BUFFER_SIZE;
use crate::error::{bincode_io, EngineError, Result};
use crate::stats::{precompute_run, PreCalculatedRun};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

fn write(path: &Path, runs: &[PreCalculatedRun]) -> io::Result<()> {
    let writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, File::create(path)?);
    let mut encoder = zstd::Encoder::new(writer, 0)?;
    bincode::serialize_into(&mut encoder, runs).map_err(bincode_io)?;
    encoder.finish()?.flush()
}

fn read(path: &Path) -> io::Result<Vec<PreCalculatedRun>> {
    let payload = zstd::decode_all(File::open(path)?)?;
    decode_slice(&payload)
}

impl BenchmarkStore {
    /// Persist pre-calculated statistics for benchmark `id`
    pub fn store_precomputed(&self, id: u32, runs: &[PreCalculatedRun]) -> Result<()> {
        write(&self.stats_path(id), runs).map_err(|source| EngineError::Write { id, source })?;
        debug!("Cached statistics for benchmark {} ({} runs)", id, runs.len());
        Ok(())
    }

    /// True when benchmark `id` has a statistics cache file
    pub fn has_precomputed(&self, id: u32) -> bool {
        self.stats_path(id).is_file()
    }

    /// Pre-calculated statistics of benchmark `id`
    ///
    /// Served from the cache when it is readable. Otherwise the runs are
    /// streamed from the data file and computed one at a time under the write
    /// lock, so a concurrent rewrite cannot leave a stale cache behind;
    /// persisting the result is best effort.
    pub fn precomputed(&self, id: u32) -> Result<Vec<PreCalculatedRun>> {
        if let Ok(runs) = read(&self.stats_path(id)) {
            return Ok(runs);
        }

        self.with_write_lock(id, || {
            let mut computed = Vec::new();
            self.for_each_run(id, |_, run| {
                computed.push(precompute_run(&run));
                Ok(())
            })?;

            if let Err(e) = self.store_precomputed(id, &computed) {
                warn!("Failed to cache statistics for benchmark {}: {}", id, e);
            }
            Ok(computed)
        })
    }

    /// Drop the statistics cache of `id`, if any
    pub(crate) fn invalidate_precomputed(&self, id: u32) {
        match fs::remove_file(self.stats_path(id)) {
            Ok(()) => debug!("Dropped statistics cache of benchmark {}", id),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to drop statistics cache of benchmark {}: {}", id, e),
        }
    }
}
