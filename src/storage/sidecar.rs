//! Metadata sidecar: `{id}.meta` holds the run count and labels of a
//! benchmark as plain bincode so listings never decompress the data file.

use super::{decode_limited, BenchmarkStore};
use crate::error::{bincode_io, Result};
use crate::run::Run;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Run count and labels of a stored benchmark
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkMetadata {
    pub run_count: usize,
    pub run_labels: Vec<String>,
}

impl BenchmarkMetadata {
    pub fn from_runs(runs: &[Run]) -> Self {
        Self {
            run_count: runs.len(),
            run_labels: runs.iter().map(|r| r.label.clone()).collect(),
        }
    }
}

pub(crate) fn write(path: &Path, meta: &BenchmarkMetadata) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, meta).map_err(bincode_io)?;
    writer.flush()
}

pub(crate) fn read(path: &Path) -> io::Result<BenchmarkMetadata> {
    let file = File::open(path)?;
    let len = file.metadata()?.len();
    decode_limited(BufReader::new(file), len)
}

impl BenchmarkStore {
    /// Run count and labels of benchmark `id`
    ///
    /// Served from the sidecar when it is readable. Otherwise the data file is
    /// walked once under the write lock to rebuild it, so a concurrent
    /// rewrite cannot be overwritten with stale labels; persisting the rebuilt
    /// sidecar is best effort.
    pub fn metadata(&self, id: u32) -> Result<BenchmarkMetadata> {
        let path = self.meta_path(id);
        match read(&path) {
            Ok(meta) => return Ok(meta),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No sidecar for benchmark {}, rebuilding", id);
            }
            Err(e) => {
                warn!("Unreadable sidecar for benchmark {} ({}), rebuilding", id, e);
            }
        }

        self.with_write_lock(id, || {
            // A writer may have replaced the sidecar while we waited
            if let Ok(meta) = read(&path) {
                return Ok(meta);
            }

            let meta = self.scan_metadata(id)?;
            if let Err(e) = write(&path, &meta) {
                warn!("Failed to persist sidecar for benchmark {}: {}", id, e);
            }
            Ok(meta)
        })
    }

    fn scan_metadata(&self, id: u32) -> Result<BenchmarkMetadata> {
        let mut run_labels = Vec::new();
        let run_count = self.for_each_run(id, |_, run| {
            run_labels.push(run.label);
            Ok(())
        })?;
        Ok(BenchmarkMetadata {
            run_count,
            run_labels,
        })
    }
}
