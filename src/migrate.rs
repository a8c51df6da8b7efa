//! # Storage Migrations
//!
//! One-shot maintenance passes over an existing data directory. Both passes
//! visit every benchmark, log each failure and keep going; the returned
//! [`MigrationReport`] tells the caller whether anything was left behind.

use crate::defaults::STORAGE_FORMAT_VERSION;
use crate::error::{EngineError, Result};
use crate::storage::{benchmark_id_of, BenchmarkStore};
use serde::Serialize;
use std::fmt;
use std::io;
use tracing::{debug, info, warn};

/// Outcome of a migration pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Benchmarks considered
    pub found: usize,
    /// Benchmarks rewritten
    pub migrated: usize,
    /// Benchmarks that needed no work
    pub skipped: usize,
    /// Benchmarks that could not be processed
    pub failed: usize,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "found {}, migrated {}, skipped {}, failed {}",
            self.found, self.migrated, self.skipped, self.failed
        )
    }
}

/// Rewrite every legacy data file in the current format
///
/// Files whose name is not a benchmark id are skipped, as are files already
/// at the current version. Rewritten benchmarks get a fresh sidecar.
pub fn migrate_storage(store: &BenchmarkStore) -> Result<MigrationReport> {
    let files = store.data_files().map_err(|e| scan_error(store, e))?;

    let mut report = MigrationReport {
        found: files.len(),
        ..Default::default()
    };

    for path in files {
        let Some(id) = benchmark_id_of(&path) else {
            debug!("Skipping {:?}: not a benchmark file", path);
            report.skipped += 1;
            continue;
        };

        match migrate_one(store, id) {
            Ok(true) => report.migrated += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                warn!("Failed to migrate benchmark {}: {}", id, e);
                report.failed += 1;
            }
        }
    }

    info!("Storage migration: {}", report);
    Ok(report)
}

fn migrate_one(store: &BenchmarkStore, id: u32) -> Result<bool> {
    let version = store.probe_version(id)?;
    if version == STORAGE_FORMAT_VERSION {
        return Ok(false);
    }

    store.with_write_lock(id, || {
        let runs = store.load(id)?;
        store.store_unlocked(id, &runs)?;
        info!("Migrated benchmark {} from version {} ({} runs)", id, version, runs.len());
        Ok(true)
    })
}

fn scan_error(store: &BenchmarkStore, source: io::Error) -> EngineError {
    EngineError::Scan {
        dir: store.dir().to_path_buf(),
        source,
    }
}

/// Compute the statistics cache of every benchmark that lacks one
pub fn migrate_precomputed_stats(store: &BenchmarkStore) -> Result<MigrationReport> {
    let ids = store.benchmark_ids().map_err(|e| scan_error(store, e))?;

    let mut report = MigrationReport {
        found: ids.len(),
        ..Default::default()
    };

    for id in ids {
        if store.has_precomputed(id) {
            report.skipped += 1;
            continue;
        }

        match store.precomputed(id) {
            Ok(runs) if store.has_precomputed(id) => {
                debug!("Cached statistics for benchmark {} ({} runs)", id, runs.len());
                report.migrated += 1;
            }
            Ok(_) => {
                warn!("Statistics for benchmark {} computed but not cached", id);
                report.failed += 1;
            }
            Err(e) => {
                warn!("Failed to compute statistics for benchmark {}: {}", id, e);
                report.failed += 1;
            }
        }
    }

    info!("Statistics cache fill: {}", report);
    Ok(report)
}
