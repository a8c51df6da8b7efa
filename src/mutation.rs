//! # Run Mutations
//!
//! Whole-benchmark edits: every operation loads all runs, changes the list and
//! rewrites the data file under the benchmark's write lock. Each returns the
//! refreshed [`SearchMetadata`] so the caller can update the metadata store in
//! the same request.

use crate::error::{EngineError, Result};
use crate::run::{validate_per_run_lines, Run};
use crate::search::{extract_search_metadata, SearchMetadata};
use crate::storage::BenchmarkStore;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Append `new_runs` to benchmark `id`
///
/// Every new run must fit the per-run line limit; a rejected batch leaves the
/// benchmark untouched.
pub fn add_runs(store: &BenchmarkStore, id: u32, new_runs: &[Run]) -> Result<SearchMetadata> {
    validate_per_run_lines(new_runs)?;

    store.with_write_lock(id, || {
        let mut runs = store.load(id)?;
        runs.extend_from_slice(new_runs);
        store.store_unlocked(id, &runs)?;

        info!("Added {} runs to benchmark {} ({} total)", new_runs.len(), id, runs.len());
        Ok(extract_search_metadata(&runs))
    })
}

/// Remove the run at `index` from benchmark `id`
///
/// The last remaining run cannot be removed; delete the benchmark instead.
pub fn delete_run(store: &BenchmarkStore, id: u32, index: usize) -> Result<SearchMetadata> {
    store.with_write_lock(id, || {
        let mut runs = store.load(id)?;
        if index >= runs.len() {
            return Err(EngineError::IndexOutOfRange {
                id,
                index,
                run_count: runs.len(),
            });
        }
        if runs.len() == 1 {
            return Err(EngineError::LastRun { id });
        }

        let removed = runs.remove(index);
        store.store_unlocked(id, &runs)?;

        info!("Removed run {} ('{}') from benchmark {}", index, removed.label, id);
        Ok(extract_search_metadata(&runs))
    })
}

/// Relabel runs of benchmark `id` by index
///
/// Indices past the last run are ignored.
pub fn rename_runs(
    store: &BenchmarkStore,
    id: u32,
    labels: &BTreeMap<usize, String>,
) -> Result<SearchMetadata> {
    store.with_write_lock(id, || {
        let mut runs = store.load(id)?;
        let mut renamed = 0;
        for (&index, label) in labels {
            match runs.get_mut(index) {
                Some(run) => {
                    run.label = label.clone();
                    renamed += 1;
                }
                None => debug!("Ignoring label for run {} of benchmark {}", index, id),
            }
        }

        store.store_unlocked(id, &runs)?;
        info!("Renamed {} runs of benchmark {}", renamed, id);
        Ok(extract_search_metadata(&runs))
    })
}
