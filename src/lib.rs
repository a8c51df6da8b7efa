//! # Benchmark Data Engine Library
//!
//! The data engine behind a gaming-benchmark sharing service. Users upload
//! capture files from two external profilers; this library turns them into
//! per-run time series, persists them in a compact streaming-friendly binary
//! format, and serves them back as statistics, JSON and CSV archives.
//!
//! ## Supported Capture Dialects
//!
//! - **Linux overlay CSV** (`.csv`): specs line with RAM in kilobytes, a single
//!   header row, then comma-separated numeric rows
//! - **Windows hardware-monitor log** (`.hml`): specs line with the GPU at
//!   position 2, a header row followed by one repeated header row per column
//!
//! ## Architecture Overview
//!
//! The library is organized into several key modules:
//!
//! - `dialect`: first-line sniffing of the capture dialect
//! - `ingest`: two-pass CSV parser with exact pre-allocation
//! - `run`: the in-memory run model and line accounting
//! - `storage`: versioned zstd + bincode codec, sidecar metadata, stats cache
//! - `stats`: per-metric summaries in two quantile dialects
//! - `downsample`: Largest-Triangle-Three-Buckets series reduction
//! - `stream`: bounded-memory JSON streaming to a response sink
//! - `export`: ZIP archive of per-run CSV files in the overlay dialect
//! - `search`: deduplicated label/spec strings for full-text search
//! - `mutation`: whole-benchmark add, delete and rename run operations
//! - `migrate`: one-shot storage upgrades for existing data directories
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use benchmark_data_engine::{ingest::ingest_path, BenchmarkStore, EngineConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let store = BenchmarkStore::open(EngineConfig::new("data"))?;
//!
//!     let run = ingest_path("captures/run1.csv")?;
//!     store.store(42, &[run])?;
//!
//!     let meta = store.metadata(42)?;
//!     println!("{} runs: {:?}", meta.run_count, meta.run_labels);
//!     Ok(())
//! }
//! ```

/// Runtime configuration and directory initialization
pub mod config;

/// Capture dialect detection from the first line of an upload
pub mod dialect;

/// Largest-Triangle-Three-Buckets downsampling for chart series
pub mod downsample;

/// Error kinds surfaced by every engine operation
///
/// All library operations return [`error::Result`]. Each variant carries the
/// upload filename or the benchmark id it concerns so callers can report the
/// offending input without extra bookkeeping.
pub mod error;

/// ZIP export of stored runs as overlay-dialect CSV files
pub mod export;

/// Two-pass CSV ingest for both capture dialects
///
/// The first pass counts lines so that the second pass can allocate every
/// present series exactly once. Unparseable numeric tokens are skipped per
/// column without discarding the rest of the row.
pub mod ingest;

/// Colorized log formatting for the command-line binary
pub mod logging;

/// One-shot storage migrations (legacy format upgrade, stats cache fill)
pub mod migrate;

/// Whole-benchmark run mutations with the client-facing policy checks
pub mod mutation;

/// The run model: labels, hardware specs and thirteen telemetry series
pub mod run;

/// Search string extraction for the external metadata store
pub mod search;

/// Statistics engine
///
/// Computes min/max/avg/median/p01/p97/stddev/variance/density per metric in
/// both the linear-interpolation and the overlay-tool quantile dialects, and
/// derives FPS figures from frame times when those are available.
pub mod stats;

/// Persistent storage of benchmark runs
///
/// Handles the versioned binary data file, the metadata sidecar used for cheap
/// listing, the legacy single-sequence format, and the pre-calculated stats
/// cache. Reads never cache decoded runs in memory.
pub mod storage;

/// Bounded-memory JSON streaming of stored benchmarks
pub mod stream;

/// Command-line interface and argument parsing
pub mod cli;

pub mod utils;

pub use config::EngineConfig;
pub use dialect::Dialect;
pub use error::{EngineError, Result};
pub use run::{Metric, Run, RunView};
pub use stats::{MetricStats, PreCalculatedRun, QuantileMethod};
pub use storage::{BenchmarkMetadata, BenchmarkStore};

/// The current version of the benchmark data engine
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fixed engine constants
///
/// These values are part of the stored data contract and are deliberately not
/// runtime-configurable.
pub mod defaults {
    /// Version written into the header of every new data file
    ///
    /// Version 1 files carry no header and hold a single top-level sequence
    /// of runs. They remain readable through the legacy path.
    pub const STORAGE_FORMAT_VERSION: u32 = 2;

    /// Maximum number of data lines a single run may hold
    pub const MAX_PER_RUN_LINES: usize = 500_000;

    /// Maximum number of characters kept from a spec string
    pub const MAX_STRING_LENGTH: usize = 100;

    /// Default LTTB target for chart series
    pub const DOWNSAMPLE_THRESHOLD: usize = 2000;

    /// Number of runs between sink flushes while streaming JSON
    pub const JSON_FLUSH_INTERVAL: usize = 10;

    /// Number of runs between sink flushes while exporting an archive
    pub const EXPORT_FLUSH_INTERVAL: usize = 5;

    /// Buffer size placed between the zstd encoder and the data file
    pub const WRITE_BUFFER_SIZE: usize = 256 * 1024;

    /// Worker threads used by the zstd encoder
    pub const ZSTD_WORKERS: u32 = 2;

    /// Default data directory when none is configured
    pub const DATA_DIR: &str = "data";
}
