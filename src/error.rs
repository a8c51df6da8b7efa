use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// What an I/O failure was reading from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// An uploaded capture, identified by its filename
    Upload(String),
    /// A stored benchmark, identified by its id
    Benchmark(u32),
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Upload(filename) => write!(f, "file '{}'", filename),
            Origin::Benchmark(id) => write!(f, "benchmark {}", id),
        }
    }
}

/// Errors surfaced by the engine.
///
/// None of these are recovered locally. Reading a legacy-format data file is
/// not an error; it silently falls back to a whole-file load.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("file '{filename}': unsupported file format (expected overlay CSV or hardware-monitor HML, got: '{first_line}')")]
    UnsupportedFormat { filename: String, first_line: String },

    #[error("file '{filename}': invalid specs line: {reason}")]
    InvalidSpecs { filename: String, reason: String },

    #[error("file '{filename}': no valid benchmark data found (all data columns are empty)")]
    EmptyCapture { filename: String },

    #[error("run '{label}' has {lines} data lines, more than the allowed {max}")]
    TooManyLines {
        label: String,
        lines: usize,
        max: usize,
    },

    #[error("{origin}: read failed: {source}")]
    Read {
        origin: Origin,
        #[source]
        source: io::Error,
    },

    #[error("benchmark {id}: write failed: {source}")]
    Write {
        id: u32,
        #[source]
        source: io::Error,
    },

    #[error("benchmark {id}: unsupported storage format version {version}")]
    UnsupportedVersion { id: u32, version: u32 },

    #[error("benchmark {id}: {} not found", .path.display())]
    NotFound { id: u32, path: PathBuf },

    #[error("benchmark {id}: run index {index} out of range (run count {run_count})")]
    IndexOutOfRange {
        id: u32,
        index: usize,
        run_count: usize,
    },

    #[error("benchmark {id}: no benchmark data to export")]
    EmptyBenchmark { id: u32 },

    #[error("benchmark {id}: output sink closed: {source}")]
    SinkClosed {
        id: u32,
        #[source]
        source: io::Error,
    },

    #[error("benchmark {id}: failed to encode response: {message}")]
    Encode { id: u32, message: String },

    #[error("benchmark {id}: archive error: {message}")]
    Archive { id: u32, message: String },

    #[error("benchmark {id}: cannot delete the last run, delete the entire benchmark instead")]
    LastRun { id: u32 },

    #[error("{}: cannot list benchmarks: {source}", .dir.display())]
    Scan {
        dir: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result alias used across the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub(crate) fn upload_read(filename: &str, source: io::Error) -> Self {
        EngineError::Read {
            origin: Origin::Upload(filename.to_string()),
            source,
        }
    }

    pub(crate) fn benchmark_read(id: u32, source: io::Error) -> Self {
        EngineError::Read {
            origin: Origin::Benchmark(id),
            source,
        }
    }

    pub(crate) fn sink(id: u32, source: io::Error) -> Self {
        EngineError::SinkClosed { id, source }
    }

    pub(crate) fn json(id: u32, err: serde_json::Error) -> Self {
        if err.is_io() {
            EngineError::SinkClosed {
                id,
                source: err.into(),
            }
        } else {
            EngineError::Encode {
                id,
                message: err.to_string(),
            }
        }
    }

    /// True when the error means the benchmark has no data file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }
}

/// Flatten a bincode failure into the I/O error that caused it.
///
/// Truncated frames surface as `UnexpectedEof`; malformed payloads become
/// `InvalidData` so that both are reported as read failures.
pub(crate) fn bincode_io(err: bincode::Error) -> io::Error {
    match *err {
        bincode::ErrorKind::Io(source) => source,
        other => io::Error::new(io::ErrorKind::InvalidData, other),
    }
}
