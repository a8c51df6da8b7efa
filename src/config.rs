//! # Engine Configuration
//!
//! A single explicit configuration record replaces process-wide state: every
//! component that touches the filesystem receives an [`EngineConfig`] (usually
//! through a [`crate::BenchmarkStore`]) instead of reading a global.
//!
//! ## Directory Layout
//!
//! ```text
//! {data_dir}/
//! └── benchmarks/
//!     ├── {id}.bin     zstd frame: header + runs
//!     ├── {id}.meta    run count + labels
//!     └── {id}.stats   pre-calculated statistics cache
//! ```

use crate::cli::Args;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the subdirectory of `data_dir` that holds benchmark files
pub const BENCHMARKS_SUBDIR: &str = "benchmarks";

/// Configuration for the data engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root data directory; all files live under `{data_dir}/benchmarks/`
    pub data_dir: PathBuf,
}

impl EngineConfig {
    /// Create a configuration rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Build the engine configuration from parsed command-line arguments
    pub fn from_args(args: &Args) -> Self {
        Self::new(args.data_dir.clone())
    }

    /// Directory holding all benchmark files
    pub fn benchmarks_dir(&self) -> PathBuf {
        self.data_dir.join(BENCHMARKS_SUBDIR)
    }

    /// Create the benchmarks directory (mode 0750 on Unix) if needed
    ///
    /// Must be called once before any other engine operation;
    /// [`crate::BenchmarkStore::open`] does this for you.
    pub fn init(&self) -> io::Result<PathBuf> {
        let dir = self.benchmarks_dir();
        create_private_dir(&dir)?;
        debug!("Benchmarks directory ready at {:?}", dir);
        Ok(dir)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(crate::defaults::DATA_DIR)
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o750)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_benchmarks_dir_is_under_data_dir() {
        let config = EngineConfig::new("/srv/data");
        assert_eq!(
            config.benchmarks_dir(),
            PathBuf::from("/srv/data/benchmarks")
        );
    }

    #[test]
    fn test_init_creates_directory() {
        let temp = TempDir::new().unwrap();
        let config = EngineConfig::new(temp.path().join("nested"));

        let dir = config.init().unwrap();
        assert!(dir.is_dir());

        // Idempotent
        config.init().unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_init_uses_group_readable_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let config = EngineConfig::new(temp.path());
        let dir = config.init().unwrap();

        let mode = std::fs::metadata(dir).unwrap().permissions().mode() & 0o777;
        // The process umask may only remove bits.
        assert_eq!(mode & !0o750, 0);
    }
}
