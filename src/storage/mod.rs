//! # Benchmark Storage
//!
//! One zstd frame per benchmark at `{id}.bin`. Inside the frame a versioned
//! file is a bincode stream:
//!
//! ```text
//! FileHeader { magic: "FLSB", version: 2, run_count: N }
//! Run 0
//! Run 1
//! ...
//! Run N-1
//! ```
//!
//! The header lets readers decode runs one at a time. Files without the magic
//! are version 1 (see [`legacy`]). Every decode runs under a byte limit, so a
//! damaged or half-written length prefix is reported as a read error instead
//! of being trusted as an allocation size.

use crate::config::EngineConfig;
use crate::defaults::{
    MAX_PER_RUN_LINES, MAX_STRING_LENGTH, STORAGE_FORMAT_VERSION, WRITE_BUFFER_SIZE, ZSTD_WORKERS,
};
use crate::error::{bincode_io, EngineError, Result};
use crate::run::{Metric, Run};
use bincode::Options;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub mod legacy;
pub mod sidecar;
pub mod stats_cache;

pub use sidecar::BenchmarkMetadata;

/// Tag written at the start of every versioned data file
///
/// A legacy file starts with the length of its run sequence instead, which can
/// never decode to this tag.
pub const FILE_MAGIC: [u8; 4] = *b"FLSB";

/// Extension of the compressed data file
pub const DATA_EXTENSION: &str = "bin";

/// Extension of the metadata sidecar
pub const META_EXTENSION: &str = "meta";

/// Extension of the pre-calculated statistics cache
pub const STATS_EXTENSION: &str = "stats";

/// Largest encoded run accepted by the decoder
///
/// Every series at the line limit, the spec strings at their truncated length
/// and up to 1 MiB of label.
pub const MAX_ENCODED_RUN_BYTES: u64 = (Metric::ALL.len() * MAX_PER_RUN_LINES * 8
    + 6 * (8 + 4 * (MAX_STRING_LENGTH + 1))
    + 1024 * 1024) as u64;

/// Encoded size of [`FileHeader`] with some slack
const MAX_ENCODED_HEADER_BYTES: u64 = 64;

type FrameReader = zstd::Decoder<'static, BufReader<File>>;

/// Bincode settings matching `bincode::serialize_into`, with a read limit
fn limited(limit: u64) -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(limit)
}

/// Decode one value from `reader`, reading at most `limit` bytes
///
/// Length prefixes are checked against the remaining limit before anything
/// is allocated.
pub(crate) fn decode_limited<T, R>(reader: R, limit: u64) -> io::Result<T>
where
    T: DeserializeOwned,
    R: io::Read,
{
    limited(limit).deserialize_from(reader).map_err(bincode_io)
}

/// Decode one value from a fully read buffer
///
/// Lengths are checked against the buffer, so the limit is its size.
pub(crate) fn decode_slice<T: DeserializeOwned>(bytes: &[u8]) -> io::Result<T> {
    limited(bytes.len() as u64).deserialize(bytes).map_err(bincode_io)
}

/// First value of a versioned data file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHeader {
    pub magic: [u8; 4],
    pub version: u32,
    pub run_count: u64,
}

impl FileHeader {
    fn current(run_count: usize) -> Self {
        Self {
            magic: FILE_MAGIC,
            version: STORAGE_FORMAT_VERSION,
            run_count: run_count as u64,
        }
    }
}

/// Handle to the benchmarks directory
///
/// Cloning is cheap; clones share the per-benchmark write locks. Reads take no
/// lock and never cache decoded runs.
#[derive(Clone)]
pub struct BenchmarkStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    dir: PathBuf,
    write_locks: Mutex<HashMap<u32, Arc<Mutex<()>>>>,
}

impl BenchmarkStore {
    /// Initialize the benchmarks directory and open a store on it
    pub fn open(config: EngineConfig) -> io::Result<Self> {
        let dir = config.init()?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                dir,
                write_locks: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Directory holding the benchmark files
    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    /// Path of the compressed data file for `id`
    pub fn data_path(&self, id: u32) -> PathBuf {
        self.file_path(id, DATA_EXTENSION)
    }

    /// Path of the metadata sidecar for `id`
    pub fn meta_path(&self, id: u32) -> PathBuf {
        self.file_path(id, META_EXTENSION)
    }

    /// Path of the statistics cache for `id`
    pub fn stats_path(&self, id: u32) -> PathBuf {
        self.file_path(id, STATS_EXTENSION)
    }

    fn file_path(&self, id: u32, extension: &str) -> PathBuf {
        self.inner.dir.join(format!("{}.{}", id, extension))
    }

    /// Run `f` while holding the write lock of benchmark `id`
    ///
    /// Writers of the same benchmark are serialized; different benchmarks
    /// never contend. `f` must not call back into a locking write operation
    /// for the same id; use the `*_unlocked` variants instead.
    pub fn with_write_lock<T>(&self, id: u32, f: impl FnOnce() -> T) -> T {
        let lock = self.inner.write_locks.lock().entry(id).or_default().clone();
        let _guard = lock.lock();
        f()
    }

    /// Forget the write lock of `id` unless another caller still holds it
    fn release_write_lock(&self, id: u32) {
        let mut locks = self.inner.write_locks.lock();
        if locks.get(&id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }

    #[cfg(test)]
    fn write_lock_count(&self) -> usize {
        self.inner.write_locks.lock().len()
    }

    /// Persist `runs` as benchmark `id`, replacing any previous content
    ///
    /// Writes the data file, drops the statistics cache, then writes the
    /// sidecar. A sidecar failure is returned but leaves the new data file in
    /// place; [`BenchmarkStore::metadata`] rebuilds a missing sidecar.
    pub fn store(&self, id: u32, runs: &[Run]) -> Result<()> {
        self.with_write_lock(id, || self.store_unlocked(id, runs))
    }

    /// [`BenchmarkStore::store`] for callers already holding the write lock
    pub(crate) fn store_unlocked(&self, id: u32, runs: &[Run]) -> Result<()> {
        self.write_data_file(id, runs)?;
        self.invalidate_precomputed(id);

        let meta = BenchmarkMetadata::from_runs(runs);
        sidecar::write(&self.meta_path(id), &meta)
            .map_err(|source| EngineError::Write { id, source })?;

        info!("Stored benchmark {} ({} runs)", id, runs.len());
        Ok(())
    }

    fn write_data_file(&self, id: u32, runs: &[Run]) -> Result<()> {
        let write_err = |source| EngineError::Write { id, source };
        let path = self.data_path(id);

        let file = File::create(&path).map_err(write_err)?;
        let writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);
        let mut encoder = zstd::Encoder::new(writer, 0).map_err(write_err)?;
        encoder.multithread(ZSTD_WORKERS).map_err(write_err)?;

        bincode::serialize_into(&mut encoder, &FileHeader::current(runs.len()))
            .map_err(|e| write_err(bincode_io(e)))?;
        for run in runs {
            bincode::serialize_into(&mut encoder, run).map_err(|e| write_err(bincode_io(e)))?;
        }

        let mut writer = encoder.finish().map_err(write_err)?;
        writer.flush().map_err(write_err)?;

        debug!("Wrote {:?}", path);
        Ok(())
    }

    /// Open the data file of `id` for reading, one run at a time
    ///
    /// Versioned files yield a lazy decoder; legacy files are decoded in full
    /// because they carry no header to stream from.
    pub fn open_runs(&self, id: u32) -> Result<RunStream> {
        let path = self.data_path(id);
        let mut reader = open_frame(id, &path)?;

        let header: Option<FileHeader> = decode_limited(&mut reader, MAX_ENCODED_HEADER_BYTES).ok();
        match header {
            Some(h) if h.magic == FILE_MAGIC && h.version == STORAGE_FORMAT_VERSION => {
                Ok(RunStream::Streaming(RunDecoder {
                    id,
                    reader,
                    run_count: h.run_count as usize,
                    remaining: h.run_count,
                }))
            }
            Some(h) if h.magic == FILE_MAGIC && h.version != legacy::VERSION => {
                Err(EngineError::UnsupportedVersion {
                    id,
                    version: h.version,
                })
            }
            _ => {
                drop(reader);
                debug!("Benchmark {} uses the legacy format, loading in full", id);
                let runs = legacy::read_v1(&path).map_err(|e| read_error(id, &path, e))?;
                Ok(RunStream::Legacy(runs.into_iter()))
            }
        }
    }

    /// Storage format version of the data file of `id`
    pub fn probe_version(&self, id: u32) -> Result<u32> {
        let path = self.data_path(id);
        let mut reader = open_frame(id, &path)?;

        match decode_limited::<FileHeader, _>(&mut reader, MAX_ENCODED_HEADER_BYTES) {
            Ok(h) if h.magic == FILE_MAGIC => Ok(h.version),
            _ => Ok(legacy::VERSION),
        }
    }

    /// Decode every run of `id`
    pub fn load(&self, id: u32) -> Result<Vec<Run>> {
        match self.open_runs(id)? {
            RunStream::Streaming(decoder) => decoder.collect(),
            RunStream::Legacy(runs) => Ok(runs.collect()),
        }
    }

    /// Hand each run of `id` to `visitor` in order without retaining it
    ///
    /// Returns the number of runs visited. The first error, from decoding or
    /// from the visitor, stops the walk.
    pub fn for_each_run<F>(&self, id: u32, mut visitor: F) -> Result<usize>
    where
        F: FnMut(usize, Run) -> Result<()>,
    {
        let mut visited = 0;
        for run in self.open_runs(id)? {
            visitor(visited, run?)?;
            visited += 1;
        }
        Ok(visited)
    }

    /// Decode only the run at `index`
    ///
    /// Earlier runs are decoded and dropped. Legacy files are rejected with
    /// [`EngineError::UnsupportedVersion`].
    pub fn load_run(&self, id: u32, index: usize) -> Result<Run> {
        let mut decoder = match self.open_runs(id)? {
            RunStream::Streaming(decoder) => decoder,
            RunStream::Legacy(_) => {
                return Err(EngineError::UnsupportedVersion {
                    id,
                    version: legacy::VERSION,
                })
            }
        };

        let run_count = decoder.run_count();
        if index >= run_count {
            return Err(EngineError::IndexOutOfRange {
                id,
                index,
                run_count,
            });
        }

        for _ in 0..index {
            decoder.next().transpose()?;
        }
        decoder.next().transpose()?.ok_or_else(|| {
            EngineError::benchmark_read(
                id,
                io::Error::new(io::ErrorKind::UnexpectedEof, "run stream ended early"),
            )
        })
    }

    /// Remove benchmark `id` with its sidecar and statistics cache
    pub fn delete(&self, id: u32) -> Result<()> {
        let deleted = self.with_write_lock(id, || {
            let path = self.data_path(id);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(EngineError::NotFound { id, path });
                }
                Err(source) => return Err(EngineError::Write { id, source }),
            }

            for extra in [self.meta_path(id), self.stats_path(id)] {
                if let Err(e) = fs::remove_file(&extra) {
                    if e.kind() != io::ErrorKind::NotFound {
                        warn!("Failed to remove {:?}: {}", extra, e);
                    }
                }
            }

            info!("Deleted benchmark {}", id);
            Ok(())
        });
        self.release_write_lock(id);
        deleted
    }

    /// All `*.bin` files in the benchmarks directory, sorted by name
    pub fn data_files(&self) -> io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(self.dir())? {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == DATA_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Ids of all stored benchmarks, ascending
    ///
    /// Data files whose name is not a benchmark id are ignored.
    pub fn benchmark_ids(&self) -> io::Result<Vec<u32>> {
        let mut ids: Vec<u32> = self
            .data_files()?
            .iter()
            .filter_map(|path| benchmark_id_of(path))
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

/// Parse the benchmark id out of a `{id}.bin` path
pub fn benchmark_id_of(path: &Path) -> Option<u32> {
    path.file_stem()?.to_str()?.parse().ok()
}

fn open_frame(id: u32, path: &Path) -> Result<FrameReader> {
    let file = File::open(path).map_err(|e| read_error(id, path, e))?;
    zstd::Decoder::new(file).map_err(|e| EngineError::benchmark_read(id, e))
}

fn read_error(id: u32, path: &Path, source: io::Error) -> EngineError {
    if source.kind() == io::ErrorKind::NotFound {
        EngineError::NotFound {
            id,
            path: path.to_path_buf(),
        }
    } else {
        EngineError::benchmark_read(id, source)
    }
}

/// Runs of one benchmark, in insertion order
pub enum RunStream {
    /// Versioned file decoded lazily
    Streaming(RunDecoder),
    /// Legacy file, already decoded in full
    Legacy(std::vec::IntoIter<Run>),
}

impl RunStream {
    /// Total number of runs in the benchmark
    pub fn run_count(&self) -> usize {
        match self {
            RunStream::Streaming(decoder) => decoder.run_count(),
            RunStream::Legacy(runs) => runs.len(),
        }
    }
}

impl Iterator for RunStream {
    type Item = Result<Run>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            RunStream::Streaming(decoder) => decoder.next(),
            RunStream::Legacy(runs) => runs.next().map(Ok),
        }
    }
}

/// Lazy decoder over the runs of a versioned data file
pub struct RunDecoder {
    id: u32,
    reader: FrameReader,
    run_count: usize,
    remaining: u64,
}

impl RunDecoder {
    /// Run count recorded in the file header
    pub fn run_count(&self) -> usize {
        self.run_count
    }
}

impl Iterator for RunDecoder {
    type Item = Result<Run>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        match decode_limited(&mut self.reader, MAX_ENCODED_RUN_BYTES) {
            Ok(run) => {
                self.remaining -= 1;
                Some(Ok(run))
            }
            Err(e) => {
                // A corrupt frame cannot be resynchronized
                self.remaining = 0;
                Some(Err(EngineError::benchmark_read(self.id, e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, BenchmarkStore) {
        let temp = TempDir::new().unwrap();
        let store = BenchmarkStore::open(EngineConfig::new(temp.path())).unwrap();
        (temp, store)
    }

    fn labeled_runs(labels: &[&str]) -> Vec<Run> {
        labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let mut run = Run::new(*label);
                run.spec_cpu = "Test CPU".into();
                run.fps = (0..50).map(|x| 60.0 + (x + i) as f64 * 0.25).collect();
                run.frame_time = run.fps.iter().map(|f| 1000.0 / f).collect();
                run
            })
            .collect()
    }

    #[test]
    fn test_store_then_load_round_trip() {
        let (_temp, store) = test_store();
        let runs = labeled_runs(&["a", "b", "c"]);

        store.store(1, &runs).unwrap();
        assert_eq!(store.load(1).unwrap(), runs);
        assert!(store.data_path(1).exists());
        assert!(store.meta_path(1).exists());
        assert_eq!(store.probe_version(1).unwrap(), STORAGE_FORMAT_VERSION);
    }

    #[test]
    fn test_store_overwrites_previous_content() {
        let (_temp, store) = test_store();
        store.store(1, &labeled_runs(&["a", "b", "c"])).unwrap();
        store.store(1, &labeled_runs(&["z"])).unwrap();

        let loaded = store.load(1).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].label, "z");
    }

    #[test]
    fn test_empty_benchmark_round_trip() {
        let (_temp, store) = test_store();
        store.store(5, &[]).unwrap();
        assert!(store.load(5).unwrap().is_empty());
        assert_eq!(store.open_runs(5).unwrap().run_count(), 0);
    }

    #[test]
    fn test_for_each_run_visits_in_order() {
        let (_temp, store) = test_store();
        store.store(2, &labeled_runs(&["first", "second"])).unwrap();

        let mut seen = Vec::new();
        let count = store
            .for_each_run(2, |index, run| {
                seen.push((index, run.label));
                Ok(())
            })
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(seen, vec![(0, "first".to_string()), (1, "second".to_string())]);
    }

    #[test]
    fn test_for_each_run_stops_on_visitor_error() {
        let (_temp, store) = test_store();
        store.store(2, &labeled_runs(&["a", "b", "c"])).unwrap();

        let mut calls = 0;
        let result = store.for_each_run(2, |_, _| {
            calls += 1;
            Err(EngineError::EmptyBenchmark { id: 2 })
        });
        assert!(matches!(result, Err(EngineError::EmptyBenchmark { id: 2 })));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_load_run_selects_by_index() {
        let (_temp, store) = test_store();
        store.store(3, &labeled_runs(&["a", "b", "c"])).unwrap();

        assert_eq!(store.load_run(3, 0).unwrap().label, "a");
        assert_eq!(store.load_run(3, 2).unwrap().label, "c");
        assert!(matches!(
            store.load_run(3, 3),
            Err(EngineError::IndexOutOfRange {
                id: 3,
                index: 3,
                run_count: 3
            })
        ));
    }

    #[test]
    fn test_missing_benchmark_is_not_found() {
        let (_temp, store) = test_store();
        assert!(store.load(99).unwrap_err().is_not_found());
        assert!(store.load_run(99, 0).unwrap_err().is_not_found());
        assert!(store.delete(99).unwrap_err().is_not_found());
    }

    #[test]
    fn test_unsupported_version_is_rejected() {
        let (_temp, store) = test_store();
        let file = File::create(store.data_path(4)).unwrap();
        let mut encoder = zstd::Encoder::new(file, 0).unwrap();
        let header = FileHeader {
            magic: FILE_MAGIC,
            version: 3,
            run_count: 0,
        };
        bincode::serialize_into(&mut encoder, &header).unwrap();
        encoder.finish().unwrap();

        assert!(matches!(
            store.load(4),
            Err(EngineError::UnsupportedVersion { id: 4, version: 3 })
        ));
        assert_eq!(store.probe_version(4).unwrap(), 3);
    }

    #[test]
    fn test_truncated_file_is_read_error() {
        let (_temp, store) = test_store();
        store.store(6, &labeled_runs(&["a", "b"])).unwrap();

        let bytes = fs::read(store.data_path(6)).unwrap();
        fs::write(store.data_path(6), &bytes[..bytes.len() / 2]).unwrap();

        match store.load(6) {
            Err(EngineError::Read { .. }) => {}
            other => panic!("expected Read error, got {:?}", other.map(|r| r.len())),
        }
    }

    fn write_frame(path: &Path, payload: &[u8]) {
        let file = File::create(path).unwrap();
        let mut encoder = zstd::Encoder::new(file, 0).unwrap();
        encoder.write_all(payload).unwrap();
        encoder.finish().unwrap();
    }

    fn assert_read_error(result: Result<Vec<Run>>) {
        match result {
            Err(EngineError::Read { .. }) => {}
            other => panic!("expected Read error, got {:?}", other.map(|r| r.len())),
        }
    }

    #[test]
    fn test_huge_label_length_in_run_is_read_error() {
        let (_temp, store) = test_store();
        let mut payload = bincode::serialize(&FileHeader::current(1)).unwrap();
        payload.extend_from_slice(&0x6000_0000_0000_0000u64.to_le_bytes());
        payload.extend_from_slice(b"label");
        write_frame(&store.data_path(1), &payload);

        // Rejected by the decode limit, not by running out of input
        match store.load_run(1, 0) {
            Err(EngineError::Read { source, .. }) => {
                assert_eq!(source.kind(), io::ErrorKind::InvalidData)
            }
            other => panic!("expected Read error, got {:?}", other.map(|r| r.label)),
        }
        assert_read_error(store.load(1));
    }

    #[test]
    fn test_huge_label_length_in_legacy_file_is_read_error() {
        let (_temp, store) = test_store();
        let mut payload = 1u64.to_le_bytes().to_vec();
        payload.extend_from_slice(&0x6000_0000_0000_0000u64.to_le_bytes());
        payload.extend_from_slice(b"label");
        write_frame(&store.data_path(2), &payload);

        assert_read_error(store.load(2));
    }

    #[test]
    fn test_run_at_line_limit_fits_decode_limit() {
        let mut run = Run::new("x".repeat(1000));
        for metric in Metric::ALL {
            *run.series_mut(metric) = vec![1.0; MAX_PER_RUN_LINES];
        }
        run.spec_cpu = "é".repeat(MAX_STRING_LENGTH) + "…";
        let encoded = bincode::serialized_size(&run).unwrap();
        assert!(encoded <= MAX_ENCODED_RUN_BYTES);
    }

    #[test]
    fn test_delete_releases_write_lock() {
        let (_temp, store) = test_store();
        store.store(7, &labeled_runs(&["a"])).unwrap();
        store.store(8, &labeled_runs(&["a"])).unwrap();
        assert_eq!(store.write_lock_count(), 2);

        store.delete(7).unwrap();
        assert_eq!(store.write_lock_count(), 1);

        // A failed delete leaves nothing behind either
        assert!(store.delete(9).is_err());
        assert_eq!(store.write_lock_count(), 1);
    }

    #[test]
    fn test_delete_removes_all_files() {
        let (_temp, store) = test_store();
        store.store(7, &labeled_runs(&["a"])).unwrap();
        fs::write(store.stats_path(7), b"cache").unwrap();

        store.delete(7).unwrap();
        assert!(!store.data_path(7).exists());
        assert!(!store.meta_path(7).exists());
        assert!(!store.stats_path(7).exists());
    }

    #[test]
    fn test_delete_without_sidecar() {
        let (_temp, store) = test_store();
        store.store(8, &labeled_runs(&["a"])).unwrap();
        fs::remove_file(store.meta_path(8)).unwrap();

        store.delete(8).unwrap();
        assert!(!store.data_path(8).exists());
    }

    #[test]
    fn test_benchmark_ids_skip_foreign_files() {
        let (_temp, store) = test_store();
        store.store(12, &labeled_runs(&["a"])).unwrap();
        store.store(3, &labeled_runs(&["a"])).unwrap();
        fs::write(store.dir().join("notes.bin"), b"x").unwrap();
        fs::write(store.dir().join("readme.txt"), b"x").unwrap();

        assert_eq!(store.data_files().unwrap().len(), 3);
        assert_eq!(store.benchmark_ids().unwrap(), vec![3, 12]);
    }

    #[test]
    fn test_concurrent_writers_different_ids() {
        let (_temp, store) = test_store();
        let handles: Vec<_> = (0..4u32)
            .map(|id| {
                let store = store.clone();
                std::thread::spawn(move || {
                    let label = format!("run-{}", id);
                    store.store(id, &labeled_runs(&[label.as_str()])).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        for id in 0..4u32 {
            assert_eq!(store.load(id).unwrap()[0].label, format!("run-{}", id));
        }
    }
}
