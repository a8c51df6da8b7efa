//! Helpers shared by the integration tests.
#![allow(dead_code)]

use benchmark_data_engine::{BenchmarkStore, EngineConfig, Run};
use std::path::PathBuf;
use tempfile::TempDir;

/// Overlay capture with four columns and three data lines
pub const OVERLAY_CAPTURE: &str = "os,cpu,gpu,ram,kernel,driver,cpuscheduler
Linux,Test CPU,Test GPU,16000000,5.10.0,,performance
fps,frametime,cpu_load,gpu_load
60.0,16.67,50.0,80.0
59.5,16.81,51.0,81.0
61.2,16.34,49.0,79.0
";

/// A store rooted in a fresh temporary directory
///
/// Keep the returned directory alive for as long as the store is used.
pub fn temp_store() -> (TempDir, BenchmarkStore) {
    let temp = TempDir::new().expect("create temp dir");
    let store = BenchmarkStore::open(EngineConfig::new(temp.path())).expect("open store");
    (temp, store)
}

/// Write `content` to `name` inside `dir` and return its path
pub fn write_capture(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("write capture");
    path
}

/// A run with `samples` values in each of the first `series` metrics
pub fn synthetic_run(label: &str, series: usize, samples: usize) -> Run {
    let mut run = Run::new(label);
    run.spec_os = "Linux".into();
    run.spec_cpu = "AMD Ryzen 7 7800X3D".into();
    run.spec_gpu = "AMD Radeon RX 7900 XTX".into();
    run.spec_ram = "31 GB".into();

    for (m, metric) in benchmark_data_engine::Metric::ALL.iter().take(series).enumerate() {
        *run.series_mut(*metric) = (0..samples)
            .map(|i| 50.0 + ((i * 7 + m * 13) % 97) as f64 * 0.5)
            .collect();
    }
    run
}
