mod common;

use anyhow::Result;
use benchmark_data_engine::{
    export::export_zip,
    ingest::{ingest, ingest_path},
    search::extract_search_metadata,
    utils::format_bytes,
    EngineError,
};
use common::{temp_store, write_capture, OVERLAY_CAPTURE};
use std::io::{Cursor, Read};
use tempfile::TempDir;

/// Ingest an overlay capture from disk, store it, load it back, export it,
/// and re-ingest the exported member.
#[test]
fn overlay_capture_survives_store_and_export() -> Result<()> {
    let uploads = TempDir::new()?;
    let path = write_capture(&uploads, "run1.csv", OVERLAY_CAPTURE);
    let (_data, store) = temp_store();

    let run = ingest_path(&path)?;
    assert_eq!(run.label, "run1");
    assert_eq!(run.spec_os, "Linux");
    assert_eq!(run.spec_ram, format_bytes(16_000_000 * 1024));
    assert_eq!(run.fps, vec![60.0, 59.5, 61.2]);
    assert_eq!(run.frame_time, vec![16.67, 16.81, 16.34]);
    assert_eq!(run.cpu_load, vec![50.0, 51.0, 49.0]);
    assert_eq!(run.gpu_load, vec![80.0, 81.0, 79.0]);
    assert!(run.cpu_temp.is_empty());
    assert!(run.swap_used.is_empty());

    store.store(1, std::slice::from_ref(&run))?;
    let loaded = store.load(1)?;
    assert_eq!(loaded, vec![run.clone()]);

    let meta = store.metadata(1)?;
    assert_eq!(meta.run_count, 1);
    assert_eq!(meta.run_labels, vec!["run1"]);

    let archive = export_zip(&store, 1, Cursor::new(Vec::new()))?;
    let mut archive = zip::ZipArchive::new(Cursor::new(archive.into_inner()))?;
    assert_eq!(archive.len(), 1);

    let mut member = Vec::new();
    archive.by_name("run1.csv")?.read_to_end(&mut member)?;
    let reingested = ingest(Cursor::new(member), "run1.csv")?;
    assert_eq!(reingested, run);
    Ok(())
}

/// Several captures of both dialects end up as one benchmark with the
/// expected search strings.
#[test]
fn mixed_dialect_benchmark() -> Result<()> {
    let uploads = TempDir::new()?;
    let overlay = write_capture(&uploads, "linux.csv", OVERLAY_CAPTURE);

    let mut monitor = String::new();
    monitor.push_str("00, 01-02-2024 10:00:00, Hardware monitoring log v1.6\n");
    monitor.push_str("01, 01-02-2024 10:00:00, NVIDIA GeForce RTX 4080\n");
    monitor.push_str("02, 01-02-2024 10:00:00, Framerate, Frametime, Memory clock\n");
    // One description row per header field
    for _ in 0..5 {
        monitor.push_str("03, sensor description\n");
    }
    monitor.push_str("80, 01-02-2024 10:00:01, 120.0, 8.33, 10501.0\n");
    monitor.push_str("80, 01-02-2024 10:00:02, 118.0, 8.47, 10501.0\n");
    let monitor = write_capture(&uploads, "windows.hml", &monitor);

    let runs = vec![ingest_path(&overlay)?, ingest_path(&monitor)?];
    assert_eq!(runs[1].label, "windows");
    assert_eq!(runs[1].gpu_mem_clock, vec![5250.5, 5250.5]);

    let (_data, store) = temp_store();
    store.store(2, &runs)?;
    assert_eq!(store.load(2)?, runs);

    let search = extract_search_metadata(&runs);
    assert_eq!(search.labels, "linux, windows");
    assert!(search.specs.contains("NVIDIA GeForce RTX 4080"));
    assert!(search.specs.contains("performance"));
    Ok(())
}

#[test]
fn rejected_uploads_name_the_file() {
    let uploads = TempDir::new().unwrap();

    let bogus = write_capture(&uploads, "notes.csv", "hello,world\n1,2\n");
    match ingest_path(&bogus) {
        Err(EngineError::UnsupportedFormat { filename, .. }) => assert_eq!(filename, "notes.csv"),
        other => panic!("expected UnsupportedFormat, got {:?}", other),
    }

    let empty = write_capture(
        &uploads,
        "empty.csv",
        "os,cpu,gpu,ram,kernel,driver,cpuscheduler\nLinux,CPU,GPU,1024,6.1,,bore\nfps,frametime\nn/a,n/a\n",
    );
    match ingest_path(&empty) {
        Err(EngineError::EmptyCapture { filename }) => assert_eq!(filename, "empty.csv"),
        other => panic!("expected EmptyCapture, got {:?}", other),
    }

    let missing = uploads.path().join("missing.csv");
    assert!(matches!(ingest_path(&missing), Err(EngineError::Read { .. })));
}
