//! # Archive Export
//!
//! Packs every run of a benchmark into a ZIP archive, one overlay-dialect CSV
//! file per run. The files can be uploaded again as they are: the RAM spec is
//! converted back to kilobytes and samples are written in their shortest
//! exact decimal form, so re-ingesting an exported overlay capture yields the
//! same run.
//!
//! Runs are read one at a time; only the run being written is in memory.

use crate::defaults::EXPORT_FLUSH_INTERVAL;
use crate::dialect::LINUX_OVERLAY_HEADER;
use crate::error::{EngineError, Result};
use crate::run::{Metric, Run};
use crate::storage::BenchmarkStore;
use crate::utils::format_sample;
use std::collections::HashSet;
use std::io::{Seek, Write};
use tracing::debug;
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Characters replaced by `_` in archive member names
const RESERVED_CHARS: [char; 10] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|', ' '];

/// Write benchmark `id` to `sink` as a ZIP archive and return the sink
///
/// Fails with [`EngineError::EmptyBenchmark`] when the benchmark has no runs.
/// Member names come from [`sanitize_filename`]; a name already used by an
/// earlier run gets a numeric suffix (`run_2.csv`).
pub fn export_zip<W: Write + Seek>(store: &BenchmarkStore, id: u32, sink: W) -> Result<W> {
    let runs = store.open_runs(id)?;
    if runs.run_count() == 0 {
        return Err(EngineError::EmptyBenchmark { id });
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut archive = ZipWriter::new(sink);
    let mut used_names = HashSet::new();
    let mut exported = 0;

    for run in runs {
        let run = run?;
        let name = unique_member_name(&mut used_names, &run.label);
        archive
            .start_file(name, options)
            .map_err(|e| zip_error(id, e))?;
        write_run_csv(&mut archive, &run).map_err(|e| csv_error(id, e))?;

        exported += 1;
        if exported % EXPORT_FLUSH_INTERVAL == 0 {
            archive.flush().map_err(|e| EngineError::sink(id, e))?;
        }
    }

    let sink = archive.finish().map_err(|e| zip_error(id, e))?;
    debug!("Exported {} runs of benchmark {} as ZIP", exported, id);
    Ok(sink)
}

/// Write one run as an overlay-dialect CSV document
pub fn write_run_csv<W: Write>(writer: W, run: &Run) -> csv::Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv.write_record(LINUX_OVERLAY_HEADER.split(','))?;
    csv.write_record([
        run.spec_os.as_str(),
        run.spec_cpu.as_str(),
        run.spec_gpu.as_str(),
        ram_to_kilobytes(&run.spec_ram).as_str(),
        run.spec_linux_kernel.as_str(),
        "",
        run.spec_linux_scheduler.as_str(),
    ])?;
    csv.write_record(Metric::ALL.iter().map(|m| m.column_name()))?;

    for i in 0..run.run_count() {
        for metric in Metric::ALL {
            match run.series(metric).get(i) {
                Some(&value) => csv.write_field(format_sample(value))?,
                None => csv.write_field("")?,
            }
        }
        csv.write_record(None::<&[u8]>)?;
    }

    csv.flush()?;
    Ok(())
}

/// Make a run label safe to use as a file name
///
/// Trims outer whitespace and replaces path separators, wildcard and quoting
/// characters, and spaces with `_`. An empty result becomes "benchmark".
pub fn sanitize_filename(label: &str) -> String {
    let sanitized: String = label
        .trim()
        .chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { '_' } else { c })
        .collect();

    if sanitized.is_empty() {
        "benchmark".to_string()
    } else {
        sanitized
    }
}

/// Convert a human-readable RAM size back to whole kilobytes
///
/// Understands `"<number> <unit>"` with units B, KB, MB, GB and TB in any
/// case. Plain integers are already kilobytes and pass through. Anything else
/// yields an empty string.
pub fn ram_to_kilobytes(ram: &str) -> String {
    let ram = ram.trim();
    if ram.is_empty() {
        return String::new();
    }
    if ram.parse::<i64>().is_ok() {
        return ram.to_string();
    }

    let mut parts = ram.split_whitespace();
    let (Some(number), Some(unit)) = (parts.next(), parts.next()) else {
        return String::new();
    };
    let Ok(value) = number.parse::<f64>() else {
        return String::new();
    };

    let kilobytes = match unit.to_ascii_uppercase().as_str() {
        "TB" => value * 1024.0 * 1024.0 * 1024.0,
        "GB" => value * 1024.0 * 1024.0,
        "MB" => value * 1024.0,
        "KB" => value,
        "B" => value / 1024.0,
        _ => return String::new(),
    };
    (kilobytes as i64).to_string()
}

fn unique_member_name(used: &mut HashSet<String>, label: &str) -> String {
    let stem = sanitize_filename(label);
    let mut name = format!("{}.csv", stem);
    let mut suffix = 2;
    while !used.insert(name.clone()) {
        name = format!("{}_{}.csv", stem, suffix);
        suffix += 1;
    }
    name
}

fn zip_error(id: u32, err: ZipError) -> EngineError {
    match err {
        ZipError::Io(source) => EngineError::sink(id, source),
        other => EngineError::Archive {
            id,
            message: other.to_string(),
        },
    }
}

fn csv_error(id: u32, err: csv::Error) -> EngineError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) => EngineError::sink(id, source),
        other => EngineError::Archive {
            id,
            message: format!("{:?}", other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::io::{Cursor, Read};
    use tempfile::TempDir;

    fn sample_run(label: &str) -> Run {
        let mut run = Run::new(label);
        run.spec_os = "Linux".into();
        run.spec_cpu = "Test CPU".into();
        run.spec_gpu = "Test GPU".into();
        run.spec_ram = "16 GB".into();
        run.spec_linux_kernel = "6.8.0".into();
        run.spec_linux_scheduler = "bore".into();
        run.fps = vec![60.0, 59.5, 61.25];
        run.frame_time = vec![16.67, 16.81];
        run
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("  my run  "), "my_run");
        assert_eq!(sanitize_filename("a/b\\c:d*e?f\"g<h>i|j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("   "), "benchmark");
        assert_eq!(sanitize_filename(""), "benchmark");
        assert_eq!(sanitize_filename("Cyberpunk 2077 (RT)"), "Cyberpunk_2077_(RT)");
    }

    #[test]
    fn test_sanitize_filename_is_idempotent() {
        for label in ["  x / y ", "plain", "", "***", "a b\tc"] {
            let once = sanitize_filename(label);
            assert_eq!(sanitize_filename(&once), once);
            assert!(!once.contains(&RESERVED_CHARS[..]));
        }
    }

    #[test]
    fn test_ram_to_kilobytes() {
        assert_eq!(ram_to_kilobytes("16 GB"), "16777216");
        assert_eq!(ram_to_kilobytes("8 GB"), "8388608");
        assert_eq!(ram_to_kilobytes("15 gb"), "15728640");
        assert_eq!(ram_to_kilobytes("8.0 GB"), "8388608");
        assert_eq!(ram_to_kilobytes("512 MB"), "524288");
        assert_eq!(ram_to_kilobytes("1024 KB"), "1024");
        assert_eq!(ram_to_kilobytes("2048 B"), "2");
        assert_eq!(ram_to_kilobytes("1 TB"), "1073741824");
        assert_eq!(ram_to_kilobytes("12345"), "12345");
        assert_eq!(ram_to_kilobytes("16GB"), "");
        assert_eq!(ram_to_kilobytes("invalid"), "");
        assert_eq!(ram_to_kilobytes("16 XB"), "");
        assert_eq!(ram_to_kilobytes(""), "");
    }

    #[test]
    fn test_write_run_csv_layout() {
        let mut out = Vec::new();
        write_run_csv(&mut out, &sample_run("csv")).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], LINUX_OVERLAY_HEADER);
        assert_eq!(lines[1], "Linux,Test CPU,Test GPU,16777216,6.8.0,,bore");
        assert_eq!(
            lines[2],
            "fps,frametime,cpu_load,gpu_load,cpu_temp,cpu_power,gpu_temp,gpu_core_clock,gpu_mem_clock,gpu_vram_used,gpu_power,ram_used,swap_used"
        );
        assert_eq!(lines[3], "60,16.67,,,,,,,,,,,");
        assert_eq!(lines[4], "59.5,16.81,,,,,,,,,,,");
        assert_eq!(lines[5], "61.25,,,,,,,,,,,,");
        assert_eq!(lines.len(), 6);
        assert!(!text.contains('\r'));
    }

    #[test]
    fn test_export_zip_members() {
        let temp = TempDir::new().unwrap();
        let store = BenchmarkStore::open(EngineConfig::new(temp.path())).unwrap();
        store
            .store(1, &[sample_run("first run"), sample_run("b/c"), sample_run("first run")])
            .unwrap();

        let cursor = export_zip(&store, 1, Cursor::new(Vec::new())).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();

        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert_eq!(names, vec!["first_run.csv", "b_c.csv", "first_run_2.csv"]);

        let mut content = String::new();
        archive
            .by_name("b_c.csv")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert!(content.starts_with(LINUX_OVERLAY_HEADER));
    }

    #[test]
    fn test_export_empty_benchmark() {
        let temp = TempDir::new().unwrap();
        let store = BenchmarkStore::open(EngineConfig::new(temp.path())).unwrap();
        store.store(2, &[]).unwrap();

        let result = export_zip(&store, 2, Cursor::new(Vec::new()));
        assert!(matches!(result, Err(EngineError::EmptyBenchmark { id: 2 })));
    }

    #[test]
    fn test_export_missing_benchmark() {
        let temp = TempDir::new().unwrap();
        let store = BenchmarkStore::open(EngineConfig::new(temp.path())).unwrap();

        let result = export_zip(&store, 3, Cursor::new(Vec::new()));
        assert!(result.unwrap_err().is_not_found());
    }
}
