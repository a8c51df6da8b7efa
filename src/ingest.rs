//! # Capture Ingest
//!
//! Turns one uploaded capture into a [`Run`]. Ingest makes two passes over the
//! upload:
//!
//! 1. **Count**: read the whole upload once, counting lines. Nothing is kept.
//! 2. **Parse**: rewind, sniff the dialect, read the specs and header lines,
//!    then parse every data line into the series named by its column.
//!
//! Knowing the line count up front lets every series present in the header be
//! allocated once with its final capacity, so parsing never reallocates.
//!
//! ## Column Handling
//!
//! Each data line is split on commas and every field is trimmed and parsed on
//! its own. A field that is not a finite number is skipped for that column
//! only; the rest of the line is still used. Columns whose names are unknown
//! are ignored. Hardware-monitor logs carry a few columns in other units,
//! which are converted here and nowhere else:
//!
//! | Column         | Conversion            |
//! |----------------|-----------------------|
//! | `Memory clock` | ÷ 2 (effective clock) |
//! | `Memory usage` | ÷ 1024 (MB → GB)      |
//! | `RAM usage`    | ÷ 1024 (MB → GB)      |

use crate::dialect::Dialect;
use crate::error::{EngineError, Result};
use crate::run::{Metric, Run};
use crate::utils::{format_bytes, truncate_spec};
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek};
use std::path::Path;
use tracing::debug;

/// Decimal places kept after a unit conversion
const CONVERSION_PRECISION: f64 = 100_000.0;

/// Number of lines consumed before data: dialect line, specs line, header
const PREAMBLE_LINES: usize = 3;

/// Parse one uploaded capture
///
/// `filename` is the name the upload was submitted under; it names the run
/// and appears in every error.
pub fn ingest<R: Read + Seek>(mut upload: R, filename: &str) -> Result<Run> {
    let total_lines =
        count_lines(&mut upload).map_err(|e| EngineError::upload_read(filename, e))?;
    upload
        .rewind()
        .map_err(|e| EngineError::upload_read(filename, e))?;

    let mut lines = LineReader::new(upload);
    let read_err = |e| EngineError::upload_read(filename, e);

    let first_line = lines.next_line().map_err(read_err)?.unwrap_or_default();
    let dialect = Dialect::detect(&first_line).ok_or_else(|| EngineError::UnsupportedFormat {
        filename: filename.to_string(),
        first_line: truncate_spec(&first_line),
    })?;
    debug!("Detected {} capture in '{}'", dialect, filename);

    let mut run = Run::new(dialect.label_for(filename));

    let specs_line = lines
        .next_line()
        .map_err(read_err)?
        .ok_or_else(|| invalid_specs(filename, "unexpected end of file while reading specs line"))?;
    parse_specs(dialect, &specs_line, &mut run).map_err(|reason| invalid_specs(filename, reason))?;

    let header_line = lines
        .next_line()
        .map_err(read_err)?
        .ok_or_else(|| invalid_specs(filename, "unexpected end of file while reading header line"))?;
    let columns: Vec<Option<Metric>> = header_line
        .split(',')
        .map(|name| Metric::from_column(name.trim()))
        .collect();

    let mut consumed = PREAMBLE_LINES;
    if dialect == Dialect::WindowsMonitor {
        // One extra header row per column
        for skipped in 0..columns.len() {
            if lines.next_line().map_err(read_err)?.is_none() {
                return Err(invalid_specs(
                    filename,
                    format!(
                        "unexpected end of file while skipping header rows (expected {}, got {})",
                        columns.len(),
                        skipped
                    ),
                ));
            }
        }
        consumed += columns.len();
    }

    let remaining = total_lines.saturating_sub(consumed);
    for metric in Metric::ALL {
        let occurrences = columns.iter().filter(|&&c| c == Some(metric)).count();
        if occurrences > 0 {
            run.series_mut(metric).reserve_exact(remaining * occurrences);
        }
    }

    let mut data_lines = 0usize;
    while let Some(line) = lines.next_line().map_err(read_err)? {
        data_lines += 1;
        for (position, field) in line.split(',').enumerate() {
            let Some(Some(metric)) = columns.get(position).copied() else {
                continue;
            };
            let Some(mut value) = parse_sample(field) else {
                continue;
            };
            if dialect == Dialect::WindowsMonitor {
                value = convert_monitor_unit(metric, value);
            }
            run.series_mut(metric).push(value);
        }
    }

    if run.is_empty() {
        return Err(EngineError::EmptyCapture {
            filename: filename.to_string(),
        });
    }

    debug!(
        "Parsed '{}': {} data lines, {} samples per run",
        run.label,
        data_lines,
        run.run_count()
    );
    Ok(run)
}

/// Open and parse a capture from disk, named by its file name
pub fn ingest_path(path: impl AsRef<Path>) -> Result<Run> {
    let path = path.as_ref();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let file = File::open(path).map_err(|e| EngineError::upload_read(&filename, e))?;
    ingest(file, &filename)
}

/// Count the lines of `reader`
///
/// Every newline ends a line; trailing bytes after the last newline form one
/// more line.
pub fn count_lines<R: Read>(reader: R) -> io::Result<usize> {
    let mut reader = BufReader::new(reader);
    let mut lines = 0;
    let mut last_byte = None;

    loop {
        let chunk = reader.fill_buf()?;
        if chunk.is_empty() {
            break;
        }
        lines += chunk.iter().filter(|&&b| b == b'\n').count();
        last_byte = chunk.last().copied();
        let len = chunk.len();
        reader.consume(len);
    }

    if matches!(last_byte, Some(b) if b != b'\n') {
        lines += 1;
    }
    Ok(lines)
}

/// Parse one numeric field, rejecting anything that is not a finite number
fn parse_sample(field: &str) -> Option<f64> {
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

fn convert_monitor_unit(metric: Metric, value: f64) -> f64 {
    match metric {
        Metric::GpuMemClock => round_converted(value / 2.0),
        Metric::GpuVramUsed | Metric::RamUsed => round_converted(value / 1024.0),
        _ => value,
    }
}

fn round_converted(value: f64) -> f64 {
    (value * CONVERSION_PRECISION).round() / CONVERSION_PRECISION
}

fn parse_specs(dialect: Dialect, line: &str, run: &mut Run) -> std::result::Result<(), String> {
    let fields: Vec<&str> = line.split(',').map(str::trim).collect();

    match dialect {
        Dialect::WindowsMonitor => {
            if fields.len() < 3 {
                return Err(format!(
                    "expected at least 3 fields, found {}",
                    fields.len()
                ));
            }
            run.spec_os = "Windows".to_string();
            run.spec_gpu = truncate_spec(fields[2]);
        }
        Dialect::LinuxOverlay => {
            for (position, value) in fields.iter().enumerate() {
                match position {
                    0 => run.spec_os = truncate_spec(value),
                    1 => run.spec_cpu = truncate_spec(value),
                    2 => run.spec_gpu = truncate_spec(value),
                    3 => run.spec_ram = format_ram_kilobytes(value),
                    4 => run.spec_linux_kernel = truncate_spec(value),
                    6 => run.spec_linux_scheduler = truncate_spec(value),
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// Kilobytes as written by the overlay tool, shown as a byte size
///
/// Anything that is not a whole number of kilobytes is kept as text.
fn format_ram_kilobytes(value: &str) -> String {
    value
        .parse::<u64>()
        .ok()
        .and_then(|kb| kb.checked_mul(1024))
        .map(format_bytes)
        .unwrap_or_else(|| truncate_spec(value))
}

fn invalid_specs(filename: &str, reason: impl Into<String>) -> EngineError {
    EngineError::InvalidSpecs {
        filename: filename.to_string(),
        reason: reason.into(),
    }
}

/// Line reader that reuses one buffer and tolerates invalid UTF-8
struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
}

impl<R: Read> LineReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            buf: Vec::with_capacity(256),
        }
    }

    /// Next line without its `\n` or `\r\n` terminator
    fn next_line(&mut self) -> io::Result<Option<Cow<'_, str>>> {
        self.buf.clear();
        if self.inner.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        if self.buf.last() == Some(&b'\n') {
            self.buf.pop();
        }
        if self.buf.last() == Some(&b'\r') {
            self.buf.pop();
        }
        Ok(Some(String::from_utf8_lossy(&self.buf)))
    }
}
