use crate::stats::QuantileMethod;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Benchmark Data Engine - ingest, store and export gaming benchmark captures
#[derive(Parser, Debug)]
#[clap(version, about, long_about = None)]
pub struct Args {
    /// Root data directory; benchmarks live in its `benchmarks/` subdirectory
    #[clap(long, global = true, env = "BENCH_DATA_DIR", default_value = crate::defaults::DATA_DIR)]
    pub data_dir: PathBuf,

    /// Also write logs to this file
    #[clap(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Disable colored log output
    #[clap(long, global = true, default_value_t = false)]
    pub plain_logs: bool,

    /// Verbose output (debug logs unless RUST_LOG is set)
    #[clap(short = 'v', long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

/// Engine operations
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Parse capture files and store them as a new benchmark
    Ingest {
        /// Benchmark id
        #[clap(long)]
        id: u32,

        /// Capture files (.csv overlay logs or .hml monitor logs)
        #[clap(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Append capture files to an existing benchmark
    Add {
        #[clap(long)]
        id: u32,

        #[clap(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Remove one run from a benchmark
    RemoveRun {
        #[clap(long)]
        id: u32,

        /// Zero-based run index
        #[clap(long)]
        index: usize,
    },

    /// Relabel runs of a benchmark
    RenameRun {
        #[clap(long)]
        id: u32,

        /// New labels as INDEX=LABEL pairs
        #[clap(long = "label", value_parser = parse_label_assignment, required = true, num_args = 1..)]
        labels: Vec<(usize, String)>,
    },

    /// Stream all runs of a benchmark as JSON
    Json {
        #[clap(long)]
        id: u32,

        /// Output file (stdout when omitted)
        #[clap(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Statistics and chart series of a single run, optionally trimmed
    Run {
        #[clap(long)]
        id: u32,

        #[clap(long)]
        index: usize,

        /// First sample to keep
        #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
        start: i64,

        /// Last sample to keep (0 keeps everything)
        #[clap(long, default_value_t = 0, allow_hyphen_values = true)]
        end: i64,
    },

    /// Export a benchmark as a ZIP archive of CSV files
    Export {
        #[clap(long)]
        id: u32,

        /// Archive path
        #[clap(short = 'o', long)]
        output: PathBuf,
    },

    /// Pre-calculated statistics of every run
    Stats {
        #[clap(long)]
        id: u32,

        /// Only print the summaries of this quantile method
        #[clap(long, value_enum)]
        method: Option<QuantileMethod>,
    },

    /// Run count and labels of a benchmark
    Meta {
        #[clap(long)]
        id: u32,
    },

    /// Delete a benchmark and its cached files
    Delete {
        #[clap(long)]
        id: u32,
    },

    /// Upgrade legacy data files to the current storage format
    Migrate {
        /// Also fill missing statistics caches
        #[clap(long, default_value_t = false)]
        stats: bool,
    },
}

/// Parse `INDEX=LABEL` (e.g. "0=Ultra preset")
fn parse_label_assignment(s: &str) -> Result<(usize, String), String> {
    let (index, label) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected INDEX=LABEL, got: {}", s))?;

    let index = index
        .trim()
        .parse()
        .map_err(|_| format!("Invalid run index: {}", index))?;

    let label = label.trim();
    if label.is_empty() {
        return Err("Label cannot be empty".to_string());
    }

    Ok((index, label.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_label_assignment() {
        assert_eq!(
            parse_label_assignment("0=Ultra preset").unwrap(),
            (0, "Ultra preset".to_string())
        );
        assert_eq!(
            parse_label_assignment(" 3 = a=b ").unwrap(),
            (3, "a=b".to_string())
        );

        assert!(parse_label_assignment("").is_err());
        assert!(parse_label_assignment("Ultra").is_err());
        assert!(parse_label_assignment("x=Ultra").is_err());
        assert!(parse_label_assignment("-1=Ultra").is_err());
        assert!(parse_label_assignment("2=  ").is_err());
    }

    #[test]
    fn test_args_parse_subcommands() {
        let args = Args::parse_from([
            "bench-engine",
            "--data-dir",
            "/srv/bench",
            "ingest",
            "--id",
            "7",
            "a.csv",
            "b.hml",
        ]);
        assert_eq!(args.data_dir, PathBuf::from("/srv/bench"));
        assert_eq!(
            args.command,
            Command::Ingest {
                id: 7,
                files: vec![PathBuf::from("a.csv"), PathBuf::from("b.hml")],
            }
        );

        let args = Args::parse_from([
            "bench-engine",
            "rename-run",
            "--id",
            "1",
            "--label",
            "0=Low",
            "2=High",
        ]);
        assert_eq!(
            args.command,
            Command::RenameRun {
                id: 1,
                labels: vec![(0, "Low".to_string()), (2, "High".to_string())],
            }
        );
    }

    #[test]
    fn test_args_run_window_and_method() {
        let args = Args::parse_from([
            "bench-engine",
            "run",
            "--id",
            "4",
            "--index",
            "1",
            "--start",
            "-5",
            "--end",
            "100",
        ]);
        assert_eq!(
            args.command,
            Command::Run {
                id: 4,
                index: 1,
                start: -5,
                end: 100,
            }
        );

        let args = Args::parse_from(["bench-engine", "stats", "--id", "4", "--method", "overlay"]);
        assert_eq!(
            args.command,
            Command::Stats {
                id: 4,
                method: Some(QuantileMethod::Overlay),
            }
        );
    }

    #[test]
    fn test_args_rejects_missing_files() {
        assert!(Args::try_parse_from(["bench-engine", "ingest", "--id", "1"]).is_err());
    }
}
