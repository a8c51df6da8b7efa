//! # Benchmark Data Engine - Main Entry Point
//!
//! Command-line front end to the data engine. Each subcommand maps to one
//! engine operation on the benchmarks directory under `--data-dir`:
//!
//! - `ingest` / `add`: parse capture files and store or append them
//! - `remove-run` / `rename-run`: whole-benchmark run edits
//! - `json` / `export`: stream a benchmark as JSON or as a ZIP of CSV files
//! - `run` / `stats` / `meta`: statistics, chart series and listings
//! - `delete` / `migrate`: housekeeping
//!
//! ## Output
//!
//! Command results are written to stdout as JSON so the binary can sit behind
//! a web handler or a shell pipeline. Logs go to stderr.
//!
//! ## Concurrency Model
//!
//! Engine calls are blocking. Capture files are parsed in parallel on Tokio's
//! blocking pool; everything else runs on a single blocking task.

use anyhow::{bail, Context, Result};
use benchmark_data_engine::{
    cli::{Args, Command},
    export::export_zip,
    ingest::ingest_path,
    migrate::{migrate_precomputed_stats, migrate_storage},
    mutation::{add_runs, delete_run, rename_runs},
    run::validate_per_run_lines,
    search::extract_search_metadata,
    stats::PreCalculatedRun,
    stream::{stream_json, PlainSink},
    utils::format_duration,
    BenchmarkStore, EngineConfig, Run,
};
use clap::Parser;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Held until exit so the file writer drains its queue
    let _log_guard = benchmark_data_engine::logging::init(
        args.plain_logs,
        args.verbose,
        args.log_file.as_deref(),
    )?;

    debug!("Configuration: {:?}", args);

    let config = EngineConfig::from_args(&args);
    let store = BenchmarkStore::open(config.clone())
        .with_context(|| format!("Failed to initialize data directory {:?}", config.data_dir))?;

    let started = Instant::now();
    run_command(store, args.command).await?;
    debug!("Finished in {}", format_duration(started.elapsed()));
    Ok(())
}

/// Dispatch one subcommand
async fn run_command(store: BenchmarkStore, command: Command) -> Result<()> {
    match command {
        Command::Ingest { id, files } => {
            let runs = ingest_files(files).await?;
            validate_per_run_lines(&runs)?;
            let meta = blocking(move || {
                store.store(id, &runs)?;
                Ok(extract_search_metadata(&runs))
            })
            .await?;
            print_json(&meta)
        }

        Command::Add { id, files } => {
            let runs = ingest_files(files).await?;
            let meta = blocking(move || Ok(add_runs(&store, id, &runs)?)).await?;
            print_json(&meta)
        }

        Command::RemoveRun { id, index } => {
            let meta = blocking(move || Ok(delete_run(&store, id, index)?)).await?;
            print_json(&meta)
        }

        Command::RenameRun { id, labels } => {
            let labels: BTreeMap<usize, String> = labels.into_iter().collect();
            let meta = blocking(move || Ok(rename_runs(&store, id, &labels)?)).await?;
            print_json(&meta)
        }

        Command::Json { id, output } => {
            blocking(move || {
                match output {
                    Some(path) => {
                        let file = create_output(&path)?;
                        stream_json(&store, id, PlainSink(file))?;
                        info!("Wrote benchmark {} to {:?}", id, path);
                    }
                    None => stream_json(&store, id, PlainSink(io::stdout().lock()))?,
                }
                Ok(())
            })
            .await
        }

        Command::Run {
            id,
            index,
            start,
            end,
        } => {
            let summary = blocking(move || {
                let run = store.load_run(id, index)?;
                Ok(PreCalculatedRun::from_view(&run.trimmed_view(start, end)))
            })
            .await?;
            print_json(&summary)
        }

        Command::Export { id, output } => {
            blocking(move || {
                let file = File::create(&output)
                    .with_context(|| format!("Failed to create {:?}", output))?;
                let mut file = export_zip(&store, id, file)?;
                file.flush()?;
                info!("Exported benchmark {} to {:?}", id, output);
                Ok(())
            })
            .await
        }

        Command::Stats { id, method } => {
            let runs = blocking(move || Ok(store.precomputed(id)?)).await?;
            match method {
                Some(method) => {
                    let per_run: Vec<_> = runs.iter().map(|r| r.stats_for(method)).collect();
                    print_json(&per_run)
                }
                None => print_json(&runs),
            }
        }

        Command::Meta { id } => {
            let meta = blocking(move || Ok(store.metadata(id)?)).await?;
            print_json(&meta)
        }

        Command::Delete { id } => {
            blocking(move || Ok(store.delete(id)?)).await
        }

        Command::Migrate { stats } => {
            let (storage, cache) = blocking(move || {
                let storage = migrate_storage(&store)?;
                let cache = if stats {
                    Some(migrate_precomputed_stats(&store)?)
                } else {
                    None
                };
                Ok((storage, cache))
            })
            .await?;

            if let Some(cache) = cache {
                if !cache.is_success() {
                    bail!("{} statistics caches could not be built", cache.failed);
                }
            }
            if !storage.is_success() {
                bail!("{} benchmarks could not be migrated", storage.failed);
            }
            Ok(())
        }
    }
}

/// Parse every capture file on the blocking pool, keeping argument order
async fn ingest_files(files: Vec<PathBuf>) -> Result<Vec<Run>> {
    let handles: Vec<_> = files
        .into_iter()
        .map(|path| {
            tokio::task::spawn_blocking(move || {
                ingest_path(&path).with_context(|| format!("Failed to ingest {:?}", path))
            })
        })
        .collect();

    let mut runs = Vec::with_capacity(handles.len());
    for handle in handles {
        let run = handle.await.context("Ingest task panicked")??;
        info!("Parsed run '{}' ({} lines)", run.label, run.run_count());
        runs.push(run);
    }
    Ok(runs)
}

/// Run a blocking engine call off the async worker threads
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .context("Engine task panicked")?
}

fn create_output(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    Ok(BufWriter::new(file))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value).context("Failed to write output")?;
    writeln!(stdout)?;
    Ok(())
}
