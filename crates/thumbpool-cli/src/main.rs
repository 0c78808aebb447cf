#![doc = include_str!("../README.md")]

mod config;
mod report;
mod telemetry;

use anyhow::{Context, bail};
use clap::Parser;
use config::{BrowseConfig, CliArgs, OutputFormat};
use report::{RowReport, write_json, write_text};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;
use telemetry::init_telemetry;
use thumbpool::crossbeam_channel::RecvTimeoutError;
use thumbpool::{Dispatcher, InfoRequest};
use walkdir::WalkDir;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = BrowseConfig::try_from(args)?;

    init_telemetry()?;

    let paths = list_files(&config)?;
    log_startup_info(&config, paths.len());

    let reports = browse(&config, &paths)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match config.format {
        OutputFormat::Text => write_text(&mut out, &reports)?,
        OutputFormat::Json => write_json(&mut out, &reports)?,
    }
    out.flush()?;

    Ok(())
}

/// Files under `config.root`, sorted by name. Each file's index is its row.
fn list_files(config: &BrowseConfig) -> anyhow::Result<Vec<PathBuf>> {
    let max_depth = if config.recursive { usize::MAX } else { 1 };
    let mut paths = Vec::new();

    for entry in WalkDir::new(&config.root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to walk {}", config.root.display()))?;
        if entry.file_type().is_file() {
            paths.push(entry.into_path());
        }
    }

    Ok(paths)
}

/// Issues one request per file and collects results until every row is
/// answered or the timeout elapses. Rows still unanswered are reported as
/// pending.
fn browse(config: &BrowseConfig, paths: &[PathBuf]) -> anyhow::Result<Vec<RowReport>> {
    let mut dispatcher = Dispatcher::with_defaults(config.pool.clone())?;
    dispatcher.set_generation_id(config.generation_id);

    let deadline = Instant::now() + config.timeout;

    for (row, path) in paths.iter().enumerate() {
        dispatcher.request(
            InfoRequest::new(path, row, config.generation_id)
                .with_thumbnail(config.thumbnail_mode, config.thumbnail_size),
        )?;
    }

    let mut slots: Vec<Option<RowReport>> = vec![None; paths.len()];
    let mut answered = 0;

    while answered < paths.len() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match dispatcher.results().recv_timeout(remaining) {
            Ok(result) => {
                if result.generation_id != config.generation_id {
                    continue;
                }
                let Some(slot) = slots.get_mut(result.row) else {
                    continue;
                };
                if slot.is_none() {
                    answered += 1;
                }
                *slot = Some(RowReport::from_result(&paths[result.row], &result));
            }
            Err(RecvTimeoutError::Timeout) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Timed out with {} of {} rows answered",
                    answered,
                    paths.len()
                );
                break;
            }
            Err(RecvTimeoutError::Disconnected) => {
                bail!("Worker pool stopped before all results arrived");
            }
        }
    }

    dispatcher.shutdown()?;

    #[cfg(feature = "tracing")]
    tracing::info!("Pool stats: {:?}", dispatcher.stats());

    Ok(slots
        .into_iter()
        .zip(paths)
        .enumerate()
        .map(|(row, (slot, path))| slot.unwrap_or_else(|| RowReport::pending(row, path)))
        .collect())
}

fn log_startup_info(_config: &BrowseConfig, _files: usize) {
    if cfg!(debug_assertions) {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Browsing {} ({} files) with full config: {:#?}",
            _config.root.display(),
            _files,
            _config
        );
    } else {
        #[cfg(feature = "tracing")]
        tracing::info!(
            "Browsing {} ({} files) with {} workers",
            _config.root.display(),
            _files,
            _config.pool.num_workers
        );
    }
}
