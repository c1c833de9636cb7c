//! Inspect command implementation.

use super::open_pool;
use quasar_blockstore::layout::file_name;
use quasar_blockstore::{Config, DATA_START};
use serde::Serialize;
use std::path::Path;

/// Per-file report.
#[derive(Debug, Serialize)]
pub struct FileReport {
    /// Backing file index.
    pub index: usize,
    /// Backing file name.
    pub name: String,
    /// End offset of the file.
    pub frontier: u64,
    /// Bytes used by records.
    pub data_bytes: u64,
}

/// Whole-database report.
#[derive(Debug, Serialize)]
pub struct InspectReport {
    /// Storage directory.
    pub path: String,
    /// Configuration the pool was opened with.
    pub config: Config,
    /// Sum of record bytes across files.
    pub total_data_bytes: u64,
    /// Per-file details.
    pub files: Vec<FileReport>,
}

/// Builds the report from a list of frontiers.
pub fn build_report(path: &Path, config: &Config, frontiers: &[u64]) -> InspectReport {
    let files: Vec<FileReport> = frontiers
        .iter()
        .enumerate()
        .map(|(index, &frontier)| FileReport {
            index,
            name: file_name(index),
            frontier,
            data_bytes: frontier.saturating_sub(DATA_START),
        })
        .collect();

    InspectReport {
        path: path.display().to_string(),
        config: config.clone(),
        total_data_bytes: files.iter().map(|f| f.data_bytes).sum(),
        files,
    }
}

/// Runs the inspect command.
pub fn run(path: &Path, config: Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let pool = open_pool(path, config);
    let report = build_report(path, pool.config(), &pool.frontiers());

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        "text" => {
            println!("Blockstore at {}", report.path);
            println!(
                "Queue depth {}, first read {} bytes",
                report.config.write_queue_depth, report.config.first_read_size
            );
            println!();
            println!("{:<20} {:>16} {:>16}", "FILE", "FRONTIER", "DATA BYTES");
            for file in &report.files {
                println!(
                    "{:<20} {:>16} {:>16}",
                    file.name, file.frontier, file.data_bytes
                );
            }
            println!();
            println!("Total data bytes: {}", report.total_data_bytes);
        }
        other => return Err(format!("Unknown format: {other}").into()),
    }

    Ok(())
}
