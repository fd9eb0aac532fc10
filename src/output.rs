//! Output formatting and persistence for traffic projections.
//!
//! Supports pretty-printing, JSON snapshots for the map renderer, and CSV
//! append for sweep rows.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::projector::{RadiusScale, StationTraffic};
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// The payload the map renderer consumes: annotated stations plus the
/// radius scale selected for the active filter state.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub time_filter: i32,
    pub scale: RadiusScale,
    pub stations: Vec<StationTraffic>,
}

/// One row of a minute-by-minute sweep over the whole day.
#[derive(Debug, Serialize)]
pub struct SweepRecord {
    pub minute: u16,
    pub window_departures: usize,
    pub window_arrivals: usize,
    pub busiest_station: Option<String>,
    pub busiest_total: usize,
}

/// Logs a snapshot using Rust's debug pretty-print format.
pub fn print_pretty(snapshot: &Snapshot) {
    debug!("{:#?}", snapshot);
}

/// Writes a snapshot as pretty-printed JSON to a file, or logs it to
/// stdout when no path is given.
pub fn write_snapshot(path: Option<&str>, snapshot: &Snapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    match path {
        Some(path) => {
            std::fs::write(path, json)?;
            info!(path, stations = snapshot.stations.len(), "Snapshot written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

/// Appends a [`SweepRecord`] as a row to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_record(path: &str, record: &SweepRecord) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, "Appending CSV record");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    writer.serialize(record)?;
    writer.flush()?;

    Ok(())
}
