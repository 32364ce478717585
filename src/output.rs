//! Output formatting and persistence for import and alert reports.
//!
//! Supports JSON serialization and CSV append.

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info};

use crate::importer::TripSummary;
use csv::WriterBuilder;
use std::fs::OpenOptions;
use std::path::Path;

/// Logs a serializable report as pretty-printed JSON.
pub fn print_json(value: &impl Serialize) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Appends one row per created trip to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_trip_rows(path: &str, trips: &[TripSummary]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = trips.len(), "Appending trip rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for trip in trips {
        writer.serialize(trip)?;
    }
    writer.flush()?;

    Ok(())
}
