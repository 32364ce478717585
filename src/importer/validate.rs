//! Turns raw CSV rows into range-checked telemetry points.

use crate::importer::error::ValidationError;
use crate::importer::source::RawRow;
use crate::model::{ColumnMapping, Field, TelemetryPoint};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// Formats tried, in order, after the source's declared format.
pub const TIMESTAMP_FALLBACK_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%H:%M:%S%.f",
    "%H:%M:%S",
];

const DATE_SPECIFIERS: &[&str] = &["%Y", "%y", "%m", "%d", "%e", "%b", "%B", "%j", "%F", "%D"];

/// Parses a timestamp with `declared` first, then the fallback list.
///
/// Time-only formats land on 1900-01-01. Values are taken as UTC.
pub fn parse_timestamp(value: &str, declared: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    declared
        .into_iter()
        .chain(TIMESTAMP_FALLBACK_FORMATS.iter().copied())
        .find_map(|fmt| parse_with(value, fmt))
        .map(|naive| naive.and_utc())
}

fn parse_with(value: &str, fmt: &str) -> Option<NaiveDateTime> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(value, fmt) {
        return Some(parsed);
    }
    if DATE_SPECIFIERS.iter().any(|s| fmt.contains(s)) {
        return None;
    }
    let time = NaiveTime::parse_from_str(value, fmt).ok()?;
    Some(NaiveDate::from_ymd_opt(1900, 1, 1)?.and_time(time))
}

/// Parses a decimal that may use `,` as separator. Blank, unparsable and
/// non-finite values are `None`.
pub fn parse_decimal(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    value
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Builds a point from one row.
///
/// A missing or unparsable timestamp rejects the row. Numeric fields that
/// are blank or unparsable are left empty, but a value outside its physical
/// range rejects the whole row. Fields are checked in [`Field::ALL`] order,
/// so the error names the first offending field.
pub fn validate_row(
    row: &RawRow,
    mapping: &ColumnMapping,
    timestamp_format: Option<&str>,
) -> Result<TelemetryPoint, ValidationError> {
    let raw_timestamp = mapping
        .timestamp
        .as_deref()
        .and_then(|column| row.get(column))
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingTimestamp)?;

    let timestamp = parse_timestamp(raw_timestamp, timestamp_format).ok_or_else(|| {
        ValidationError::InvalidTimestamp {
            value: raw_timestamp.to_string(),
        }
    })?;

    let mut point = TelemetryPoint::at(timestamp);
    for field in Field::ALL {
        let Some(raw) = mapping.column(field).and_then(|column| row.get(column)) else {
            continue;
        };
        let value = parse_decimal(raw);
        if let Some(v) = value {
            if !field.in_range(v) {
                return Err(ValidationError::OutOfRange { field, value: v });
            }
        }
        point.set(field, value);
    }

    Ok(point)
}

/// Range-checks every present field of an already built point.
pub fn check_ranges(point: &TelemetryPoint) -> Result<(), ValidationError> {
    for field in Field::ALL {
        if let Some(value) = point.get(field) {
            if !field.in_range(value) {
                return Err(ValidationError::OutOfRange { field, value });
            }
        }
    }
    Ok(())
}
