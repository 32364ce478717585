//! Pre-import preview of a CSV file.

use crate::importer::detect::detect_source;
use crate::importer::error::ImportError;
use crate::importer::profiles::{SourceProfile, TextEncoding, profile_or_generic};
use crate::importer::source::{RawRow, SourceFile, read_rows};
use crate::importer::validate::parse_timestamp;
use crate::model::{ColumnMapping, Field};
use chrono::NaiveDate;
use serde::Serialize;
use std::path::Path;
use tracing::info;

pub const PREVIEW_ROWS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// What an import of the file would see, without writing anything.
#[derive(Debug, Clone, Serialize)]
pub struct CsvAnalysis {
    pub source_detected: &'static str,
    pub source_name: &'static str,
    pub total_rows: usize,
    pub columns_found: Vec<String>,
    pub mappings: ColumnMapping,
    pub date_range: Option<DateRange>,
    pub preview: Vec<RawRow>,
    pub warnings: Vec<String>,
    pub file_hash: String,
    pub encoding: TextEncoding,
}

/// Reads `path` and reports its detected dialect, size, mapping and a short
/// preview. `source` forces a profile by id; unknown ids mean generic.
pub fn analyze_csv(
    path: impl AsRef<Path>,
    source: Option<&str>,
) -> Result<CsvAnalysis, ImportError> {
    let file = SourceFile::open(path)?;
    let forced = source.map(profile_or_generic);
    let (text, encoding) = file.decode(forced.map(|p| p.encoding))?;
    let (headers, rows) = read_rows(&text)?;

    let profile: &'static SourceProfile = match forced {
        Some(p) => p,
        None => detect_source(&headers),
    };
    let mappings = profile.mapping();

    let date_range = mappings.timestamp.as_deref().and_then(|column| {
        let dates = rows
            .iter()
            .filter_map(|row| row.get(column))
            .filter_map(|v| parse_timestamp(v, profile.timestamp_format))
            .map(|ts| ts.date_naive());
        dates.fold(None, |range: Option<DateRange>, d| {
            Some(match range {
                None => DateRange { start: d, end: d },
                Some(r) => DateRange {
                    start: r.start.min(d),
                    end: r.end.max(d),
                },
            })
        })
    });

    let warnings = missing_critical_columns(&mappings, &headers);

    info!(
        path = %file.path.display(),
        source = profile.id,
        rows = rows.len(),
        warnings = warnings.len(),
        "CSV analysed"
    );

    Ok(CsvAnalysis {
        source_detected: profile.id,
        source_name: profile.name,
        total_rows: rows.len(),
        columns_found: headers,
        mappings,
        date_range,
        preview: rows.into_iter().take(PREVIEW_ROWS).collect(),
        warnings,
        file_hash: file.content_hash,
        encoding,
    })
}

fn missing_critical_columns(mapping: &ColumnMapping, headers: &[String]) -> Vec<String> {
    let mut critical = vec![("timestamp", mapping.timestamp.as_deref())];
    critical.extend([Field::Rpm, Field::Speed].map(|f| (f.name(), mapping.column(f))));

    critical
        .into_iter()
        .filter_map(|(name, column)| match column {
            None => Some(format!("No column mapped for {name}")),
            Some(c) if !headers.iter().any(|h| h == c) => {
                Some(format!("Column '{c}' for {name} not found"))
            }
            Some(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("telemetry_sentinel_{name}"))
    }

    #[test]
    fn test_analyze_torque_file() {
        let path = temp_path("analyze_torque.csv");
        let mut body = String::from(
            "Device Time,Longitude,Latitude,GPS Speed (Meters/second),Engine RPM(rpm),Speed (OBD)(km/h)\n",
        );
        for i in 0..12 {
            body.push_str(&format!(
                "2024-03-0{} 09:00:{:02}.000,2.35,48.85,10,2000,40\n",
                1 + i % 2,
                i
            ));
        }
        fs::write(&path, body).unwrap();

        let analysis = analyze_csv(&path, None).unwrap();
        assert_eq!(analysis.source_detected, "torque");
        assert_eq!(analysis.total_rows, 12);
        assert_eq!(analysis.preview.len(), PREVIEW_ROWS);
        assert_eq!(analysis.encoding, TextEncoding::Utf8);
        assert_eq!(analysis.file_hash.len(), 64);

        let range = analysis.date_range.unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(range.end, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_generic_file_warns_about_unmapped_columns() {
        let path = temp_path("analyze_generic.csv");
        fs::write(&path, "a,b\n1,2\n").unwrap();

        let analysis = analyze_csv(&path, None).unwrap();
        assert_eq!(analysis.source_detected, "generic");
        assert_eq!(analysis.warnings.len(), 3);
        assert!(analysis.date_range.is_none());

        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_forced_source_reports_missing_columns() {
        let path = temp_path("analyze_forced.csv");
        fs::write(&path, "timestamp,rpm\n2024-03-01 09:00:00,800\n").unwrap();

        let analysis = analyze_csv(&path, Some("native")).unwrap();
        assert_eq!(analysis.source_detected, "native");
        assert_eq!(analysis.warnings, vec!["Column 'speed' for speed not found"]);

        fs::remove_file(&path).unwrap();
    }
}
