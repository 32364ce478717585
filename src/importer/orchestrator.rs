//! Runs a whole import: decode, validate, segment, persist, record.

use crate::importer::error::ImportError;
use crate::importer::profiles::SourceProfile;
use crate::importer::segment::{DEFAULT_GAP_MINUTES, segment_trips, single_trip};
use crate::importer::source::{SourceFile, read_rows};
use crate::importer::validate::validate_row;
use crate::model::{
    ColumnMapping, ImportId, ImportRecord, TelemetryPoint, Trip, TripId, TripStats, VehicleId,
};
use crate::repository::Repository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Split on inactivity gaps. When false every valid row lands in one trip.
    pub create_trips: bool,
    pub gap_minutes: u32,
    /// When false the first invalid row aborts the import before any write.
    pub skip_invalid_rows: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            create_trips: true,
            gap_minutes: DEFAULT_GAP_MINUTES,
            skip_invalid_rows: true,
        }
    }
}

/// Everything needed to import one file for one vehicle.
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub path: PathBuf,
    pub vehicle_id: VehicleId,
    pub profile: &'static SourceProfile,
    /// Effective mapping, the profile default plus any overrides.
    pub mapping: ColumnMapping,
    pub options: ImportOptions,
}

impl ImportRequest {
    pub fn new(
        path: impl Into<PathBuf>,
        vehicle_id: VehicleId,
        profile: &'static SourceProfile,
    ) -> Self {
        Self {
            path: path.into(),
            vehicle_id,
            profile,
            mapping: profile.mapping(),
            options: ImportOptions::default(),
        }
    }

    /// Layers a `field=column` override over the current mapping.
    pub fn with_override(mut self, spec: &str) -> Result<Self, String> {
        self.mapping.apply_override(spec)?;
        Ok(self)
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }
}

/// One created trip, flattened for CSV reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripSummary {
    pub trip_id: TripId,
    pub vehicle_id: VehicleId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub points: usize,
    pub distance_km: f64,
    pub duration_seconds: i64,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub avg_rpm: f64,
    pub max_rpm: f64,
    pub avg_load: f64,
}

impl TripSummary {
    pub fn new(trip_id: TripId, vehicle_id: VehicleId, trip: &Trip, stats: &TripStats) -> Self {
        let start = trip.start().unwrap_or_default();
        Self {
            trip_id,
            vehicle_id,
            start,
            end: trip.end().unwrap_or(start),
            points: trip.len(),
            distance_km: stats.distance_km,
            duration_seconds: stats.duration_seconds,
            avg_speed: stats.avg_speed,
            max_speed: stats.max_speed,
            avg_rpm: stats.avg_rpm,
            max_rpm: stats.max_rpm,
            avg_load: stats.avg_load,
        }
    }
}

/// Outcome of an import, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportReport {
    pub success: bool,
    pub vehicle_id: VehicleId,
    pub trips_created: usize,
    pub rows_imported: usize,
    pub rows_skipped: usize,
    /// `Row {n}: {reason}` per skipped row, `n` being the file line number.
    pub errors: Vec<String>,
    pub import_id: Option<ImportId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trips: Vec<TripSummary>,
}

impl ImportReport {
    /// Report for an import that failed as a whole.
    pub fn from_error(vehicle_id: VehicleId, err: &ImportError) -> Self {
        Self {
            success: false,
            vehicle_id,
            trips_created: 0,
            rows_imported: 0,
            rows_skipped: 0,
            errors: Vec::new(),
            import_id: None,
            error: Some(err.to_string()),
            trips: Vec::new(),
        }
    }
}

/// Imports one CSV file through `repo`.
///
/// Every row is validated before anything is written, so a strict-mode
/// failure leaves the repository untouched. Repository failures after that
/// point propagate as [`ImportError::Repository`]; trips already written
/// stay written.
#[tracing::instrument(
    skip(repo, req),
    fields(path = %req.path.display(), vehicle_id = req.vehicle_id, source = req.profile.id)
)]
pub async fn import_csv<R: Repository + ?Sized>(
    repo: &R,
    req: &ImportRequest,
) -> Result<ImportReport, ImportError> {
    let file = SourceFile::open(&req.path)?;
    let (text, encoding) = file.decode(Some(req.profile.encoding))?;
    let (_, rows) = read_rows(&text)?;
    debug!(rows = rows.len(), encoding = encoding.as_str(), "Source file read");

    let mut points: Vec<TelemetryPoint> = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        let line = idx + 2;
        match validate_row(row, &req.mapping, req.profile.timestamp_format) {
            Ok(point) => points.push(point),
            Err(source) if !req.options.skip_invalid_rows => {
                warn!(row = line, error = %source, "Invalid row, aborting import");
                return Err(ImportError::InvalidRow { row: line, source });
            }
            Err(e) => {
                debug!(row = line, field = e.field(), error = %e, "Row skipped");
                errors.push(format!("Row {line}: {e}"));
            }
        }
    }

    let rows_imported = points.len();
    let rows_skipped = errors.len();
    if rows_skipped > 0 {
        warn!(rows_skipped, rows_imported, "Invalid rows skipped");
    }

    let trips = if req.options.create_trips {
        segment_trips(points, req.options.gap_minutes)
    } else {
        single_trip(points).into_iter().collect()
    };

    let mut summaries = Vec::with_capacity(trips.len());
    for trip in &trips {
        let (trip_id, stats) = persist_trip(repo, req.vehicle_id, trip)
            .await
            .map_err(ImportError::Repository)?;
        summaries.push(TripSummary::new(trip_id, req.vehicle_id, trip, &stats));
    }

    let record = ImportRecord {
        vehicle_id: req.vehicle_id,
        source_type: req.profile.id.to_string(),
        file_name: file.file_name(),
        content_hash: file.content_hash.clone(),
        rows_total: rows.len(),
        rows_imported,
        rows_skipped,
        trips_created: summaries.len(),
        imported_at: Utc::now(),
        can_rollback: true,
    };
    let import_id = repo
        .record_import(&record)
        .await
        .map_err(ImportError::Repository)?;

    info!(
        import_id,
        trips_created = summaries.len(),
        rows_imported,
        rows_skipped,
        "Import complete"
    );

    Ok(ImportReport {
        success: true,
        vehicle_id: req.vehicle_id,
        trips_created: summaries.len(),
        rows_imported,
        rows_skipped,
        errors,
        import_id: Some(import_id),
        error: None,
        trips: summaries,
    })
}

/// Writes one trip: open it, store its points as a batch, close it with
/// its computed stats.
pub async fn persist_trip<R: Repository + ?Sized>(
    repo: &R,
    vehicle_id: VehicleId,
    trip: &Trip,
) -> anyhow::Result<(TripId, TripStats)> {
    let trip_id = repo.create_trip(vehicle_id).await?;
    repo.save_telemetry_batch(trip_id, &trip.points).await?;
    let stats = TripStats::from_points(&trip.points);
    repo.close_trip(trip_id, &stats).await?;
    debug!(trip_id, points = trip.len(), distance_km = stats.distance_km, "Trip persisted");
    Ok((trip_id, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::importer::profiles::NATIVE;
    use crate::repository::MemoryRepository;
    use std::env;
    use std::fs;

    const HEADER: &str = "timestamp,rpm,speed,coolant_temp,intake_temp,maf,engine_load,throttle_pos,fuel_pressure,latitude,longitude";

    #[tokio::test]
    async fn test_import_splits_on_gap() {
        let path = write_csv(
            "orchestrator_gap.csv",
            &[
                "2024-03-01 09:00:00,800,0,80,20,3,20,10,300,48.85,2.35",
                "2024-03-01 09:05:00,2500,50,85,22,10,40,25,310,48.86,2.36",
                "2024-03-01 10:00:00,900,0,88,23,4,22,11,305,48.90,2.40",
            ],
        );
        let repo = MemoryRepository::new();
        let report = import_csv(&repo, &ImportRequest::new(&path, 1, &NATIVE))
            .await
            .unwrap();

        assert!(report.success);
        assert_eq!(report.trips_created, 2);
        assert_eq!(report.rows_imported, 3);
        assert_eq!(report.rows_skipped, 0);
        assert_eq!(report.trips[0].points, 2);
        assert_eq!(report.trips[0].duration_seconds, 300);
        assert!(report.trips[0].distance_km > 0.0);
        assert_eq!(repo.imports().len(), 1);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_invalid_rows_are_skipped_and_reported() {
        let path = write_csv(
            "orchestrator_skip.csv",
            &[
                "2024-03-01 09:00:00,800,0,80,20,3,20,10,300,,",
                "2024-03-01 09:01:00,9000,0,80,20,3,20,10,300,,",
                "not a date,800,0,80,20,3,20,10,300,,",
            ],
        );
        let repo = MemoryRepository::new();
        let report = import_csv(&repo, &ImportRequest::new(&path, 1, &NATIVE))
            .await
            .unwrap();

        assert_eq!(report.rows_imported, 1);
        assert_eq!(report.rows_skipped, 2);
        assert_eq!(report.errors[0], "Row 3: rpm out of range: 9000");
        assert!(report.errors[1].starts_with("Row 4: invalid timestamp"));

        let (_, record) = &repo.imports()[0];
        assert_eq!(record.rows_total, 3);
        assert!(record.can_rollback);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_strict_mode_writes_nothing() {
        let path = write_csv(
            "orchestrator_strict.csv",
            &[
                "2024-03-01 09:00:00,800,0,80,20,3,20,10,300,,",
                "2024-03-01 09:01:00,9000,0,80,20,3,20,10,300,,",
            ],
        );
        let repo = MemoryRepository::new();
        let req = ImportRequest::new(&path, 1, &NATIVE).with_options(ImportOptions {
            skip_invalid_rows: false,
            ..ImportOptions::default()
        });

        let err = import_csv(&repo, &req).await.unwrap_err();
        assert!(matches!(err, ImportError::InvalidRow { row: 3, .. }));
        assert!(repo.trips().is_empty());
        assert!(repo.imports().is_empty());

        let report = ImportReport::from_error(1, &err);
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("row 3: rpm out of range: 9000"));

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_without_trip_creation_everything_is_one_trip() {
        let path = write_csv(
            "orchestrator_single.csv",
            &[
                "2024-03-01 11:00:00,800,0,80,20,3,20,10,300,,",
                "2024-03-01 09:00:00,800,0,80,20,3,20,10,300,,",
            ],
        );
        let repo = MemoryRepository::new();
        let req = ImportRequest::new(&path, 1, &NATIVE).with_options(ImportOptions {
            create_trips: false,
            ..ImportOptions::default()
        });
        let report = import_csv(&repo, &req).await.unwrap();

        assert_eq!(report.trips_created, 1);
        assert_eq!(report.trips[0].duration_seconds, 7200);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_mapping_override() {
        let path = temp_path("orchestrator_override.csv");
        fs::write(&path, "when,engine\n2024-03-01 09:00:00,1500\n").unwrap();

        let repo = MemoryRepository::new();
        let req = ImportRequest::new(&path, 1, &crate::importer::profiles::GENERIC)
            .with_override("timestamp=when")
            .unwrap()
            .with_override("rpm=engine")
            .unwrap();
        let report = import_csv(&repo, &req).await.unwrap();

        assert_eq!(report.rows_imported, 1);
        assert_eq!(report.trips[0].max_rpm, 1500.0);

        fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let repo = MemoryRepository::new();
        let req = ImportRequest::new(temp_path("does_not_exist.csv"), 1, &NATIVE);
        assert!(matches!(
            import_csv(&repo, &req).await,
            Err(ImportError::Io(_))
        ));
    }

    fn temp_path(name: &str) -> PathBuf {
        env::temp_dir().join(format!("telemetry_sentinel_{name}"))
    }

    fn write_csv(name: &str, rows: &[&str]) -> PathBuf {
        let path = temp_path(name);
        let mut body = String::from(HEADER);
        for row in rows {
            body.push('\n');
            body.push_str(row);
        }
        body.push('\n');
        fs::write(&path, body).unwrap();
        path
    }
}
