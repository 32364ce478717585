//! Feeds a recorded CSV through the live path: the alert engine and the
//! live trip buffer, one point at a time in timestamp order.

use crate::alerts::{AlertRuleEngine, AlertSummary, RaisedAlert};
use crate::importer::source::{SourceFile, read_rows};
use crate::importer::validate::validate_row;
use crate::importer::{ImportError, LiveTripBuffer, SourceProfile, TripSummary, persist_trip};
use crate::model::{Alert, TelemetryPoint, Trip, VehicleId};
use crate::repository::Repository;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

const SUMMARY_DAYS: u32 = 7;

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub vehicle_id: VehicleId,
    pub points: usize,
    pub rows_skipped: usize,
    pub alerts: Vec<RaisedAlert>,
    pub trips: Vec<TripSummary>,
    pub summary: AlertSummary,
}

/// Replays `path` for `vehicle_id`. Each point is evaluated as of its own
/// timestamp, so duplicate suppression follows recorded time rather than
/// wall-clock time. Trips closed by the buffer are persisted through `repo`.
/// The alert summary covers the week before the last recorded point.
#[tracing::instrument(
    skip(engine, repo, path, profile),
    fields(path = %path.as_ref().display(), source = profile.id)
)]
pub async fn replay_csv<R: Repository + ?Sized>(
    engine: &AlertRuleEngine<R>,
    repo: &R,
    path: impl AsRef<Path>,
    vehicle_id: VehicleId,
    profile: &'static SourceProfile,
    gap_minutes: u32,
) -> Result<ReplayReport, ImportError> {
    let file = SourceFile::open(path.as_ref())?;
    let (text, _) = file.decode(Some(profile.encoding))?;
    let (_, rows) = read_rows(&text)?;

    let mapping = profile.mapping();
    let mut points: Vec<TelemetryPoint> = Vec::with_capacity(rows.len());
    let mut rows_skipped = 0;
    for (idx, row) in rows.iter().enumerate() {
        match validate_row(row, &mapping, profile.timestamp_format) {
            Ok(point) => points.push(point),
            Err(e) => {
                debug!(row = idx + 2, error = %e, "Replay row skipped");
                rows_skipped += 1;
            }
        }
    }
    points.sort_by_key(|p| p.timestamp);

    let mut buffer = LiveTripBuffer::new(gap_minutes);
    let mut alerts = Vec::new();
    let mut trips = Vec::new();

    for point in &points {
        engine.cache().evict_expired(point.timestamp);
        let raised = engine
            .evaluate_at(vehicle_id, point, None, point.timestamp)
            .await
            .map_err(ImportError::Repository)?;
        alerts.extend(raised);

        if let Some(trip) = buffer.push(point.clone())? {
            trips.push(close(repo, vehicle_id, &trip).await?);
        }
    }
    if let Some(trip) = buffer.flush() {
        trips.push(close(repo, vehicle_id, &trip).await?);
    }

    info!(
        vehicle_id,
        points = points.len(),
        alerts = alerts.len(),
        trips = trips.len(),
        "Replay complete"
    );

    let now = points.last().map_or_else(Utc::now, |p| p.timestamp);
    let summary = summary_of(&alerts, now);
    Ok(ReplayReport {
        vehicle_id,
        points: points.len(),
        rows_skipped,
        alerts,
        trips,
        summary,
    })
}

async fn close<R: Repository + ?Sized>(
    repo: &R,
    vehicle_id: VehicleId,
    trip: &Trip,
) -> Result<TripSummary, ImportError> {
    let (trip_id, stats) = persist_trip(repo, vehicle_id, trip)
        .await
        .map_err(ImportError::Repository)?;
    Ok(TripSummary::new(trip_id, vehicle_id, trip, &stats))
}

fn summary_of(raised: &[RaisedAlert], now: DateTime<Utc>) -> AlertSummary {
    let alerts: Vec<Alert> = raised.iter().map(Alert::from).collect();
    AlertSummary::from_alerts(&alerts, now, SUMMARY_DAYS)
}
