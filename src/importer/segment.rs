//! Splits telemetry into trips on inactivity gaps.

use crate::model::{TelemetryPoint, Trip};
use chrono::{DateTime, Utc};
use tracing::debug;

pub const DEFAULT_GAP_MINUTES: u32 = 30;

/// True when more than `gap_minutes` separate `prev` and `next`.
pub fn gap_exceeds(prev: DateTime<Utc>, next: DateTime<Utc>, gap_minutes: u32) -> bool {
    let gap = (next - prev).num_milliseconds() as f64 / 60_000.0;
    gap > f64::from(gap_minutes)
}

/// Sorts `points` by timestamp (stable) and starts a new trip whenever the
/// gap to the previous point is strictly greater than `gap_minutes`.
pub fn segment_trips(mut points: Vec<TelemetryPoint>, gap_minutes: u32) -> Vec<Trip> {
    if points.is_empty() {
        return Vec::new();
    }

    points.sort_by_key(|p| p.timestamp);
    let total = points.len();

    let mut trips = Vec::new();
    let mut current: Vec<TelemetryPoint> = Vec::new();

    for point in points {
        if let Some(last) = current.last() {
            if gap_exceeds(last.timestamp, point.timestamp, gap_minutes) {
                trips.push(Trip {
                    points: std::mem::take(&mut current),
                });
            }
        }
        current.push(point);
    }
    trips.push(Trip { points: current });

    debug!(points = total, trips = trips.len(), gap_minutes, "Points segmented into trips");
    trips
}

/// Treats the whole set as one trip, still in timestamp order.
pub fn single_trip(mut points: Vec<TelemetryPoint>) -> Option<Trip> {
    if points.is_empty() {
        return None;
    }
    points.sort_by_key(|p| p.timestamp);
    Some(Trip { points })
}
