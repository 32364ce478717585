//! In-memory trip buffer for points arriving from the live capture path.

use crate::importer::error::ValidationError;
use crate::importer::segment::{DEFAULT_GAP_MINUTES, gap_exceeds};
use crate::importer::validate::check_ranges;
use crate::model::{TelemetryPoint, Trip};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Accumulates live points and closes a trip whenever an inactivity gap
/// larger than the threshold shows up.
#[derive(Debug)]
pub struct LiveTripBuffer {
    gap_minutes: u32,
    points: Vec<TelemetryPoint>,
}

impl Default for LiveTripBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_GAP_MINUTES)
    }
}

impl LiveTripBuffer {
    pub fn new(gap_minutes: u32) -> Self {
        Self {
            gap_minutes,
            points: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }

    /// Buffers `point`, returning the previous trip if the point opened a
    /// new one. Out-of-range points are rejected and not buffered.
    ///
    /// A late point is inserted in timestamp order. One that precedes the
    /// buffered trip by more than the gap opens a trip of its own, so no
    /// trip ever spans a gap.
    pub fn push(&mut self, point: TelemetryPoint) -> Result<Option<Trip>, ValidationError> {
        check_ranges(&point)?;

        let first = self.points.first().map(|p| p.timestamp);
        let closed = match (first, self.last_timestamp()) {
            (Some(first), _) if gap_exceeds(point.timestamp, first, self.gap_minutes) => {
                debug!(late = %point.timestamp, trip_start = %first, "Late point starts a new trip");
                self.flush()
            }
            (_, Some(last)) if gap_exceeds(last, point.timestamp, self.gap_minutes) => self.flush(),
            _ => None,
        };

        let idx = self
            .points
            .partition_point(|p| p.timestamp <= point.timestamp);
        self.points.insert(idx, point);

        Ok(closed)
    }

    /// Closes the buffered trip if nothing arrived for longer than the gap.
    pub fn close_if_idle(&mut self, now: DateTime<Utc>) -> Option<Trip> {
        match self.last_timestamp() {
            Some(last) if gap_exceeds(last, now, self.gap_minutes) => self.flush(),
            _ => None,
        }
    }

    /// Closes whatever is buffered.
    pub fn flush(&mut self) -> Option<Trip> {
        if self.points.is_empty() {
            return None;
        }
        let points = std::mem::take(&mut self.points);
        debug!(points = points.len(), "Live trip closed");
        Some(Trip { points })
    }
}
