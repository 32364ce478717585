//! Persistence seam for trips, telemetry, rules, alerts and import records.
//!
//! [`Repository`] is the async trait the importer and the alert engine write
//! through. [`MemoryRepository`] keeps everything in process memory.

mod memory;

pub use memory::{MemoryRepository, StoredTrip};

use crate::model::{
    AlertId, AlertRule, ImportId, ImportRecord, NewAlert, NewAlertRule, RuleId, TelemetryPoint,
    TripId, TripStats, VehicleId,
};
use anyhow::Result;

#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Opens a trip for `vehicle_id` and returns its id.
    async fn create_trip(&self, vehicle_id: VehicleId) -> Result<TripId>;

    /// Stores the final aggregates of a trip.
    async fn close_trip(&self, trip_id: TripId, stats: &TripStats) -> Result<()>;

    /// Stores a trip's points as one unit.
    async fn save_telemetry_batch(&self, trip_id: TripId, points: &[TelemetryPoint])
    -> Result<()>;

    /// Enabled rules scoped to `vehicle_id` plus enabled global rules.
    async fn get_active_rules(&self, vehicle_id: VehicleId) -> Result<Vec<AlertRule>>;

    async fn create_alert_rule(&self, rule: NewAlertRule) -> Result<RuleId>;

    async fn create_alert(&self, alert: NewAlert) -> Result<AlertId>;

    async fn record_import(&self, record: &ImportRecord) -> Result<ImportId>;
}
