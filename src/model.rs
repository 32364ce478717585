//! Core telemetry, trip, rule and alert types shared by the importer and the
//! alert engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type VehicleId = i64;
pub type TripId = i64;
pub type RuleId = i64;
pub type AlertId = i64;
pub type ImportId = i64;

/// A monitored numeric parameter of a telemetry point.
///
/// Declaration order is the validation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Rpm,
    Speed,
    CoolantTemp,
    IntakeTemp,
    Maf,
    EngineLoad,
    ThrottlePos,
    FuelPressure,
    Latitude,
    Longitude,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::Rpm,
        Field::Speed,
        Field::CoolantTemp,
        Field::IntakeTemp,
        Field::Maf,
        Field::EngineLoad,
        Field::ThrottlePos,
        Field::FuelPressure,
        Field::Latitude,
        Field::Longitude,
    ];

    /// Canonical snake_case name, as used in column mappings and rules.
    pub fn name(self) -> &'static str {
        match self {
            Field::Rpm => "rpm",
            Field::Speed => "speed",
            Field::CoolantTemp => "coolant_temp",
            Field::IntakeTemp => "intake_temp",
            Field::Maf => "maf",
            Field::EngineLoad => "engine_load",
            Field::ThrottlePos => "throttle_pos",
            Field::FuelPressure => "fuel_pressure",
            Field::Latitude => "latitude",
            Field::Longitude => "longitude",
        }
    }

    /// Human readable label used when rendering alert messages.
    pub fn label(self) -> &'static str {
        match self {
            Field::Rpm => "Engine RPM",
            Field::Speed => "Speed",
            Field::CoolantTemp => "Coolant temperature",
            Field::IntakeTemp => "Intake air temperature",
            Field::Maf => "Mass air flow",
            Field::EngineLoad => "Engine load",
            Field::ThrottlePos => "Throttle position",
            Field::FuelPressure => "Fuel pressure",
            Field::Latitude => "Latitude",
            Field::Longitude => "Longitude",
        }
    }

    /// Inclusive physical range a value of this field must lie in.
    pub fn range(self) -> (f64, f64) {
        match self {
            Field::Rpm => (0.0, 8000.0),
            Field::Speed => (0.0, 300.0),
            Field::CoolantTemp => (-40.0, 150.0),
            Field::IntakeTemp => (-40.0, 100.0),
            Field::Maf => (0.0, 200.0),
            Field::EngineLoad => (0.0, 100.0),
            Field::ThrottlePos => (0.0, 100.0),
            // OBD-II PID 0x0A tops out at 765 kPa
            Field::FuelPressure => (0.0, 765.0),
            Field::Latitude => (-90.0, 90.0),
            Field::Longitude => (-180.0, 180.0),
        }
    }

    pub fn in_range(self, value: f64) -> bool {
        let (min, max) = self.range();
        value >= min && value <= max
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .into_iter()
            .find(|field| field.name() == s.trim())
            .ok_or_else(|| format!("unknown telemetry field: {s}"))
    }
}

/// One timestamped sample. Every numeric field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPoint {
    pub timestamp: DateTime<Utc>,
    pub rpm: Option<f64>,
    pub speed: Option<f64>,
    pub coolant_temp: Option<f64>,
    pub intake_temp: Option<f64>,
    pub maf: Option<f64>,
    pub engine_load: Option<f64>,
    pub throttle_pos: Option<f64>,
    pub fuel_pressure: Option<f64>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl TelemetryPoint {
    /// A point with only its timestamp set.
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        TelemetryPoint {
            timestamp,
            rpm: None,
            speed: None,
            coolant_temp: None,
            intake_temp: None,
            maf: None,
            engine_load: None,
            throttle_pos: None,
            fuel_pressure: None,
            latitude: None,
            longitude: None,
        }
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        match field {
            Field::Rpm => self.rpm,
            Field::Speed => self.speed,
            Field::CoolantTemp => self.coolant_temp,
            Field::IntakeTemp => self.intake_temp,
            Field::Maf => self.maf,
            Field::EngineLoad => self.engine_load,
            Field::ThrottlePos => self.throttle_pos,
            Field::FuelPressure => self.fuel_pressure,
            Field::Latitude => self.latitude,
            Field::Longitude => self.longitude,
        }
    }

    pub fn set(&mut self, field: Field, value: Option<f64>) {
        let slot = match field {
            Field::Rpm => &mut self.rpm,
            Field::Speed => &mut self.speed,
            Field::CoolantTemp => &mut self.coolant_temp,
            Field::IntakeTemp => &mut self.intake_temp,
            Field::Maf => &mut self.maf,
            Field::EngineLoad => &mut self.engine_load,
            Field::ThrottlePos => &mut self.throttle_pos,
            Field::FuelPressure => &mut self.fuel_pressure,
            Field::Latitude => &mut self.latitude,
            Field::Longitude => &mut self.longitude,
        };
        *slot = value;
    }

    /// Builder-style setter, handy for constructing points in code.
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.set(field, Some(value));
        self
    }

    /// Both coordinates, if the point has a GPS fix.
    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Maps canonical fields to the source CSV's column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub timestamp: Option<String>,
    pub fields: BTreeMap<Field, String>,
}

impl ColumnMapping {
    pub fn is_empty(&self) -> bool {
        self.timestamp.is_none() && self.fields.is_empty()
    }

    pub fn column(&self, field: Field) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Applies a `field=column` override. `timestamp` targets the timestamp
    /// column; any other key must name a [`Field`].
    pub fn apply_override(&mut self, spec: &str) -> Result<(), String> {
        let (key, column) = spec
            .split_once('=')
            .ok_or_else(|| format!("expected field=column, got '{spec}'"))?;
        let column = column.trim().to_string();
        if key.trim() == "timestamp" {
            self.timestamp = Some(column);
        } else {
            self.fields.insert(key.parse()?, column);
        }
        Ok(())
    }
}

/// Aggregates computed when a trip is closed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripStats {
    pub distance_km: f64,
    pub duration_seconds: i64,
    pub avg_speed: f64,
    pub max_speed: f64,
    pub avg_rpm: f64,
    pub max_rpm: f64,
    pub avg_load: f64,
}

/// A time-ordered run of points with no gap above the segmentation threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trip {
    pub points: Vec<TelemetryPoint>,
}

impl Trip {
    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.timestamp)
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|p| p.timestamp)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Provenance of one bulk import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub vehicle_id: VehicleId,
    pub source_type: String,
    pub file_name: String,
    pub content_hash: String,
    pub rows_total: usize,
    pub rows_imported: usize,
    pub rows_skipped: usize,
    pub trips_created: usize,
    pub imported_at: DateTime<Utc>,
    pub can_rollback: bool,
}

/// Comparison applied between a point value and a rule threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparator {
    /// NaN on either side never satisfies a condition.
    #[allow(clippy::float_cmp)]
    pub fn apply(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Lt => value < threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Le => value <= threshold,
            Comparator::Eq => value == threshold,
            Comparator::Ne => !value.is_nan() && !threshold.is_nan() && value != threshold,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
            Comparator::Eq => "==",
            Comparator::Ne => "!=",
        }
    }
}

impl FromStr for Comparator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ">" => Ok(Self::Gt),
            "<" => Ok(Self::Lt),
            ">=" => Ok(Self::Ge),
            "<=" => Ok(Self::Le),
            "==" => Ok(Self::Eq),
            "!=" => Ok(Self::Ne),
            other => Err(format!("unknown comparator: {other}")),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operator-defined threshold condition on one parameter.
///
/// `vehicle_id = None` makes the rule global.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: RuleId,
    #[serde(default)]
    pub vehicle_id: Option<VehicleId>,
    #[serde(default)]
    pub name: String,
    pub parameter: Field,
    #[serde(rename = "condition")]
    pub comparator: Comparator,
    pub threshold: f64,
    pub severity: Severity,
    #[serde(default)]
    pub message_template: Option<String>,
    #[serde(default)]
    pub notify_sound: bool,
    #[serde(default)]
    pub notify_email: bool,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AlertRule {
    pub fn applies_to(&self, vehicle_id: VehicleId) -> bool {
        self.vehicle_id.is_none_or(|id| id == vehicle_id)
    }
}

/// A rule that has not been stored yet.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAlertRule {
    pub vehicle_id: Option<VehicleId>,
    pub name: String,
    pub parameter: Field,
    #[serde(rename = "condition")]
    pub comparator: Comparator,
    pub threshold: f64,
    pub severity: Severity,
    pub message_template: Option<String>,
    pub notify_sound: bool,
    pub notify_email: bool,
}

impl NewAlertRule {
    pub fn into_rule(self, id: RuleId) -> AlertRule {
        AlertRule {
            id,
            vehicle_id: self.vehicle_id,
            name: self.name,
            parameter: self.parameter,
            comparator: self.comparator,
            threshold: self.threshold,
            severity: self.severity,
            message_template: self.message_template,
            notify_sound: self.notify_sound,
            notify_email: self.notify_email,
            enabled: true,
        }
    }
}

/// Alert payload handed to the repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewAlert {
    pub vehicle_id: VehicleId,
    pub trip_id: Option<TripId>,
    pub alert_type: Field,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
}

/// A stored alert. Starts unacknowledged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: AlertId,
    pub vehicle_id: VehicleId,
    pub trip_id: Option<TripId>,
    pub alert_type: Field,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub created_at: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_at: Option<DateTime<Utc>>,
}
