//! Registry of the CSV dialects written by common diagnostic apps.
//!
//! Profiles are plain data. Registration order matters: detection returns
//! the first profile whose fingerprint matches.

use crate::model::{ColumnMapping, Field};
use serde::Serialize;
use std::borrow::Cow;

/// Text encoding a source file is expected to be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    Latin1,
    Windows1252,
}

impl TextEncoding {
    /// Order in which encodings are tried when the declared one fails.
    pub const PROBE_ORDER: [TextEncoding; 3] = [
        TextEncoding::Utf8,
        TextEncoding::Latin1,
        TextEncoding::Windows1252,
    ];

    /// Strict decode, `None` when the bytes are not valid in this encoding.
    pub fn decode(self, bytes: &[u8]) -> Option<String> {
        match self {
            TextEncoding::Utf8 => {
                let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                encoding_rs::UTF_8
                    .decode_without_bom_handling_and_without_replacement(bytes)
                    .map(Cow::into_owned)
            }
            // ISO-8859-1 maps every byte to the code point of the same value
            TextEncoding::Latin1 => Some(bytes.iter().map(|&b| char::from(b)).collect()),
            TextEncoding::Windows1252 => encoding_rs::WINDOWS_1252
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(Cow::into_owned),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Windows1252 => "windows-1252",
        }
    }
}

/// How to recognise and read one vendor's CSV export.
#[derive(Debug, Serialize)]
pub struct SourceProfile {
    pub id: &'static str,
    pub name: &'static str,
    /// Every token must appear, case-insensitively, inside some header.
    pub fingerprint: &'static [&'static str],
    pub timestamp_column: Option<&'static str>,
    pub columns: &'static [(Field, &'static str)],
    /// chrono format string, tried before the generic fallbacks.
    pub timestamp_format: Option<&'static str>,
    pub encoding: TextEncoding,
}

impl SourceProfile {
    pub fn is_generic(&self) -> bool {
        self.id == GENERIC.id
    }

    /// Owned copy of the default column mapping, ready for per-call overrides.
    pub fn mapping(&self) -> ColumnMapping {
        ColumnMapping {
            timestamp: self.timestamp_column.map(str::to_string),
            fields: self
                .columns
                .iter()
                .map(|(field, column)| (*field, column.to_string()))
                .collect(),
        }
    }

    /// True when every header token of the fingerprint is present.
    pub fn matches(&self, headers: &[String]) -> bool {
        let headers: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
        self.fingerprint.iter().all(|token| {
            let token = token.to_lowercase();
            headers.iter().any(|h| h.contains(&token))
        })
    }
}

pub static TORQUE: SourceProfile = SourceProfile {
    id: "torque",
    name: "Torque Pro",
    fingerprint: &["Device Time", "Longitude", "Latitude", "GPS Speed"],
    timestamp_column: Some("Device Time"),
    columns: &[
        (Field::Rpm, "Engine RPM(rpm)"),
        (Field::Speed, "Speed (OBD)(km/h)"),
        (Field::CoolantTemp, "Engine Coolant Temperature(°C)"),
        (Field::IntakeTemp, "Intake Air Temperature(°C)"),
        (Field::Maf, "Mass Air Flow Rate(g/s)"),
        (Field::EngineLoad, "Engine Load(%)"),
        (Field::ThrottlePos, "Throttle Position(Manifold)(%)"),
        (Field::FuelPressure, "Fuel Pressure(kPa)"),
        (Field::Latitude, "Latitude"),
        (Field::Longitude, "Longitude"),
    ],
    timestamp_format: Some("%Y-%m-%d %H:%M:%S%.f"),
    encoding: TextEncoding::Utf8,
};

pub static OBD11: SourceProfile = SourceProfile {
    id: "obd11",
    name: "OBD11",
    fingerprint: &["Time", "Engine Speed", "Vehicle Speed"],
    timestamp_column: Some("Time"),
    columns: &[
        (Field::Rpm, "Engine Speed"),
        (Field::Speed, "Vehicle Speed"),
        (Field::CoolantTemp, "Coolant Temperature"),
        (Field::IntakeTemp, "Intake Air Temperature"),
        (Field::Maf, "MAF"),
        (Field::EngineLoad, "Engine Load"),
        (Field::ThrottlePos, "Throttle Position"),
    ],
    timestamp_format: Some("%Y-%m-%d %H:%M:%S"),
    encoding: TextEncoding::Utf8,
};

pub static CARISTA: SourceProfile = SourceProfile {
    id: "carista",
    name: "Carista",
    fingerprint: &["Timestamp", "RPM", "Speed"],
    timestamp_column: Some("Timestamp"),
    columns: &[
        (Field::Rpm, "RPM"),
        (Field::Speed, "Speed"),
        (Field::CoolantTemp, "Coolant Temp"),
        (Field::IntakeTemp, "Intake Air Temperature"),
        (Field::EngineLoad, "Load"),
        (Field::ThrottlePos, "Throttle"),
    ],
    timestamp_format: Some("%d/%m/%Y %H:%M:%S"),
    encoding: TextEncoding::Utf8,
};

pub static VCDS: SourceProfile = SourceProfile {
    id: "vcds",
    name: "VCDS/VAG-COM",
    fingerprint: &["Time", "RPM", "Speed"],
    timestamp_column: Some("Time"),
    columns: &[
        (Field::Rpm, "RPM"),
        (Field::Speed, "Speed (km/h)"),
        (Field::CoolantTemp, "Coolant"),
        (Field::IntakeTemp, "Intake"),
        (Field::Maf, "Mass Air Flow"),
        (Field::EngineLoad, "Load"),
    ],
    timestamp_format: Some("%H:%M:%S%.f"),
    encoding: TextEncoding::Latin1,
};

pub static NATIVE: SourceProfile = SourceProfile {
    id: "native",
    name: "Native export",
    fingerprint: &["timestamp", "rpm", "speed", "vehicle_id"],
    timestamp_column: Some("timestamp"),
    columns: &[
        (Field::Rpm, "rpm"),
        (Field::Speed, "speed"),
        (Field::CoolantTemp, "coolant_temp"),
        (Field::IntakeTemp, "intake_temp"),
        (Field::Maf, "maf"),
        (Field::EngineLoad, "engine_load"),
        (Field::ThrottlePos, "throttle_pos"),
        (Field::FuelPressure, "fuel_pressure"),
        (Field::Latitude, "latitude"),
        (Field::Longitude, "longitude"),
    ],
    timestamp_format: Some("%Y-%m-%d %H:%M:%S"),
    encoding: TextEncoding::Utf8,
};

/// Manual mapping fallback: no fingerprint, no columns.
pub static GENERIC: SourceProfile = SourceProfile {
    id: "generic",
    name: "Generic (manual mapping)",
    fingerprint: &[],
    timestamp_column: None,
    columns: &[],
    timestamp_format: None,
    encoding: TextEncoding::Utf8,
};

/// All profiles in registration order, generic last.
pub static PROFILES: [&SourceProfile; 6] = [&TORQUE, &OBD11, &CARISTA, &VCDS, &NATIVE, &GENERIC];

/// Looks a profile up by id.
pub fn profile(id: &str) -> Option<&'static SourceProfile> {
    PROFILES.iter().copied().find(|p| p.id == id)
}

/// Like [`profile`] but falls back to [`GENERIC`] for unknown ids.
pub fn profile_or_generic(id: &str) -> &'static SourceProfile {
    profile(id).unwrap_or(&GENERIC)
}
