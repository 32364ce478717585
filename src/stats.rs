use crate::model::{Field, TelemetryPoint, TripStats};

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

impl TripStats {
    /// Summarises one trip's points, which must already be in time order.
    pub fn from_points(points: &[TelemetryPoint]) -> Self {
        let (Some(first), Some(last)) = (points.first(), points.last()) else {
            return TripStats::default();
        };

        let distance_km: f64 = points
            .windows(2)
            .filter_map(|pair| {
                let (lat1, lon1) = pair[0].position()?;
                let (lat2, lon2) = pair[1].position()?;
                Some(haversine_km(lat1, lon1, lat2, lon2))
            })
            .sum();

        let speeds = series(points, Field::Speed);
        let rpms = series(points, Field::Rpm);
        let loads = series(points, Field::EngineLoad);

        TripStats {
            distance_km: round_to(distance_km, 2),
            duration_seconds: (last.timestamp - first.timestamp).num_seconds(),
            avg_speed: round_to(mean(&speeds), 1),
            max_speed: round_to(max(&speeds), 1),
            avg_rpm: round_to(mean(&rpms), 1),
            max_rpm: round_to(max(&rpms), 1),
            avg_load: round_to(mean(&loads), 1),
        }
    }
}

fn series(points: &[TelemetryPoint], field: Field) -> Vec<f64> {
    points.iter().filter_map(|p| p.get(field)).collect()
}

/// Great-circle distance in kilometres between two coordinates in degrees.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Largest value, 0.0 for empty input.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

pub fn pct(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (part as f64 / total as f64) * 100.0
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
