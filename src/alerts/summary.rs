use crate::model::{Alert, Field, Severity};
use crate::stats::{pct, round_to};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Alert counts over a trailing window of days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertSummary {
    pub period_days: u32,
    pub total_alerts: usize,
    pub unacknowledged: usize,
    /// Always carries all four severities, zero included.
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_type: BTreeMap<Field, usize>,
    /// Percentage of alerts in the window that were acknowledged.
    pub acknowledgement_rate: f64,
}

impl AlertSummary {
    /// Summarises the alerts created after `now - days`.
    pub fn from_alerts(alerts: &[Alert], now: DateTime<Utc>, days: u32) -> Self {
        let since = now - Duration::days(i64::from(days));

        let mut by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_type = BTreeMap::new();
        let mut total_alerts = 0;
        let mut unacknowledged = 0;

        for alert in alerts.iter().filter(|a| a.created_at > since) {
            total_alerts += 1;
            if !alert.acknowledged {
                unacknowledged += 1;
            }
            *by_severity.entry(alert.severity).or_insert(0) += 1;
            *by_type.entry(alert.alert_type).or_insert(0) += 1;
        }

        AlertSummary {
            period_days: days,
            total_alerts,
            unacknowledged,
            by_severity,
            by_type,
            acknowledgement_rate: round_to(pct(total_alerts - unacknowledged, total_alerts), 2),
        }
    }
}
