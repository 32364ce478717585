use crate::alerts::cache::{AlertCache, CacheEntry, Firing};
use crate::model::{
    Alert, AlertId, AlertRule, Field, NewAlert, RuleId, Severity, TelemetryPoint, TripId, VehicleId,
};
use crate::repository::Repository;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// An alert raised by the engine, with the rule's notification flags.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaisedAlert {
    pub id: AlertId,
    pub rule_id: RuleId,
    pub vehicle_id: VehicleId,
    pub trip_id: Option<TripId>,
    pub alert_type: Field,
    pub severity: Severity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub notify_sound: bool,
    pub notify_email: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<&RaisedAlert> for Alert {
    /// The alert as stored at the moment it was raised.
    fn from(raised: &RaisedAlert) -> Self {
        Alert {
            id: raised.id,
            vehicle_id: raised.vehicle_id,
            trip_id: raised.trip_id,
            alert_type: raised.alert_type,
            severity: raised.severity,
            message: raised.message.clone(),
            value: raised.value,
            threshold: raised.threshold,
            created_at: raised.timestamp,
            acknowledged: false,
            acknowledged_at: None,
        }
    }
}

/// Evaluates telemetry points against the active rules of a vehicle.
///
/// The duplicate-suppression cache is injected so that separate engines
/// never share state unless the caller wants them to.
pub struct AlertRuleEngine<R: ?Sized> {
    repo: Arc<R>,
    cache: Arc<AlertCache>,
}

impl<R: Repository + ?Sized> AlertRuleEngine<R> {
    pub fn new(repo: Arc<R>, cache: Arc<AlertCache>) -> Self {
        Self { repo, cache }
    }

    pub fn cache(&self) -> &AlertCache {
        &self.cache
    }

    /// Evaluates `point` at the current wall-clock time.
    pub async fn evaluate(
        &self,
        vehicle_id: VehicleId,
        point: &TelemetryPoint,
        trip_id: Option<TripId>,
    ) -> Result<Vec<RaisedAlert>> {
        self.evaluate_at(vehicle_id, point, trip_id, Utc::now())
            .await
    }

    /// Evaluates `point` as of `now`, which is the instant used for
    /// duplicate suppression.
    ///
    /// Only repository failures are returned as errors.
    pub async fn evaluate_at(
        &self,
        vehicle_id: VehicleId,
        point: &TelemetryPoint,
        trip_id: Option<TripId>,
        now: DateTime<Utc>,
    ) -> Result<Vec<RaisedAlert>> {
        let rules = self.repo.get_active_rules(vehicle_id).await?;
        let mut raised = Vec::new();

        for rule in &rules {
            if !rule.enabled || !rule.applies_to(vehicle_id) {
                debug!(rule_id = rule.id, vehicle_id, "Skipping rule outside vehicle scope");
                continue;
            }

            let Some(value) = point.get(rule.parameter) else {
                continue;
            };

            if !rule.comparator.apply(value, rule.threshold) {
                continue;
            }

            let key = (vehicle_id, rule.id);
            let previous = match self.cache.try_fire(key, value, now) {
                Firing::Suppressed => {
                    debug!(
                        rule_id = rule.id,
                        vehicle_id,
                        value,
                        "Alert suppressed (recent duplicate)"
                    );
                    continue;
                }
                Firing::Fired { previous } => previous,
            };

            let message = render_message(rule, value);
            let created = self
                .repo
                .create_alert(NewAlert {
                    vehicle_id,
                    trip_id,
                    alert_type: rule.parameter,
                    severity: rule.severity,
                    message: message.clone(),
                    value,
                    threshold: rule.threshold,
                })
                .await;
            let id = match created {
                Ok(id) => id,
                Err(e) => {
                    // the alert was never stored, so the firing must not count
                    self.cache.restore(
                        key,
                        CacheEntry {
                            value,
                            fired_at: now,
                        },
                        previous,
                    );
                    warn!(rule_id = rule.id, vehicle_id, error = %e, "Failed to store alert");
                    return Err(e);
                }
            };

            info!(
                alert_id = id,
                rule_id = rule.id,
                vehicle_id,
                parameter = %rule.parameter,
                severity = %rule.severity,
                value,
                threshold = rule.threshold,
                "Alert raised"
            );

            raised.push(RaisedAlert {
                id,
                rule_id: rule.id,
                vehicle_id,
                trip_id,
                alert_type: rule.parameter,
                severity: rule.severity,
                message,
                value,
                threshold: rule.threshold,
                notify_sound: rule.notify_sound,
                notify_email: rule.notify_email,
                timestamp: now,
            });
        }

        Ok(raised)
    }

    /// Drops cache entries older than the timeout. Meant to run
    /// periodically, independently of evaluation.
    pub fn evict_expired(&self) -> usize {
        self.cache.evict_expired(Utc::now())
    }
}

/// Renders the rule's message template, or a default sentence when the rule
/// has none. `{value}`, `{threshold}` and `{parameter}` are substituted.
pub fn render_message(rule: &AlertRule, value: f64) -> String {
    let parameter = rule.parameter.label();
    match rule.message_template.as_deref() {
        Some(template) if !template.is_empty() => template
            .replace("{value}", &value.to_string())
            .replace("{threshold}", &rule.threshold.to_string())
            .replace("{parameter}", parameter),
        _ => format!(
            "{parameter} reached {value} (threshold: {})",
            rule.threshold
        ),
    }
}
