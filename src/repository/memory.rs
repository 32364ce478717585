use crate::model::{
    Alert, AlertId, AlertRule, ImportId, ImportRecord, NewAlert, NewAlertRule, RuleId,
    TelemetryPoint, TripId, TripStats, VehicleId,
};
use crate::repository::Repository;
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A trip as held by [`MemoryRepository`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTrip {
    pub id: TripId,
    pub vehicle_id: VehicleId,
    pub opened_at: DateTime<Utc>,
    pub points: Vec<TelemetryPoint>,
    /// `None` while the trip is still open.
    pub stats: Option<TripStats>,
}

#[derive(Default)]
struct State {
    last_id: i64,
    trips: BTreeMap<TripId, StoredTrip>,
    rules: BTreeMap<RuleId, AlertRule>,
    alerts: BTreeMap<AlertId, Alert>,
    imports: BTreeMap<ImportId, ImportRecord>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }
}

/// Process-local [`Repository`], used by the CLI and in tests.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the store with already-identified rules, e.g. from a rules file.
    pub fn with_rules(rules: Vec<AlertRule>) -> Self {
        let repo = Self::default();
        {
            let mut state = repo.state();
            for rule in rules {
                state.last_id = state.last_id.max(rule.id);
                state.rules.insert(rule.id, rule);
            }
        }
        repo
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn trip(&self, id: TripId) -> Option<StoredTrip> {
        self.state().trips.get(&id).cloned()
    }

    pub fn trips(&self) -> Vec<StoredTrip> {
        self.state().trips.values().cloned().collect()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state().alerts.values().cloned().collect()
    }

    pub fn imports(&self) -> Vec<(ImportId, ImportRecord)> {
        self.state()
            .imports
            .iter()
            .map(|(id, r)| (*id, r.clone()))
            .collect()
    }

    /// Earlier import of the same file content, if any.
    pub fn find_import_by_hash(&self, content_hash: &str) -> Option<(ImportId, ImportRecord)> {
        self.state()
            .imports
            .iter()
            .find(|(_, r)| r.content_hash == content_hash)
            .map(|(id, r)| (*id, r.clone()))
    }

    /// Enables or disables a rule. Returns false for an unknown id.
    pub fn set_rule_enabled(&self, rule_id: RuleId, enabled: bool) -> bool {
        match self.state().rules.get_mut(&rule_id) {
            Some(rule) => {
                rule.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Acknowledges an alert. Returns false if it was already acknowledged.
    pub fn acknowledge_alert(&self, alert_id: AlertId) -> Result<bool> {
        let mut state = self.state();
        let alert = state
            .alerts
            .get_mut(&alert_id)
            .ok_or_else(|| anyhow!("alert {alert_id} not found"))?;
        if alert.acknowledged {
            return Ok(false);
        }
        alert.acknowledged = true;
        alert.acknowledged_at = Some(Utc::now());
        Ok(true)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn create_trip(&self, vehicle_id: VehicleId) -> Result<TripId> {
        let mut state = self.state();
        let id = state.next_id();
        state.trips.insert(
            id,
            StoredTrip {
                id,
                vehicle_id,
                opened_at: Utc::now(),
                points: Vec::new(),
                stats: None,
            },
        );
        debug!(trip_id = id, vehicle_id, "Trip opened");
        Ok(id)
    }

    async fn close_trip(&self, trip_id: TripId, stats: &TripStats) -> Result<()> {
        let mut state = self.state();
        let trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| anyhow!("trip {trip_id} not found"))?;
        trip.stats = Some(stats.clone());
        Ok(())
    }

    async fn save_telemetry_batch(
        &self,
        trip_id: TripId,
        points: &[TelemetryPoint],
    ) -> Result<()> {
        let mut state = self.state();
        let trip = state
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| anyhow!("trip {trip_id} not found"))?;
        trip.points.extend_from_slice(points);
        debug!(trip_id, points = points.len(), "Telemetry batch saved");
        Ok(())
    }

    async fn get_active_rules(&self, vehicle_id: VehicleId) -> Result<Vec<AlertRule>> {
        Ok(self
            .state()
            .rules
            .values()
            .filter(|r| r.enabled && r.applies_to(vehicle_id))
            .cloned()
            .collect())
    }

    async fn create_alert_rule(&self, rule: NewAlertRule) -> Result<RuleId> {
        let mut state = self.state();
        let id = state.next_id();
        state.rules.insert(id, rule.into_rule(id));
        Ok(id)
    }

    async fn create_alert(&self, alert: NewAlert) -> Result<AlertId> {
        let mut state = self.state();
        let id = state.next_id();
        state.alerts.insert(
            id,
            Alert {
                id,
                vehicle_id: alert.vehicle_id,
                trip_id: alert.trip_id,
                alert_type: alert.alert_type,
                severity: alert.severity,
                message: alert.message,
                value: alert.value,
                threshold: alert.threshold,
                created_at: Utc::now(),
                acknowledged: false,
                acknowledged_at: None,
            },
        );
        Ok(id)
    }

    async fn record_import(&self, record: &ImportRecord) -> Result<ImportId> {
        let mut state = self.state();
        let id = state.next_id();
        state.imports.insert(id, record.clone());
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comparator, Field, Severity};

    fn rule(vehicle_id: Option<VehicleId>, threshold: f64) -> NewAlertRule {
        NewAlertRule {
            vehicle_id,
            name: "test".to_string(),
            parameter: Field::Rpm,
            comparator: Comparator::Gt,
            threshold,
            severity: Severity::High,
            message_template: None,
            notify_sound: false,
            notify_email: false,
        }
    }

    fn alert(vehicle_id: VehicleId) -> NewAlert {
        NewAlert {
            vehicle_id,
            trip_id: None,
            alert_type: Field::Rpm,
            severity: Severity::High,
            message: "rpm".to_string(),
            value: 6000.0,
            threshold: 5500.0,
        }
    }

    #[tokio::test]
    async fn test_active_rules_scope() {
        let repo = MemoryRepository::new();
        let global = repo.create_alert_rule(rule(None, 1.0)).await.unwrap();
        let mine = repo.create_alert_rule(rule(Some(1), 2.0)).await.unwrap();
        let other = repo.create_alert_rule(rule(Some(2), 3.0)).await.unwrap();
        let disabled = repo.create_alert_rule(rule(Some(1), 4.0)).await.unwrap();
        assert!(repo.set_rule_enabled(disabled, false));

        let ids: Vec<_> = repo
            .get_active_rules(1)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![global, mine]);
        assert!(!ids.contains(&other));
    }

    #[tokio::test]
    async fn test_trip_lifecycle() {
        let repo = MemoryRepository::new();
        let trip_id = repo.create_trip(7).await.unwrap();
        repo.save_telemetry_batch(trip_id, &[TelemetryPoint::at(Utc::now())])
            .await
            .unwrap();
        assert!(repo.trip(trip_id).unwrap().stats.is_none());

        repo.close_trip(trip_id, &TripStats::default()).await.unwrap();
        let trip = repo.trip(trip_id).unwrap();
        assert_eq!(trip.vehicle_id, 7);
        assert_eq!(trip.points.len(), 1);
        assert!(trip.stats.is_some());
    }

    #[tokio::test]
    async fn test_unknown_trip_is_an_error() {
        let repo = MemoryRepository::new();
        assert!(repo.close_trip(99, &TripStats::default()).await.is_err());
        assert!(repo.save_telemetry_batch(99, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_acknowledge_is_one_way() {
        let repo = MemoryRepository::new();
        let id = repo.create_alert(alert(1)).await.unwrap();
        assert!(!repo.alerts()[0].acknowledged);

        assert!(repo.acknowledge_alert(id).unwrap());
        assert!(!repo.acknowledge_alert(id).unwrap());
        assert!(repo.alerts()[0].acknowledged_at.is_some());
        assert!(repo.acknowledge_alert(id + 100).is_err());
    }

    #[test]
    fn test_with_rules_keeps_ids_unique() {
        let seeded = rule(None, 1.0).into_rule(40);
        let repo = MemoryRepository::with_rules(vec![seeded]);
        let next = repo.state().next_id();
        assert_eq!(next, 41);
    }
}
