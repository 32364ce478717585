use crate::model::{Comparator, Field, NewAlertRule, Severity, VehicleId};
use crate::repository::Repository;
use tracing::{info, warn};

struct Preset {
    name: &'static str,
    parameter: Field,
    threshold: f64,
    severity: Severity,
    template: &'static str,
    sound: bool,
    email: bool,
}

const PRESETS: &[Preset] = &[
    Preset {
        name: "Critical RPM",
        parameter: Field::Rpm,
        threshold: 7000.0,
        severity: Severity::Critical,
        template: "Critical engine speed: {value} RPM (limit {threshold})",
        sound: true,
        email: false,
    },
    Preset {
        name: "High RPM",
        parameter: Field::Rpm,
        threshold: 5500.0,
        severity: Severity::High,
        template: "High engine speed: {value} RPM",
        sound: true,
        email: false,
    },
    Preset {
        name: "Critical coolant temperature",
        parameter: Field::CoolantTemp,
        threshold: 110.0,
        severity: Severity::Critical,
        template: "Engine overheating: coolant at {value}°C (max {threshold}°C)",
        sound: true,
        email: true,
    },
    Preset {
        name: "High coolant temperature",
        parameter: Field::CoolantTemp,
        threshold: 95.0,
        severity: Severity::High,
        template: "Coolant temperature high: {value}°C",
        sound: true,
        email: false,
    },
    Preset {
        name: "Excessive speed",
        parameter: Field::Speed,
        threshold: 180.0,
        severity: Severity::Medium,
        template: "Excessive speed: {value} km/h",
        sound: false,
        email: false,
    },
    Preset {
        name: "High engine load",
        parameter: Field::EngineLoad,
        threshold: 85.0,
        severity: Severity::Medium,
        template: "Engine load high: {value}%",
        sound: false,
        email: false,
    },
    Preset {
        name: "High intake temperature",
        parameter: Field::IntakeTemp,
        threshold: 50.0,
        severity: Severity::Low,
        template: "Intake air temperature high: {value}°C",
        sound: false,
        email: false,
    },
];

/// The stock rule catalogue for one vehicle. Every rule is a `>` check.
pub fn default_rules(vehicle_id: VehicleId) -> Vec<NewAlertRule> {
    PRESETS
        .iter()
        .map(|p| NewAlertRule {
            vehicle_id: Some(vehicle_id),
            name: p.name.to_string(),
            parameter: p.parameter,
            comparator: Comparator::Gt,
            threshold: p.threshold,
            severity: p.severity,
            message_template: Some(p.template.to_string()),
            notify_sound: p.sound,
            notify_email: p.email,
        })
        .collect()
}

/// Stores the stock catalogue for `vehicle_id` and returns how many rules
/// were created. A rule the repository refuses is logged and skipped.
pub async fn install_default_rules<R: Repository + ?Sized>(
    repo: &R,
    vehicle_id: VehicleId,
) -> usize {
    let mut created = 0;
    for rule in default_rules(vehicle_id) {
        let name = rule.name.clone();
        match repo.create_alert_rule(rule).await {
            Ok(_) => created += 1,
            Err(e) => warn!(vehicle_id, rule = %name, error = %e, "Failed to create default rule"),
        }
    }
    info!(vehicle_id, created, "Default alert rules installed");
    created
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::render_message;
    use crate::repository::MemoryRepository;

    #[test]
    fn test_catalogue_contents() {
        let rules = default_rules(3);
        assert_eq!(rules.len(), 7);
        assert!(rules.iter().all(|r| r.vehicle_id == Some(3)));
        assert!(rules.iter().all(|r| r.comparator == Comparator::Gt));

        let critical_coolant = rules
            .iter()
            .find(|r| r.parameter == Field::CoolantTemp && r.severity == Severity::Critical)
            .unwrap();
        assert_eq!(critical_coolant.threshold, 110.0);
        assert!(critical_coolant.notify_sound && critical_coolant.notify_email);
    }

    #[tokio::test]
    async fn test_install_creates_enabled_rules() {
        let repo = MemoryRepository::new();
        assert_eq!(install_default_rules(&repo, 1).await, 7);

        let active = repo.get_active_rules(1).await.unwrap();
        assert_eq!(active.len(), 7);
        assert!(repo.get_active_rules(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_critical_coolant_message_names_limit() {
        let repo = MemoryRepository::new();
        install_default_rules(&repo, 1).await;

        let rules = repo.get_active_rules(1).await.unwrap();
        let critical_coolant = rules
            .iter()
            .find(|r| r.parameter == Field::CoolantTemp && r.severity == Severity::Critical)
            .unwrap();
        assert_eq!(
            render_message(critical_coolant, 120.0),
            "Engine overheating: coolant at 120°C (max 110°C)"
        );
    }
}
