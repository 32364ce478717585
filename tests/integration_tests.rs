use chrono::Duration;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use telemetry_sentinel::alerts::{AlertCache, AlertRuleEngine, install_default_rules};
use telemetry_sentinel::config::RuleConfig;
use telemetry_sentinel::importer::profiles::{NATIVE, TORQUE};
use telemetry_sentinel::importer::{
    ImportError, ImportOptions, ImportRequest, analyze_csv, detect_source_file, import_csv,
};
use telemetry_sentinel::model::{Field, Severity};
use telemetry_sentinel::replay::replay_csv;
use telemetry_sentinel::repository::MemoryRepository;

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[tokio::test]
async fn test_native_import_splits_trips() {
    let repo = MemoryRepository::new();
    let request = ImportRequest::new(fixture("native_two_trips.csv"), 1, &NATIVE);

    let report = import_csv(&repo, &request).await.expect("import failed");

    assert!(report.success);
    assert_eq!(report.trips_created, 2);
    assert_eq!(report.rows_imported, 3);
    assert_eq!(report.rows_skipped, 0);
    assert!(report.errors.is_empty());

    let trips = repo.trips();
    assert_eq!(trips.len(), 2);
    assert_eq!(trips[0].points.len(), 2);
    assert_eq!(trips[1].points.len(), 1);

    let first = trips[0].stats.as_ref().expect("trip not closed");
    assert_eq!(first.duration_seconds, 300);
    assert_eq!(first.max_speed, 52.0);
    assert_eq!(first.avg_speed, 26.0);
    assert!(first.distance_km > 1.0 && first.distance_km < 1.5);

    let (import_id, record) = &repo.imports()[0];
    assert_eq!(report.import_id, Some(*import_id));
    assert_eq!(record.source_type, "native");
    assert_eq!(record.file_name, "native_two_trips.csv");
    assert_eq!(record.content_hash.len(), 64);
}

#[tokio::test]
async fn test_torque_import_skips_invalid_row() {
    let path = fixture("torque_drive.csv");
    assert_eq!(detect_source_file(&path).id, "torque");

    let repo = MemoryRepository::new();
    let report = import_csv(&repo, &ImportRequest::new(&path, 2, &TORQUE))
        .await
        .expect("import failed");

    assert_eq!(report.rows_imported, 5);
    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.errors, vec!["Row 6: rpm out of range: 9000"]);
    assert_eq!(report.trips_created, 2);
    assert_eq!(report.trips[0].points, 4);
    assert_eq!(report.trips[0].max_rpm, 2500.0);
}

#[tokio::test]
async fn test_strict_import_is_all_or_nothing() {
    let repo = MemoryRepository::new();
    let request =
        ImportRequest::new(fixture("torque_drive.csv"), 2, &TORQUE).with_options(ImportOptions {
            skip_invalid_rows: false,
            ..ImportOptions::default()
        });

    match import_csv(&repo, &request).await {
        Err(ImportError::InvalidRow { row, source }) => {
            assert_eq!(row, 6);
            assert_eq!(source.field(), "rpm");
        }
        other => panic!("expected invalid row error, got {other:?}"),
    }
    assert!(repo.trips().is_empty());
    assert!(repo.imports().is_empty());
}

#[tokio::test]
async fn test_reimport_is_detectable_by_hash() {
    let repo = MemoryRepository::new();
    let request = ImportRequest::new(fixture("native_two_trips.csv"), 1, &NATIVE);

    let first = import_csv(&repo, &request).await.unwrap();
    let (_, record) = &repo.imports()[0];
    let hash = record.content_hash.clone();

    let (found, _) = repo.find_import_by_hash(&hash).expect("import not recorded");
    assert_eq!(Some(found), first.import_id);

    // not enforced by the importer
    import_csv(&repo, &request).await.unwrap();
    assert_eq!(repo.imports().len(), 2);
}

#[tokio::test]
async fn test_gzipped_file_imports_like_plain() {
    let plain = std::fs::read(fixture("native_two_trips.csv")).unwrap();
    let path = std::env::temp_dir().join("telemetry_sentinel_native.csv.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&plain).unwrap();
    std::fs::write(&path, encoder.finish().unwrap()).unwrap();

    let repo = MemoryRepository::new();
    let report = import_csv(&repo, &ImportRequest::new(&path, 1, &NATIVE))
        .await
        .unwrap();
    assert_eq!(report.rows_imported, 3);
    assert_eq!(report.trips_created, 2);

    std::fs::remove_file(&path).unwrap();
}

#[test]
fn test_analyze_torque_fixture() {
    let analysis = analyze_csv(fixture("torque_drive.csv"), None).unwrap();
    assert_eq!(analysis.source_detected, "torque");
    assert_eq!(analysis.total_rows, 6);
    assert_eq!(analysis.preview.len(), 6);
    assert_eq!(analysis.columns_found.len(), 8);
    assert!(analysis.warnings.is_empty());
}

#[tokio::test]
async fn test_replay_with_rules_file() {
    let rules = RuleConfig::load(fixture("rules.json").to_str().unwrap()).unwrap();
    let repo = Arc::new(MemoryRepository::with_rules(rules.into_rules()));
    let engine = AlertRuleEngine::new(repo.clone(), Arc::new(AlertCache::default()));

    let report = replay_csv(
        &engine,
        repo.as_ref(),
        fixture("torque_drive.csv"),
        1,
        &TORQUE,
        30,
    )
    .await
    .unwrap();

    assert_eq!(report.points, 5);
    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.alerts.len(), 2);
    assert!(report.alerts.iter().all(|a| a.rule_id == 1));
    assert_eq!(
        report.alerts[0].message,
        "Coolant temperature at 96 (limit 95)"
    );
    assert_eq!(report.alerts[1].value, 97.0);
    assert_eq!(report.trips.len(), 2);

    assert_eq!(report.summary.total_alerts, 2);
    assert_eq!(report.summary.by_severity[&Severity::High], 2);
    assert_eq!(repo.alerts().len(), 2);
}

#[tokio::test]
async fn test_replay_with_default_rules_and_short_timeout() {
    let repo = Arc::new(MemoryRepository::new());
    assert_eq!(install_default_rules(repo.as_ref(), 1).await, 7);
    let cache = Arc::new(AlertCache::new(Duration::seconds(60)));
    let engine = AlertRuleEngine::new(repo.clone(), cache);

    let report = replay_csv(
        &engine,
        repo.as_ref(),
        fixture("torque_drive.csv"),
        1,
        &TORQUE,
        30,
    )
    .await
    .unwrap();

    // 96 at 09:01:00 fires, 97 at 09:02:40 is past the 60s timeout, so
    // does 97 at 09:07:40
    assert_eq!(report.alerts.len(), 3);
    assert!(
        report
            .alerts
            .iter()
            .all(|a| a.alert_type == Field::CoolantTemp && a.notify_sound)
    );
}
