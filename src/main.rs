//! CLI entry point for the telemetry sentinel tool.
//!
//! Provides subcommands for detecting and previewing vehicle telemetry CSV
//! exports, importing them into trips, and replaying them through the alert
//! rule engine.

use anyhow::{Context, Result};
use chrono::Duration;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use telemetry_sentinel::alerts::{AlertCache, AlertRuleEngine, default_rules, install_default_rules};
use telemetry_sentinel::config::{RuleConfig, Settings};
use telemetry_sentinel::importer::profiles::profile_or_generic;
use telemetry_sentinel::importer::{
    ImportOptions, ImportReport, ImportRequest, SourceProfile, analyze_csv, detect_source_file,
    import_csv,
};
use telemetry_sentinel::model::VehicleId;
use telemetry_sentinel::output::{append_trip_rows, print_json};
use telemetry_sentinel::replay::replay_csv;
use telemetry_sentinel::repository::MemoryRepository;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "telemetry_sentinel")]
#[command(about = "Import vehicle telemetry CSVs and evaluate alert rules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect which diagnostic app wrote a CSV file
    Detect {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Preview a CSV file without importing it
    Analyze {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Force a source profile (torque, obd11, carista, vcds, native, generic)
        #[arg(short, long)]
        source: Option<String>,
    },
    /// Import a CSV file into trips for a vehicle
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long)]
        vehicle_id: VehicleId,

        /// Force a source profile instead of detecting it
        #[arg(short, long)]
        source: Option<String>,

        /// Column override as field=column (repeatable)
        #[arg(short, long = "map", value_name = "FIELD=COLUMN")]
        map: Vec<String>,

        /// Keep every valid row in a single trip
        #[arg(long, default_value_t = false)]
        no_trips: bool,

        /// Inactivity gap that splits trips, in minutes
        #[arg(short, long)]
        gap_minutes: Option<u32>,

        /// Abort on the first invalid row instead of skipping it
        #[arg(long, default_value_t = false)]
        strict: bool,

        /// CSV file to append one row per created trip to
        #[arg(short, long)]
        report: Option<String>,
    },
    /// Replay a CSV file through the alert engine and the live trip buffer
    Replay {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        #[arg(short, long)]
        vehicle_id: VehicleId,

        #[arg(short, long)]
        source: Option<String>,

        /// JSON file with an array of alert rules
        #[arg(short, long)]
        rules: Option<String>,

        /// Install the stock rule catalogue for the vehicle
        #[arg(long, default_value_t = false)]
        default_rules: bool,
    },
    /// Print the stock alert rule catalogue for a vehicle
    DefaultRules {
        #[arg(short, long)]
        vehicle_id: VehicleId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Loads .env too
    let settings = Settings::from_env();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path = Path::new(&settings.log_file_path);
    let log_dir = log_file_path.parent().unwrap_or(Path::new("logs"));
    let log_file_name = log_file_path
        .file_name()
        .unwrap_or(OsStr::new("telemetry_sentinel.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Detect { file } => {
            let profile = detect_source_file(&file);
            info!(
                file = %file.display(),
                source = profile.id,
                name = profile.name,
                "Detection result"
            );
        }
        Commands::Analyze { file, source } => {
            let analysis = analyze_csv(&file, source.as_deref())?;
            print_json(&analysis)?;
        }
        Commands::Import {
            file,
            vehicle_id,
            source,
            map,
            no_trips,
            gap_minutes,
            strict,
            report,
        } => {
            let options = ImportOptions {
                create_trips: !no_trips,
                gap_minutes: gap_minutes.unwrap_or(settings.trip_gap_minutes),
                skip_invalid_rows: settings.skip_invalid_rows && !strict,
            };
            let mut request =
                ImportRequest::new(&file, vehicle_id, resolve_profile(&file, source.as_deref()))
                    .with_options(options);
            for spec in &map {
                request = request.with_override(spec).map_err(anyhow::Error::msg)?;
            }

            let repo = MemoryRepository::new();
            match import_csv(&repo, &request).await {
                Ok(result) => {
                    if let Some(path) = &report {
                        append_trip_rows(path, &result.trips)
                            .with_context(|| format!("writing trip report {path}"))?;
                    }
                    print_json(&result)?;
                }
                Err(e) => {
                    error!(file = %file.display(), vehicle_id, error = %e, "Import failed");
                    print_json(&ImportReport::from_error(vehicle_id, &e))?;
                    return Err(e.into());
                }
            }
        }
        Commands::Replay {
            file,
            vehicle_id,
            source,
            rules,
            default_rules,
        } => {
            let repo = match &rules {
                Some(path) => Arc::new(MemoryRepository::with_rules(
                    RuleConfig::load(path)?.into_rules(),
                )),
                None => Arc::new(MemoryRepository::new()),
            };
            if default_rules {
                install_default_rules(repo.as_ref(), vehicle_id).await;
            }

            let cache = Arc::new(AlertCache::new(Duration::seconds(
                settings.alert_cache_timeout_secs,
            )));
            let engine = AlertRuleEngine::new(repo.clone(), cache);
            let profile = resolve_profile(&file, source.as_deref());

            let result = replay_csv(
                &engine,
                repo.as_ref(),
                &file,
                vehicle_id,
                profile,
                settings.trip_gap_minutes,
            )
            .await?;
            print_json(&result)?;
        }
        Commands::DefaultRules { vehicle_id } => {
            print_json(&default_rules(vehicle_id))?;
        }
    }

    Ok(())
}

/// Uses the forced profile when one is named, otherwise detects it.
fn resolve_profile(file: &Path, source: Option<&str>) -> &'static SourceProfile {
    match source {
        Some(id) => profile_or_generic(id),
        None => detect_source_file(file),
    }
}
