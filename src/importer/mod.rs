//! Bulk CSV import of vehicle telemetry.
//!
//! A file is matched against the registered vendor dialects, each row is
//! cleaned and range-checked, the surviving points are split into trips on
//! inactivity gaps, and every trip is persisted with its computed stats.

pub mod analyze;
pub mod buffer;
pub mod detect;
pub mod error;
pub mod orchestrator;
pub mod profiles;
pub mod segment;
pub mod source;
pub mod validate;

pub use analyze::{CsvAnalysis, analyze_csv};
pub use buffer::LiveTripBuffer;
pub use detect::{detect_source, detect_source_file};
pub use error::{ImportError, ValidationError};
pub use orchestrator::{
    ImportOptions, ImportReport, ImportRequest, TripSummary, import_csv, persist_trip,
};
pub use profiles::{SourceProfile, TextEncoding};
pub use segment::{DEFAULT_GAP_MINUTES, segment_trips};
