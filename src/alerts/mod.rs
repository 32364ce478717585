//! Threshold alerting on telemetry points.
//!
//! [`AlertRuleEngine`] checks each point against the vehicle's active rules
//! and persists the alerts that fire. Repeats of the same (vehicle, rule)
//! firing are held back by [`AlertCache`] for a configurable timeout unless
//! the value moved significantly.

pub mod cache;
pub mod defaults;
pub mod engine;
pub mod summary;

pub use cache::{AlertCache, CacheEntry, DEFAULT_CACHE_TIMEOUT_SECS, Firing};
pub use defaults::{default_rules, install_default_rules};
pub use engine::{AlertRuleEngine, RaisedAlert, render_message};
pub use summary::AlertSummary;
