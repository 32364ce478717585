pub mod alerts;
pub mod config;
pub mod importer;
pub mod model;
pub mod output;
pub mod replay;
pub mod repository;
pub mod stats;
