//! Batch Supply-Risk Assessor
//!
//! Sweeps the cross-product of requested periods, countries (or regions)
//! and resources, producing one result record per combination keyed by a
//! deterministic id, and persists the result set to a keyed record store
//! plus flat CSV/JSON exports.
//!
//! The sweep is restartable: rerunning the same request against unchanged
//! reference data reproduces identical records, and the store upserts by
//! id rather than appending.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

pub mod orchestrator;
pub mod sink;

pub use orchestrator::{run_assessment, run_exporter_assessment};
pub use sink::RecordStore;

#[derive(Error, Debug)]
pub enum AssessError {
    #[error(transparent)]
    Data(#[from] resource_data::DataError),
    #[error(transparent)]
    Engine(#[from] risk_engine::EngineError),
    #[error("record store error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AssessError>;

/// One batch request. Countries and resources accept display names or
/// codes; `regions` members must be valid country names or ISO codes and
/// are validated before the sweep starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssessmentRequest {
    pub periods: Vec<u16>,
    pub countries: Vec<String>,
    pub resources: Vec<String>,
    #[serde(default)]
    pub regions: HashMap<String, Vec<String>>,
}

/// One result row of the standard sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// Deterministic id: HS code, ISO code (or region name) and year.
    pub id: String,
    pub country: String,
    pub resource: String,
    pub year: u16,
    pub score: f64,
    pub characterization_factor: f64,
    pub hhi: f64,
    pub import_risk: f64,
    pub price: f64,
}

/// One exporter-resolved row of the multi-exporter sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExporterRecord {
    /// Deterministic id: HS code, importer ISO, year and exporter code.
    pub id: String,
    pub importer: String,
    pub exporter: String,
    pub exporter_code: i64,
    pub resource: String,
    pub year: u16,
    pub numerator: f64,
    pub total_trade: f64,
    /// Importer-wide average price for the (year, commodity) pair.
    pub country_price: f64,
    /// Worldwide average price across all reporters for the pair.
    pub global_price: f64,
}

/// Deterministic record id: the coded forms concatenated.
pub fn record_id(hs: &str, iso: &str, year: u16) -> String {
    format!("{hs}{iso}{year}")
}
