//! Supply-Risk Calculation Core
//!
//! Deterministic, stateless-per-call pipeline over the loaded reference
//! data: identifier resolution, production concentration, weighted import
//! flows and the final risk composition.
//!
//! # Risk Model
//!
//! ```text
//! HHI   = Σ qᵢ² / (Σ qᵢ)²                       production concentration
//! WTA   = Σ(qty·wgi) / (TotalTrade + ProdQty)   weighted trade average
//! Score = HHI × WTA                             supply-risk indicator
//! CF    = Score × Price                         characterization factor
//! ```
//!
//! Aggregators never abort a batch: data gaps and internal failures
//! degrade the affected value to zero with an explicit `degraded` flag so
//! the outcome stays observable instead of hiding behind suppressed
//! errors.

use thiserror::Error;

pub mod cache;
pub mod compose;
pub mod hhi;
pub mod resolver;
pub mod trade;

pub use cache::{CacheStats, HhiCache};
pub use compose::{compose_risk, RiskScore};
pub use hhi::{compute_hhi, ProductionShare, Scope};
pub use resolver::{resolve_country, resolve_resource, Form};
pub use trade::{direct_flow, exporter_flows, regional_flow, ExporterFlow, TradeFlow, TradeIndex};

#[derive(Error, Debug)]
pub enum EngineError {
    /// Identifier matches neither a code nor a name. Malformed input;
    /// callers must not retry.
    #[error("unresolvable identifier: {0}")]
    Lookup(String),
    /// Requested slice of the reference data does not exist. Data
    /// absence, not a hard failure; aggregators degrade on it.
    #[error("no data: {0}")]
    DataGap(String),
    #[error(transparent)]
    Data(#[from] resource_data::DataError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
