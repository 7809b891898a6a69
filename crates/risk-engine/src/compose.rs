//! Risk composition
//!
//! Closed-form combination of production concentration and weighted
//! imports into the final indicator:
//!
//! ```text
//! WTA   = Numerator / (TotalTrade + ProdQty)
//! Score = HHI × WTA
//! CF    = Score × Price        (only while Price > 0)
//! ```
//!
//! The price term is deliberately left un-normalized; the formula is
//! preserved exactly as the method defines it.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Final risk indicator for one (resource, scope, year) combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub score: f64,
    pub characterization_factor: f64,
    /// Weighted trade average, the import-risk ratio.
    pub import_risk: f64,
    /// True when the inputs admitted no meaningful ratio.
    pub degraded: bool,
}

impl RiskScore {
    pub const fn zero(degraded: bool) -> Self {
        Self {
            score: 0.0,
            characterization_factor: 0.0,
            import_risk: 0.0,
            degraded,
        }
    }
}

/// Compose the final risk values. Never fails: a non-positive denominator
/// or non-finite arithmetic degrades to the all-zero outcome.
pub fn compose_risk(
    numerator: f64,
    total_trade: f64,
    production_qty: f64,
    price: f64,
    hhi: f64,
) -> RiskScore {
    let denominator = total_trade + production_qty;
    // Also catches a NaN denominator.
    if !(denominator > 0.0) {
        debug!(total_trade, production_qty, "no positive trade base, zero risk");
        return RiskScore::zero(true);
    }

    let wta = numerator / denominator;
    let hhi = if hhi.is_finite() { hhi } else { 0.0 };
    let score = hhi * wta;
    let cf = if price > 0.0 { score * price } else { 0.0 };

    if !wta.is_finite() || !score.is_finite() || !cf.is_finite() {
        debug!(numerator, price, hhi, "non-finite risk arithmetic, zero risk");
        return RiskScore::zero(true);
    }

    RiskScore {
        score,
        characterization_factor: cf,
        import_risk: wta,
        degraded: false,
    }
}
