//! Import-risk aggregation over bilateral trade flows
//!
//! Three aggregation modes over the same pre-filtered slice of the trade
//! table:
//!
//! - direct: one importing country, all partners folded together
//! - regional: member flows accumulated before one value-weighted price
//! - exporter breakdown: one row per partner plus a synthetic global row
//!
//! Quantities are metric tons and therefore additive with normalized
//! production quantities. Missing indicator values weight at the neutral
//! 0.5; missing quantities and values count as zero. An empty slice is a
//! data gap, never an error.

use resource_data::{DataContext, TradeRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Partner code of the synthetic all-exporters row.
pub const GLOBAL_CODE: i64 = 0;

/// Pre-filtered, indexed view of the trade table for one run.
///
/// Built once per batch over the requested periods and commodities so the
/// sweep never rescans the full table. Slices are keyed by
/// (period, reporter, commodity); a second index keyed by
/// (period, commodity) backs the worldwide price queries.
#[derive(Debug, Default)]
pub struct TradeIndex<'a> {
    by_reporter: HashMap<(u16, i64, u32), Vec<&'a TradeRecord>>,
    by_period_cmd: HashMap<(u16, u32), Vec<&'a TradeRecord>>,
}

impl<'a> TradeIndex<'a> {
    pub fn build(ctx: &'a DataContext, periods: &[u16], commodities: &[u32]) -> Self {
        let mut by_reporter: HashMap<(u16, i64, u32), Vec<&TradeRecord>> = HashMap::new();
        let mut by_period_cmd: HashMap<(u16, u32), Vec<&TradeRecord>> = HashMap::new();

        for rec in &ctx.trade {
            if !periods.contains(&rec.period) || !commodities.contains(&rec.cmd_code) {
                continue;
            }
            by_reporter
                .entry((rec.period, rec.reporter_code, rec.cmd_code))
                .or_default()
                .push(rec);
            by_period_cmd
                .entry((rec.period, rec.cmd_code))
                .or_default()
                .push(rec);
        }

        let rows: usize = by_reporter.values().map(Vec::len).sum();
        if rows == 0 {
            warn!("filtered trade slice is empty, verify the requested periods and commodities");
        } else {
            debug!(rows, "trade index built");
        }

        Self {
            by_reporter,
            by_period_cmd,
        }
    }

    pub fn reporter_slice(&self, period: u16, reporter: i64, cmd: u32) -> &[&'a TradeRecord] {
        self.by_reporter
            .get(&(period, reporter, cmd))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn period_slice(&self, period: u16, cmd: u32) -> &[&'a TradeRecord] {
        self.by_period_cmd
            .get(&(period, cmd))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Weighted import aggregate for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeFlow {
    /// Σ qty·wgi over the scope's imports.
    pub numerator: f64,
    /// Σ qty in metric tons.
    pub total_trade: f64,
    /// Value-weighted average price, Σ value / Σ qty; zero without volume.
    pub price: f64,
    /// True when no trade rows matched the scope at all.
    pub degraded: bool,
}

impl TradeFlow {
    pub const fn zero(degraded: bool) -> Self {
        Self {
            numerator: 0.0,
            total_trade: 0.0,
            price: 0.0,
            degraded,
        }
    }
}

/// Running sums over a set of trade rows.
#[derive(Debug, Clone, Copy, Default)]
struct Sums {
    qty: f64,
    value: f64,
    numerator: f64,
}

impl Sums {
    fn add(&mut self, rec: &TradeRecord) {
        let q = rec.qty_or_zero();
        self.qty += q;
        self.value += rec.value_or_zero();
        self.numerator += q * rec.wgi_or_neutral();
    }

    fn price(&self) -> f64 {
        if self.qty > 0.0 {
            self.value / self.qty
        } else {
            0.0
        }
    }

    fn into_flow(self, degraded: bool) -> TradeFlow {
        TradeFlow {
            numerator: self.numerator,
            total_trade: self.qty,
            price: self.price(),
            degraded,
        }
    }
}

/// Import flow for a single reporting country.
pub fn direct_flow(index: &TradeIndex, year: u16, reporter: i64, cmd: u32) -> TradeFlow {
    let slice = index.reporter_slice(year, reporter, cmd);
    if slice.is_empty() {
        debug!(year, reporter, cmd, "no trade rows for reporter");
        return TradeFlow::zero(true);
    }

    let mut sums = Sums::default();
    for rec in slice {
        sums.add(rec);
    }
    sums.into_flow(false)
}

/// Import flow for a region of member countries.
///
/// Member sums accumulate before the single price is taken, so the region
/// price is Σ value / Σ qty across all members, not a mean of member
/// prices. A member with no rows contributes nothing and is skipped.
pub fn regional_flow(index: &TradeIndex, year: u16, members: &[i64], cmd: u32) -> TradeFlow {
    let mut sums = Sums::default();
    let mut matched = false;

    for &member in members {
        let slice = index.reporter_slice(year, member, cmd);
        if slice.is_empty() {
            debug!(year, member, cmd, "no trade rows for region member, skipped");
            continue;
        }
        matched = true;
        for rec in slice {
            sums.add(rec);
        }
    }

    sums.into_flow(!matched)
}

/// One exporter-resolved row of an importer's flow breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExporterFlow {
    pub exporter_code: i64,
    pub exporter_name: String,
    pub numerator: f64,
    pub total_trade: f64,
    /// Importer-wide average price for the (year, commodity) pair; shared
    /// by every row of the breakdown.
    pub country_price: f64,
    /// Worldwide average price across all reporters for the pair; shared
    /// by every row of the breakdown.
    pub global_price: f64,
}

/// Partition one importer's trade rows by exporting partner.
///
/// Returns one row per partner plus a synthetic row (code
/// [`GLOBAL_CODE`]) summing all partners, ordered by exporter code with
/// the global row last. The two reference prices are computed once for
/// the (year, commodity) pair, never per exporter. An empty importer
/// slice yields an empty vec: nothing to report rather than a zero score.
pub fn exporter_flows(index: &TradeIndex, year: u16, reporter: i64, cmd: u32) -> Vec<ExporterFlow> {
    let slice = index.reporter_slice(year, reporter, cmd);
    if slice.is_empty() {
        debug!(year, reporter, cmd, "no trade rows for reporter, nothing to report");
        return Vec::new();
    }

    let mut country_sums = Sums::default();
    let mut by_partner: HashMap<i64, (String, Sums)> = HashMap::new();
    for rec in slice {
        country_sums.add(rec);
        let (_, sums) = by_partner
            .entry(rec.partner_code)
            .or_insert_with(|| (rec.partner_name.clone(), Sums::default()));
        sums.add(rec);
    }

    let country_price = country_sums.price();
    let mut world_sums = Sums::default();
    for rec in index.period_slice(year, cmd) {
        world_sums.add(rec);
    }
    let global_price = world_sums.price();

    let mut flows: Vec<ExporterFlow> = by_partner
        .into_iter()
        .map(|(code, (name, sums))| ExporterFlow {
            exporter_code: code,
            exporter_name: name,
            numerator: sums.numerator,
            total_trade: sums.qty,
            country_price,
            global_price,
        })
        .collect();
    flows.sort_by_key(|f| f.exporter_code);

    flows.push(ExporterFlow {
        exporter_code: GLOBAL_CODE,
        exporter_name: "Global".to_string(),
        numerator: country_sums.numerator,
        total_trade: country_sums.qty,
        country_price,
        global_price,
    });

    flows
}
