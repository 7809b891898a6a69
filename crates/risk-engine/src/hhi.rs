//! Production concentration
//!
//! Herfindahl-Hirschman index over all producers of a resource in a year,
//! plus the production quantity of the requested country or region,
//! normalized to metric tons so it is additive with trade quantities.
//!
//! Production gaps must never abort a batch run: a missing year column,
//! an absent producer row or a malformed table all degrade the result to
//! zero with the `degraded` flag set and a debug log.

use crate::{EngineError, Result};
use resource_data::{DataContext, Unit};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Requested production scope: one country or a set of member countries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scope {
    Country(String),
    Region(Vec<String>),
}

impl Scope {
    /// Build a region scope with members canonicalized (sorted, deduped)
    /// so two spellings of the same member set compare and hash equal.
    pub fn region(members: impl IntoIterator<Item = String>) -> Self {
        let mut members: Vec<String> = members.into_iter().collect();
        members.sort();
        members.dedup();
        Scope::Region(members)
    }

    /// Canonical copy of this scope; region members sorted and deduped.
    pub fn canonical(&self) -> Self {
        match self {
            Scope::Country(c) => Scope::Country(c.clone()),
            Scope::Region(members) => Scope::region(members.iter().cloned()),
        }
    }

    fn matches(&self, country: &str) -> bool {
        match self {
            Scope::Country(c) => c == country,
            Scope::Region(members) => members.iter().any(|m| m == country),
        }
    }
}

/// Production quantity and concentration for one (resource, year, scope).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionShare {
    /// Scoped production in metric tons.
    pub quantity: f64,
    /// Concentration index in [0, 1]. Unit-invariant.
    pub hhi: f64,
    /// True when a data gap or internal failure forced the zero default.
    pub degraded: bool,
}

impl ProductionShare {
    pub const fn zero(degraded: bool) -> Self {
        Self {
            quantity: 0.0,
            hhi: 0.0,
            degraded,
        }
    }
}

/// Compute concentration and scoped production for a resource and year.
///
/// `resource` is the canonical display name. Never fails: every internal
/// error path degrades to [`ProductionShare::zero`].
pub fn compute_hhi(ctx: &DataContext, resource: &str, year: u16, scope: &Scope) -> ProductionShare {
    match try_compute(ctx, resource, year, scope) {
        Ok(share) => share,
        Err(reason) => {
            debug!(resource, year, ?scope, %reason, "production lookup degraded to zero");
            ProductionShare::zero(true)
        }
    }
}

fn try_compute(
    ctx: &DataContext,
    resource: &str,
    year: u16,
    scope: &Scope,
) -> Result<ProductionShare> {
    let entry = ctx
        .commodities
        .by_name(resource)
        .ok_or_else(|| EngineError::Lookup(format!("raw material '{resource}'")))?;
    let table = ctx
        .production_for(entry)
        .ok_or_else(|| EngineError::DataGap(format!("no production table for {resource}")))?;
    if !table.has_year(year) {
        return Err(EngineError::DataGap(format!(
            "{resource} has no {year} column"
        )));
    }

    let total: f64 = table.producers().map(|r| r.quantity(year)).sum();
    let hhi = if total > 0.0 {
        table
            .producers()
            .map(|r| {
                let q = r.quantity(year);
                q * q
            })
            .sum::<f64>()
            / (total * total)
    } else {
        0.0
    };

    let scoped: f64 = table
        .producers()
        .filter(|r| scope.matches(&r.country))
        .map(|r| r.quantity(year))
        .sum();
    let quantity = Unit::parse(&table.unit)?.to_metric_tons(scoped);

    Ok(ProductionShare {
        quantity,
        hhi,
        degraded: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_data::{
        CommodityEntry, CommodityMap, ProducerRow, ProductionTable, WITHDRAWN,
    };
    use std::collections::{BTreeSet, HashMap};

    fn producer(country: &str, code: &str, quantities: &[(u16, f64)]) -> ProducerRow {
        ProducerRow {
            country: country.to_string(),
            country_code: code.to_string(),
            quantities: quantities.iter().copied().collect::<HashMap<_, _>>(),
        }
    }

    fn make_context(unit: &str, rows: Vec<ProducerRow>) -> DataContext {
        let years: BTreeSet<u16> = rows
            .iter()
            .flat_map(|r| r.quantities.keys().copied())
            .collect();
        let table = ProductionTable {
            name: "Cobalt".to_string(),
            unit: unit.to_string(),
            years,
            rows,
        };
        DataContext {
            production: HashMap::from([("Cobalt".to_string(), table)]),
            commodities: CommodityMap::new(vec![CommodityEntry {
                name: "Cobalt".to_string(),
                hs_code: 810520,
                table: "Cobalt".to_string(),
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_two_producer_shares() {
        let ctx = make_context(
            "metr. t",
            vec![
                producer("Congo", "180", &[(2020, 70.0)]),
                producer("Australia", "36", &[(2020, 30.0)]),
            ],
        );
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("Congo".to_string()));
        assert!(!share.degraded);
        assert!((share.hhi - 0.58).abs() < 1e-9);
        assert!((share.quantity - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_producer_is_one() {
        let ctx = make_context("metr. t", vec![producer("Congo", "180", &[(2020, 42.0)])]);
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("Congo".to_string()));
        assert!((share.hhi - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_producers_approach_reciprocal() {
        let n = 8;
        let rows = (0..n)
            .map(|i| producer(&format!("P{i}"), &i.to_string(), &[(2020, 10.0)]))
            .collect();
        let ctx = make_context("metr. t", rows);
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("P0".to_string()));
        assert!((share.hhi - 1.0 / n as f64).abs() < 1e-12);
        assert!(share.hhi >= 0.0 && share.hhi <= 1.0);
    }

    #[test]
    fn test_missing_year_degrades() {
        let ctx = make_context("metr. t", vec![producer("Congo", "180", &[(2020, 70.0)])]);
        let share = compute_hhi(&ctx, "Cobalt", 1999, &Scope::Country("Congo".to_string()));
        assert_eq!(share, ProductionShare::zero(true));
    }

    #[test]
    fn test_withdrawn_producer_excluded() {
        let ctx = make_context(
            "metr. t",
            vec![
                producer("Congo", "180", &[(2020, 70.0)]),
                producer("Formerly Reported", WITHDRAWN, &[(2020, 70.0)]),
            ],
        );
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("Congo".to_string()));
        // The withdrawn row neither dilutes concentration nor adds quantity.
        assert!((share.hhi - 1.0).abs() < 1e-12);
        assert!((share.quantity - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_region_scope_sums_members() {
        let ctx = make_context(
            "metr. t",
            vec![
                producer("France", "251", &[(2020, 20.0)]),
                producer("Germany", "276", &[(2020, 30.0)]),
                producer("Chile", "152", &[(2020, 50.0)]),
            ],
        );
        let scope = Scope::region(["Germany".to_string(), "France".to_string()]);
        let share = compute_hhi(&ctx, "Cobalt", 2020, &scope);
        assert!((share.quantity - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_absent_country_has_zero_quantity() {
        let ctx = make_context("metr. t", vec![producer("Congo", "180", &[(2020, 70.0)])]);
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("Chile".to_string()));
        assert!(!share.degraded);
        assert_eq!(share.quantity, 0.0);
        assert!(share.hhi > 0.0);
    }

    #[test]
    fn test_kilogram_normalization() {
        let ctx = make_context("kg", vec![producer("Congo", "180", &[(2020, 5000.0)])]);
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("Congo".to_string()));
        assert!((share.quantity - 5.0).abs() < 1e-12);
        // HHI is unit-invariant.
        assert!((share.hhi - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_gas_volume_normalization() {
        let ctx = make_context("Mio m3", vec![producer("Norway", "579", &[(2020, 10.0)])]);
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("Norway".to_string()));
        assert!((share.quantity - 0.008).abs() < 1e-12);
    }

    #[test]
    fn test_unrecognized_unit_degrades() {
        let ctx = make_context("barrels", vec![producer("Congo", "180", &[(2020, 70.0)])]);
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("Congo".to_string()));
        assert_eq!(share, ProductionShare::zero(true));
    }

    #[test]
    fn test_zero_total_production() {
        let ctx = make_context("metr. t", vec![producer("Congo", "180", &[(2020, 0.0)])]);
        let share = compute_hhi(&ctx, "Cobalt", 2020, &Scope::Country("Congo".to_string()));
        assert_eq!(share.hhi, 0.0);
        assert_eq!(share.quantity, 0.0);
        assert!(!share.degraded);
    }

    #[test]
    fn test_scope_canonicalization() {
        let a = Scope::region(["B".to_string(), "A".to_string(), "A".to_string()]);
        let b = Scope::region(["A".to_string(), "B".to_string()]);
        assert_eq!(a, b);
    }
}
