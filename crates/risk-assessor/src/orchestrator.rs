//! Cross-product assessment sweep
//!
//! Setup happens once before the loop: regions register (fail-fast on a
//! bad definition), every requested identifier resolves to both forms,
//! and the trade table is filtered and indexed for the requested periods
//! and commodities. The sweep itself is pure iteration; a combination
//! that cannot be computed becomes a zero-valued placeholder record so
//! the output always carries one record per requested combination.

use crate::{record_id, AssessmentRequest, ExporterRecord, Result, ResultRecord};
use resource_data::DataContext;
use risk_engine::{
    compose_risk, direct_flow, exporter_flows, regional_flow,
    resolver::{resolve_country, resolve_resource, Form},
    HhiCache, Scope, TradeFlow, TradeIndex,
};
use tracing::{debug, info};

/// Country input resolved once before the sweep.
#[derive(Debug, Clone)]
struct CountryScope {
    /// Display label: country name, or the region name itself.
    label: String,
    /// Coded form used in record ids: ISO code, or the region name.
    code: String,
    /// Member country names; a single entry for a plain country.
    members: Vec<String>,
    /// Member ISO codes, in `members` order, minus unresolvable members.
    member_isos: Vec<i64>,
}

#[derive(Debug, Clone)]
struct ResourceInfo {
    name: String,
    hs_code: u32,
}

fn resolve_resource_info(ctx: &DataContext, input: &str) -> Option<ResourceInfo> {
    let name = resolve_resource(ctx, input, Form::Name).ok()?;
    let hs_code = resolve_resource(ctx, input, Form::Code)
        .ok()?
        .parse::<u32>()
        .ok()?;
    Some(ResourceInfo { name, hs_code })
}

fn resolve_country_scope(ctx: &DataContext, input: &str) -> Option<CountryScope> {
    let label = resolve_country(ctx, input, Form::Name).ok()?;
    let code = resolve_country(ctx, input, Form::Code).ok()?;
    let members: Vec<String> = ctx
        .regions
        .members(&label)
        .map(|m| m.to_vec())
        .unwrap_or_else(|| vec![label.clone()]);
    let member_isos: Vec<i64> = members
        .iter()
        .filter_map(|m| member_iso(ctx, m))
        .collect();
    Some(CountryScope {
        label,
        code,
        members,
        member_isos,
    })
}

fn member_iso(ctx: &DataContext, member: &str) -> Option<i64> {
    if let Some(entry) = ctx.countries.by_name(member) {
        return Some(entry.iso);
    }
    let found = member
        .parse::<i64>()
        .ok()
        .filter(|iso| ctx.countries.by_iso(*iso).is_some());
    if found.is_none() {
        debug!(member, "region member did not resolve to an ISO code");
    }
    found
}

/// Run the standard sweep: one record per (resource, period, country).
///
/// Only setup failures (an invalid region definition) abort the run;
/// everything after the loop starts degrades per combination.
pub fn run_assessment(
    ctx: &mut DataContext,
    request: &AssessmentRequest,
) -> Result<Vec<ResultRecord>> {
    ctx.register_regions(&request.regions)?;
    let ctx: &DataContext = ctx;

    let resources: Vec<(String, Option<ResourceInfo>)> = request
        .resources
        .iter()
        .map(|input| (input.clone(), resolve_resource_info(ctx, input)))
        .collect();
    let countries: Vec<(String, Option<CountryScope>)> = request
        .countries
        .iter()
        .map(|input| (input.clone(), resolve_country_scope(ctx, input)))
        .collect();

    let hs_codes: Vec<u32> = resources
        .iter()
        .filter_map(|(_, r)| r.as_ref().map(|r| r.hs_code))
        .collect();
    let index = TradeIndex::build(ctx, &request.periods, &hs_codes);
    let mut cache = HhiCache::new();

    let total = resources.len() * request.periods.len() * countries.len();
    info!(combinations = total, "starting assessment sweep");

    let mut records = Vec::with_capacity(total);
    for (resource_input, resource) in &resources {
        for &year in &request.periods {
            for (country_input, country) in &countries {
                let (Some(resource), Some(country)) = (resource, country) else {
                    debug!(
                        resource = %resource_input,
                        country = %country_input,
                        year,
                        "unresolved identifiers, placeholder record"
                    );
                    records.push(placeholder(resource_input, country_input, year));
                    continue;
                };
                records.push(assess_one(ctx, &index, &mut cache, resource, country, year));
            }
        }
    }

    let stats = cache.stats();
    info!(
        records = records.len(),
        cache_hits = stats.hits,
        cache_misses = stats.misses,
        "assessment sweep complete"
    );
    Ok(records)
}

fn assess_one(
    ctx: &DataContext,
    index: &TradeIndex,
    cache: &mut HhiCache,
    resource: &ResourceInfo,
    country: &CountryScope,
    year: u16,
) -> ResultRecord {
    let scope = if country.members.len() > 1 {
        Scope::region(country.members.iter().cloned())
    } else {
        Scope::Country(country.members[0].clone())
    };
    let share = cache.get_or_compute(ctx, &resource.name, year, &scope);

    let flow = match country.member_isos.as_slice() {
        [] => {
            debug!(country = %country.label, "no resolvable members, zero flow");
            TradeFlow::zero(true)
        }
        [iso] => direct_flow(index, year, *iso, resource.hs_code),
        isos => regional_flow(index, year, isos, resource.hs_code),
    };

    let risk = compose_risk(
        flow.numerator,
        flow.total_trade,
        share.quantity,
        flow.price,
        share.hhi,
    );

    ResultRecord {
        id: record_id(&resource.hs_code.to_string(), &country.code, year),
        country: country.label.clone(),
        resource: resource.name.clone(),
        year,
        score: risk.score,
        characterization_factor: risk.characterization_factor,
        hhi: share.hhi,
        import_risk: risk.import_risk,
        price: flow.price,
    }
}

/// Zero-valued record for a combination whose identifiers never resolved.
/// Raw inputs stand in for the coded forms so the id stays deterministic.
fn placeholder(resource_input: &str, country_input: &str, year: u16) -> ResultRecord {
    ResultRecord {
        id: record_id(resource_input, country_input, year),
        country: country_input.to_string(),
        resource: resource_input.to_string(),
        year,
        score: 0.0,
        characterization_factor: 0.0,
        hhi: 0.0,
        import_risk: 0.0,
        price: 0.0,
    }
}

/// Run the multi-exporter sweep: one record per exporter of each
/// (resource, period, importer), plus the per-importer global row.
///
/// Combinations with an empty trade slice (or an unresolved or regional
/// importer) append nothing: an empty slice means nothing to report, not
/// a zero score.
pub fn run_exporter_assessment(
    ctx: &mut DataContext,
    request: &AssessmentRequest,
) -> Result<Vec<ExporterRecord>> {
    ctx.register_regions(&request.regions)?;
    let ctx: &DataContext = ctx;

    let resources: Vec<(String, Option<ResourceInfo>)> = request
        .resources
        .iter()
        .map(|input| (input.clone(), resolve_resource_info(ctx, input)))
        .collect();
    let countries: Vec<(String, Option<CountryScope>)> = request
        .countries
        .iter()
        .map(|input| (input.clone(), resolve_country_scope(ctx, input)))
        .collect();

    let hs_codes: Vec<u32> = resources
        .iter()
        .filter_map(|(_, r)| r.as_ref().map(|r| r.hs_code))
        .collect();
    let index = TradeIndex::build(ctx, &request.periods, &hs_codes);

    let mut records = Vec::new();
    for (resource_input, resource) in &resources {
        for &year in &request.periods {
            for (country_input, country) in &countries {
                let (Some(resource), Some(country)) = (resource, country) else {
                    debug!(
                        resource = %resource_input,
                        country = %country_input,
                        year,
                        "unresolved identifiers, skipped"
                    );
                    continue;
                };
                let &[importer] = country.member_isos.as_slice() else {
                    debug!(
                        country = %country.label,
                        "exporter breakdown needs a single importer, skipped"
                    );
                    continue;
                };

                for flow in exporter_flows(&index, year, importer, resource.hs_code) {
                    records.push(ExporterRecord {
                        id: format!(
                            "{}{}",
                            record_id(&resource.hs_code.to_string(), &country.code, year),
                            flow.exporter_code
                        ),
                        importer: country.label.clone(),
                        exporter: flow.exporter_name,
                        exporter_code: flow.exporter_code,
                        resource: resource.name.clone(),
                        year,
                        numerator: flow.numerator,
                        total_trade: flow.total_trade,
                        country_price: flow.country_price,
                        global_price: flow.global_price,
                    });
                }
            }
        }
    }

    info!(records = records.len(), "exporter sweep complete");
    Ok(records)
}
