//! Identifier conversion between coded and display-name forms
//!
//! Resources convert between HS commodity code and display name, countries
//! between ISO numeric code and display name. Inputs may arrive in either
//! form; numeric detection happens before conversion. Region names active
//! in the registry pass through unchanged for either target form since
//! they have no coded equivalent.

use crate::{EngineError, Result};
use resource_data::DataContext;

/// Target form of a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    /// Coded form: HS commodity code or ISO numeric country code.
    Code,
    /// Canonical display name.
    Name,
}

/// Convert a resource identifier to the requested form.
///
/// Pure lookup over the commodity map; fails with [`EngineError::Lookup`]
/// for inputs matching neither a name nor a code.
pub fn resolve_resource(ctx: &DataContext, input: &str, form: Form) -> Result<String> {
    let input = input.trim();
    let entry = match input.parse::<u32>() {
        Ok(code) => ctx.commodities.by_code(code),
        Err(_) => ctx.commodities.by_name(input),
    };
    let entry =
        entry.ok_or_else(|| EngineError::Lookup(format!("raw material '{input}'")))?;

    Ok(match form {
        Form::Code => entry.hs_code.to_string(),
        Form::Name => entry.name.clone(),
    })
}

/// Convert a country identifier to the requested form.
///
/// Registered region names pass through unchanged when a regional run is
/// active; everything else must resolve via the country map.
pub fn resolve_country(ctx: &DataContext, input: &str, form: Form) -> Result<String> {
    let input = input.trim();
    let entry = match input.parse::<i64>() {
        Ok(iso) => ctx.countries.by_iso(iso),
        Err(_) => ctx.countries.by_name(input),
    };
    // Country identifiers win over region names; only names the country
    // map cannot place fall through to the registry.
    let entry = match entry {
        Some(entry) => entry,
        None if ctx.regions.passes_through(input) => return Ok(input.to_string()),
        None => return Err(EngineError::Lookup(format!("country '{input}'"))),
    };

    Ok(match form {
        Form::Code => entry.iso.to_string(),
        Form::Name => entry.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_data::{CommodityEntry, CommodityMap, CountryEntry, CountryMap};

    fn make_context() -> DataContext {
        DataContext {
            commodities: CommodityMap::new(vec![CommodityEntry {
                name: "Cobalt".to_string(),
                hs_code: 810520,
                table: "Cobalt".to_string(),
            }]),
            countries: CountryMap::new(vec![CountryEntry {
                name: "Germany".to_string(),
                iso: 276,
            }]),
            ..Default::default()
        }
    }

    #[test]
    fn test_resource_both_directions() {
        let ctx = make_context();
        assert_eq!(resolve_resource(&ctx, "Cobalt", Form::Code).unwrap(), "810520");
        assert_eq!(resolve_resource(&ctx, "810520", Form::Name).unwrap(), "Cobalt");
        // Already in the target form.
        assert_eq!(resolve_resource(&ctx, "Cobalt", Form::Name).unwrap(), "Cobalt");
        assert_eq!(resolve_resource(&ctx, "810520", Form::Code).unwrap(), "810520");
    }

    #[test]
    fn test_country_both_directions() {
        let ctx = make_context();
        assert_eq!(resolve_country(&ctx, "Germany", Form::Code).unwrap(), "276");
        assert_eq!(resolve_country(&ctx, "276", Form::Name).unwrap(), "Germany");
    }

    #[test]
    fn test_unknown_identifier_fails() {
        let ctx = make_context();
        assert!(matches!(
            resolve_resource(&ctx, "Unobtainium", Form::Code),
            Err(EngineError::Lookup(_))
        ));
        assert!(matches!(
            resolve_country(&ctx, "999", Form::Name),
            Err(EngineError::Lookup(_))
        ));
    }

    #[test]
    fn test_region_passthrough() {
        let mut ctx = make_context();
        let countries = ctx.countries.clone();
        ctx.regions
            .register("Solo", &["Germany".to_string()], &countries)
            .unwrap();
        assert_eq!(resolve_country(&ctx, "Solo", Form::Code).unwrap(), "Solo");
        assert_eq!(resolve_country(&ctx, "Solo", Form::Name).unwrap(), "Solo");
    }
}
