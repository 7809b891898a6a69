//! Region registry
//!
//! Named, caller-extendable sets of countries aggregated as one reporting
//! unit. Members are validated against the country map when a region is
//! registered, so an unresolvable member rejects the region before a
//! sweep starts rather than mid-batch.

use crate::{CountryMap, DataError, Result};
use std::collections::HashMap;
use tracing::debug;

/// Historical EU membership as the reference data spells it, the one
/// preset region shipped with the datasets.
pub const EU_MEMBERS: &[&str] = &[
    "Austria",
    "Belgium",
    "Belgium-Luxembourg",
    "Bulgaria",
    "Croatia",
    "Czechia",
    "Czechoslovakia",
    "Denmark",
    "Estonia",
    "Finland",
    "France",
    "Fmr Dem. Rep. of Germany",
    "Fmr Fed. Rep. of Germany",
    "Germany",
    "Greece",
    "Hungary",
    "Ireland",
    "Italy",
    "Latvia",
    "Lithuania",
    "Luxembourg",
    "Malta",
    "Netherlands",
    "Poland",
    "Portugal",
    "Romania",
    "Slovakia",
    "Slovenia",
    "Spain",
    "Sweden",
];

/// Registry of region name to member country names.
#[derive(Debug, Clone, Default)]
pub struct RegionRegistry {
    regions: HashMap<String, Vec<String>>,
    /// Set once any caller-defined region is registered; aggregation mode
    /// switches on this.
    regional: bool,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the EU preset. Presets do not switch the
    /// run into regional mode; only caller-defined regions do.
    pub fn with_presets() -> Self {
        let mut registry = Self::new();
        registry.regions.insert(
            "EU".to_string(),
            EU_MEMBERS.iter().map(|m| m.to_string()).collect(),
        );
        registry
    }

    /// Register a caller-defined region. Every member must resolve as a
    /// country name or ISO code; otherwise the whole region is rejected.
    pub fn register(
        &mut self,
        name: &str,
        members: &[String],
        countries: &CountryMap,
    ) -> Result<()> {
        let missing: Vec<String> = members
            .iter()
            .filter(|m| !countries.contains(m))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(DataError::InvalidRegion {
                name: name.to_string(),
                members: missing,
            });
        }

        debug!(region = name, members = members.len(), "region registered");
        self.regions.insert(name.to_string(), members.to_vec());
        self.regional = true;
        Ok(())
    }

    /// Make every plain country addressable as a singleton region so the
    /// sweep can treat every scope the same way.
    pub fn populate_countries(&mut self, countries: &CountryMap) {
        for entry in countries.entries() {
            self.regions
                .entry(entry.name.clone())
                .or_insert_with(|| vec![entry.name.clone()]);
        }
    }

    pub fn members(&self, name: &str) -> Option<&[String]> {
        self.regions.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.regions.contains_key(name)
    }

    /// True when any caller-defined region is active for this run.
    pub fn is_regional(&self) -> bool {
        self.regional
    }

    /// True for names that pass through identifier resolution unchanged:
    /// registered regions during a regional run.
    pub fn passes_through(&self, name: &str) -> bool {
        self.regional && self.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CountryEntry;

    fn country_map() -> CountryMap {
        CountryMap::new(vec![
            CountryEntry {
                name: "France".to_string(),
                iso: 251,
            },
            CountryEntry {
                name: "Germany".to_string(),
                iso: 276,
            },
        ])
    }

    #[test]
    fn test_register_valid_region() {
        let mut registry = RegionRegistry::new();
        registry
            .register(
                "Rhine",
                &["France".to_string(), "Germany".to_string()],
                &country_map(),
            )
            .unwrap();
        assert!(registry.is_regional());
        assert_eq!(registry.members("Rhine").unwrap().len(), 2);
    }

    #[test]
    fn test_register_rejects_unknown_member() {
        let mut registry = RegionRegistry::new();
        let err = registry
            .register(
                "Bad",
                &["France".to_string(), "Atlantis".to_string()],
                &country_map(),
            )
            .unwrap_err();
        match err {
            DataError::InvalidRegion { name, members } => {
                assert_eq!(name, "Bad");
                assert_eq!(members, vec!["Atlantis".to_string()]);
            }
            other => panic!("expected InvalidRegion, got {other:?}"),
        }
        assert!(!registry.is_regional());
        assert!(!registry.contains("Bad"));
    }

    #[test]
    fn test_iso_codes_accepted_as_members() {
        let mut registry = RegionRegistry::new();
        registry
            .register("Coded", &["251".to_string()], &country_map())
            .unwrap();
        assert!(registry.contains("Coded"));
    }

    #[test]
    fn test_presets_do_not_switch_mode() {
        let registry = RegionRegistry::with_presets();
        assert!(registry.contains("EU"));
        assert!(!registry.is_regional());
        assert!(!registry.passes_through("EU"));
    }

    #[test]
    fn test_populate_countries_keeps_regions() {
        let mut registry = RegionRegistry::new();
        registry
            .register(
                "Rhine",
                &["France".to_string(), "Germany".to_string()],
                &country_map(),
            )
            .unwrap();
        registry.populate_countries(&country_map());
        assert_eq!(registry.members("France").unwrap(), ["France"]);
        assert_eq!(registry.members("Rhine").unwrap().len(), 2);
    }
}
