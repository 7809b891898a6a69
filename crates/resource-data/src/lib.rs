//! Reference Data Library
//!
//! Immutable reference datasets backing the supply-risk calculations:
//! global production figures by country and year, bilateral trade flows
//! weighted with the partner's political-stability indicator (WGI), and
//! the identifier maps linking display names to HS commodity codes and
//! ISO country codes.
//!
//! Everything here is loaded once at process start into indexed in-memory
//! tables and treated as read-only for the rest of the run. The only
//! pre-run mutation is region registration, which happens at the config
//! boundary before a sweep starts.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;

pub mod loader;
pub mod regions;

pub use loader::DataPaths;
pub use regions::RegionRegistry;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("missing required table: {0}")]
    MissingTable(String),
    #[error("unrecognized production unit: {0}")]
    UnrecognizedUnit(String),
    #[error("invalid region '{name}': unknown members {members:?}")]
    InvalidRegion { name: String, members: Vec<String> },
}

pub type Result<T> = std::result::Result<T, DataError>;

/// Country-code tag marking a withdrawn producer row in the source data.
pub const WITHDRAWN: &str = "DELETE";

/// Production quantity unit, scoped per resource table (never per row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    MetricTons,
    Kilograms,
    MillionCubicMeters,
}

impl Unit {
    /// Parse a source unit tag. Anything outside the recognized set is an
    /// error, never a silent passthrough.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.trim() {
            "metr. t" => Ok(Unit::MetricTons),
            "kg" => Ok(Unit::Kilograms),
            "Mio m3" => Ok(Unit::MillionCubicMeters),
            other => Err(DataError::UnrecognizedUnit(other.to_string())),
        }
    }

    /// Convert a quantity in this unit to metric tons, the unit trade
    /// quantities are expressed in.
    pub fn to_metric_tons(self, qty: f64) -> f64 {
        match self {
            Unit::MetricTons => qty,
            Unit::Kilograms => qty / 1000.0,
            // Gas volumes carry the source's fixed tonne-equivalence factor.
            Unit::MillionCubicMeters => qty * 0.0008,
        }
    }
}

/// One producer row of a resource's production table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerRow {
    pub country: String,
    /// ISO tag column from the source; withdrawn rows carry "DELETE" here.
    pub country_code: String,
    /// Year to reported quantity. A missing year means no figure reported.
    pub quantities: HashMap<u16, f64>,
}

impl ProducerRow {
    pub fn is_withdrawn(&self) -> bool {
        self.country_code == WITHDRAWN
    }

    /// Reported quantity for the year, zero when nothing was reported.
    pub fn quantity(&self, year: u16) -> f64 {
        self.quantities.get(&year).copied().unwrap_or(0.0)
    }
}

/// Per-resource partition of the production dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductionTable {
    pub name: String,
    /// Unit tag as read from the source. Parsed at computation time so an
    /// unrecognized tag degrades only the computation that touches it.
    pub unit: String,
    /// Year columns present in the source table.
    pub years: BTreeSet<u16>,
    pub rows: Vec<ProducerRow>,
}

impl ProductionTable {
    pub fn has_year(&self, year: u16) -> bool {
        self.years.contains(&year)
    }

    /// Producer rows with withdrawn entries filtered out.
    pub fn producers(&self) -> impl Iterator<Item = &ProducerRow> {
        self.rows.iter().filter(|r| !r.is_withdrawn())
    }
}

/// One bilateral trade flow row.
///
/// `qty` is in metric tons and `cifvalue` in thousand USD. Sentinel source
/// values ("NA", blanks, NULL) are held as `None` and defaulted at the
/// point of use, so the defaulting policy stays visible to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub period: u16,
    pub reporter_code: i64,
    pub reporter_name: String,
    pub partner_code: i64,
    pub partner_name: String,
    /// Six-digit HS commodity code.
    pub cmd_code: u32,
    pub qty: Option<f64>,
    pub cifvalue: Option<f64>,
    /// Partner's normalized political-stability indicator for the period.
    pub partner_wgi: Option<f64>,
}

impl TradeRecord {
    /// Neutral stability weight applied when the indicator is missing.
    pub const NEUTRAL_WGI: f64 = 0.5;

    pub fn qty_or_zero(&self) -> f64 {
        self.qty.unwrap_or(0.0)
    }

    pub fn value_or_zero(&self) -> f64 {
        self.cifvalue.unwrap_or(0.0)
    }

    pub fn wgi_or_neutral(&self) -> f64 {
        self.partner_wgi.unwrap_or(Self::NEUTRAL_WGI)
    }
}

/// Map row linking a resource name to its HS code and production table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommodityEntry {
    /// Display name, e.g. "Cobalt".
    pub name: String,
    /// Six-digit HS commodity code.
    pub hs_code: u32,
    /// Name of the production table holding this resource's figures.
    pub table: String,
}

/// Bidirectional resource identifier map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommodityMap {
    entries: Vec<CommodityEntry>,
}

impl CommodityMap {
    pub fn new(entries: Vec<CommodityEntry>) -> Self {
        Self { entries }
    }

    pub fn by_name(&self, name: &str) -> Option<&CommodityEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn by_code(&self, code: u32) -> Option<&CommodityEntry> {
        self.entries.iter().find(|e| e.hs_code == code)
    }

    pub fn entries(&self) -> &[CommodityEntry] {
        &self.entries
    }
}

/// Map row linking a country name to its ISO numeric code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountryEntry {
    pub name: String,
    pub iso: i64,
}

/// Bidirectional country identifier map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountryMap {
    entries: Vec<CountryEntry>,
}

impl CountryMap {
    pub fn new(entries: Vec<CountryEntry>) -> Self {
        Self { entries }
    }

    pub fn by_name(&self, name: &str) -> Option<&CountryEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn by_iso(&self, iso: i64) -> Option<&CountryEntry> {
        self.entries.iter().find(|e| e.iso == iso)
    }

    /// True when the identifier resolves as either a name or an ISO code,
    /// the acceptance rule for region members.
    pub fn contains(&self, id: &str) -> bool {
        if self.by_name(id).is_some() {
            return true;
        }
        id.parse::<i64>()
            .ok()
            .and_then(|iso| self.by_iso(iso))
            .is_some()
    }

    pub fn entries(&self) -> &[CountryEntry] {
        &self.entries
    }
}

/// Immutable reference data for one assessment run.
///
/// Constructed once by [`DataContext::initialize`] (or assembled directly
/// for tests), then passed by shared reference to every component. Region
/// registration is the only mutation and happens before the sweep starts.
#[derive(Debug, Clone, Default)]
pub struct DataContext {
    /// Production tables keyed by table name.
    pub production: HashMap<String, ProductionTable>,
    /// Flattened bilateral trade table.
    pub trade: Vec<TradeRecord>,
    pub commodities: CommodityMap,
    pub countries: CountryMap,
    pub regions: RegionRegistry,
}

impl DataContext {
    /// Load all reference databases from disk. Missing files or required
    /// tables are fatal; nothing is lazily reloaded later.
    pub fn initialize(paths: &DataPaths) -> Result<Self> {
        loader::load(paths)
    }

    pub fn production_for(&self, entry: &CommodityEntry) -> Option<&ProductionTable> {
        self.production.get(&entry.table)
    }

    /// Register caller-defined regions, then make every plain country
    /// addressable as a singleton region so scopes are uniform downstream.
    /// A region with an unresolvable member rejects the whole request.
    pub fn register_regions(&mut self, requested: &HashMap<String, Vec<String>>) -> Result<()> {
        for (name, members) in requested {
            self.regions.register(name, members, &self.countries)?;
        }
        self.regions.populate_countries(&self.countries);
        Ok(())
    }
}
