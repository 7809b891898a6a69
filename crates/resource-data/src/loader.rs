//! Reference database loading
//!
//! Reads the mining-production database (one table per resource plus the
//! identifier maps) and the flattened bilateral trade table from their
//! SQLite files. Loading happens exactly once per process; every sentinel
//! form the sources use ("NA", blanks, NULL) is coerced at this boundary.

use crate::{
    CommodityEntry, CommodityMap, CountryEntry, CountryMap, DataContext, DataError, ProducerRow,
    ProductionTable, RegionRegistry, Result, TradeRecord,
};
use rusqlite::{Connection, OpenFlags};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Source table holding the resource name to HS code mapping.
const COMMODITY_MAP_TABLE: &str = "HS Code Map";
/// Source table holding the country name to ISO code mapping.
const COUNTRY_MAP_TABLE: &str = "Country_ISO";
/// Source table holding the flattened bilateral trade rows.
const TRADE_TABLE: &str = "baci_trade";

/// Locations of the reference database files.
#[derive(Debug, Clone)]
pub struct DataPaths {
    pub production_db: PathBuf,
    pub trade_db: PathBuf,
}

/// Load the full reference context. Missing files or required tables are
/// fatal here; per-row oddities are coerced or skipped with a log.
pub fn load(paths: &DataPaths) -> Result<DataContext> {
    let production_conn = open_readonly(&paths.production_db)?;
    require_tables(
        &production_conn,
        &[COMMODITY_MAP_TABLE, COUNTRY_MAP_TABLE],
    )?;

    let commodities = load_commodity_map(&production_conn)?;
    let countries = load_country_map(&production_conn)?;
    let production = load_production_tables(&production_conn, &commodities)?;

    let trade_conn = open_readonly(&paths.trade_db)?;
    require_tables(&trade_conn, &[TRADE_TABLE])?;
    let trade = load_trade(&trade_conn)?;

    Ok(DataContext {
        production,
        trade,
        commodities,
        countries,
        regions: RegionRegistry::with_presets(),
    })
}

fn open_readonly(path: &Path) -> Result<Connection> {
    info!("Opening reference database {:?}", path);
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY,
    )?)
}

fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

fn require_tables(conn: &Connection, required: &[&str]) -> Result<()> {
    let present = table_names(conn)?;
    for table in required {
        if !present.iter().any(|t| t == table) {
            return Err(DataError::MissingTable(table.to_string()));
        }
    }
    Ok(())
}

fn load_commodity_map(conn: &Connection) -> Result<CommodityMap> {
    let mut stmt = conn.prepare(&format!(
        "SELECT \"ID\", \"HS Code\", \"Sheet_name\" FROM \"{COMMODITY_MAP_TABLE}\""
    ))?;
    let mut rows = stmt.query([])?;

    let mut entries = Vec::new();
    let mut skipped = 0;
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let hs_raw: rusqlite::types::Value = row.get(1)?;
        let table: String = row.get(2)?;

        match text_of(&hs_raw).and_then(|s| s.trim().parse::<u32>().ok()) {
            Some(hs_code) => entries.push(CommodityEntry {
                name,
                hs_code,
                table,
            }),
            None => {
                // Some resources ship without a tradeable HS code; they
                // cannot participate in a sweep and are dropped here.
                debug!(resource = %name, "no numeric HS code, entry skipped");
                skipped += 1;
            }
        }
    }

    info!(
        "Loaded {} commodity map entries ({} skipped)",
        entries.len(),
        skipped
    );
    Ok(CommodityMap::new(entries))
}

fn load_country_map(conn: &Connection) -> Result<CountryMap> {
    let mut stmt = conn.prepare(&format!(
        "SELECT \"Country\", \"ISO\" FROM \"{COUNTRY_MAP_TABLE}\""
    ))?;
    let mut rows = stmt.query([])?;

    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        let name: String = row.get(0)?;
        let iso_raw: rusqlite::types::Value = row.get(1)?;
        match opt_f64(&iso_raw) {
            Some(iso) => entries.push(CountryEntry {
                name,
                iso: iso as i64,
            }),
            None => debug!(country = %name, "non-numeric ISO code, entry skipped"),
        }
    }

    info!("Loaded {} country map entries", entries.len());
    Ok(CountryMap::new(entries))
}

fn load_production_tables(
    conn: &Connection,
    commodities: &CommodityMap,
) -> Result<HashMap<String, ProductionTable>> {
    let present = table_names(conn)?;
    let mut tables = HashMap::new();

    for entry in commodities.entries() {
        if tables.contains_key(&entry.table) {
            continue;
        }
        if !present.iter().any(|t| *t == entry.table) {
            debug!(table = %entry.table, "production table absent, resource will degrade");
            continue;
        }
        let table = load_production_table(conn, &entry.table)?;
        tables.insert(entry.table.clone(), table);
    }

    info!("Loaded {} production tables", tables.len());
    Ok(tables)
}

fn load_production_table(conn: &Connection, name: &str) -> Result<ProductionTable> {
    let mut stmt = conn.prepare(&format!("SELECT * FROM \"{name}\""))?;
    let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();

    let year_columns: Vec<(usize, u16)> = columns
        .iter()
        .enumerate()
        .filter_map(|(i, c)| c.parse::<u16>().ok().map(|y| (i, y)))
        .collect();
    let idx_country = columns.iter().position(|c| c == "Country");
    let idx_code = columns.iter().position(|c| c == "Country_Code");
    let idx_unit = columns.iter().position(|c| c == "unit");

    let mut unit = String::new();
    let mut rows_out = Vec::new();
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let country = match idx_country {
            Some(i) => row
                .get::<_, Option<String>>(i)?
                .unwrap_or_default(),
            None => String::new(),
        };
        let country_code = match idx_code {
            Some(i) => row
                .get::<_, rusqlite::types::Value>(i)
                .map(|v| text_of(&v).unwrap_or_default())?,
            None => String::new(),
        };
        // Unit is table-scoped; the first row's tag stands for the table.
        if unit.is_empty() {
            if let Some(i) = idx_unit {
                if let Some(tag) = row.get::<_, Option<String>>(i)? {
                    unit = tag;
                }
            }
        }

        let mut quantities = HashMap::new();
        for &(i, year) in &year_columns {
            let value: rusqlite::types::Value = row.get(i)?;
            if let Some(qty) = opt_f64(&value) {
                quantities.insert(year, qty);
            }
        }

        rows_out.push(ProducerRow {
            country,
            country_code,
            quantities,
        });
    }

    Ok(ProductionTable {
        name: name.to_string(),
        unit,
        years: year_columns.iter().map(|&(_, y)| y).collect::<BTreeSet<_>>(),
        rows: rows_out,
    })
}

fn load_trade(conn: &Connection) -> Result<Vec<TradeRecord>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT period, reporterCode, reporterDesc, partnerCode, partnerDesc, \
         cmdCode, qty, cifvalue, partnerWGI FROM \"{TRADE_TABLE}\""
    ))?;
    let mut rows = stmt.query([])?;

    let mut records = Vec::new();
    let mut skipped = 0;
    while let Some(row) = rows.next()? {
        let period: rusqlite::types::Value = row.get(0)?;
        let reporter_code: rusqlite::types::Value = row.get(1)?;
        let partner_code: rusqlite::types::Value = row.get(3)?;
        let cmd_code: rusqlite::types::Value = row.get(5)?;

        // A row without a usable key cannot be indexed at all.
        let (Some(period), Some(reporter_code), Some(partner_code), Some(cmd_code)) = (
            opt_f64(&period).map(|v| v as u16),
            opt_f64(&reporter_code).map(|v| v as i64),
            opt_f64(&partner_code).map(|v| v as i64),
            opt_f64(&cmd_code).map(|v| v as u32),
        ) else {
            skipped += 1;
            continue;
        };

        let qty: rusqlite::types::Value = row.get(6)?;
        let cifvalue: rusqlite::types::Value = row.get(7)?;
        let partner_wgi: rusqlite::types::Value = row.get(8)?;

        records.push(TradeRecord {
            period,
            reporter_code,
            reporter_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            partner_code,
            partner_name: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            cmd_code,
            qty: opt_f64(&qty),
            cifvalue: opt_f64(&cifvalue),
            partner_wgi: opt_f64(&partner_wgi),
        });
    }

    info!(
        "Loaded {} trade rows ({} skipped for unusable keys)",
        records.len(),
        skipped
    );
    Ok(records)
}

/// Coerce a source cell to a number, treating the sentinel forms the
/// upstream datasets use ("NA", blank, NULL) as absent.
fn opt_f64(value: &rusqlite::types::Value) -> Option<f64> {
    use rusqlite::types::Value;
    match value {
        Value::Null => None,
        Value::Integer(i) => Some(*i as f64),
        Value::Real(f) => Some(*f),
        Value::Text(s) => {
            let s = s.trim();
            if s.is_empty() || s == "NA" {
                None
            } else {
                s.parse().ok()
            }
        }
        Value::Blob(_) => None,
    }
}

fn text_of(value: &rusqlite::types::Value) -> Option<String> {
    use rusqlite::types::Value;
    match value {
        Value::Text(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_databases(dir: &TempDir) -> DataPaths {
        let production_db = dir.path().join("production.db");
        let trade_db = dir.path().join("trade.db");

        let conn = Connection::open(&production_db).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE "HS Code Map" (ID TEXT, "HS Code" TEXT, Sheet_name TEXT);
            INSERT INTO "HS Code Map" VALUES
                ('Cobalt', '810520', 'Cobalt'),
                ('Mystery', 'Not Available', 'Mystery');
            CREATE TABLE "Country_ISO" (Country TEXT, ISO INTEGER);
            INSERT INTO "Country_ISO" VALUES ('Germany', 276), ('Congo', 180);
            CREATE TABLE "Cobalt" (Country TEXT, Country_Code TEXT, unit TEXT, "2020" REAL);
            INSERT INTO "Cobalt" VALUES
                ('Congo', '180', 'metr. t', 100.0),
                ('Formerly Reported', 'DELETE', 'metr. t', 5.0);
            "#,
        )
        .unwrap();
        drop(conn);

        let conn = Connection::open(&trade_db).unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE baci_trade (
                period TEXT, reporterCode TEXT, reporterDesc TEXT,
                partnerCode TEXT, partnerDesc TEXT, cmdCode TEXT,
                qty TEXT, cifvalue TEXT, partnerWGI TEXT
            );
            INSERT INTO baci_trade VALUES
                ('2020', '276', 'Germany', '180', 'Congo', '810520', '100', '1000', '0.2'),
                ('2020', '276', 'Germany', '156', 'China', '810520', 'NA', '', 'NA');
            "#,
        )
        .unwrap();
        drop(conn);

        DataPaths {
            production_db,
            trade_db,
        }
    }

    #[test]
    fn test_load_full_context() {
        let dir = TempDir::new().unwrap();
        let ctx = load(&seed_databases(&dir)).unwrap();

        // The entry without a numeric HS code is dropped.
        assert_eq!(ctx.commodities.entries().len(), 1);
        assert_eq!(ctx.commodities.by_name("Cobalt").unwrap().hs_code, 810520);
        assert_eq!(ctx.countries.by_iso(276).unwrap().name, "Germany");

        let table = ctx.production.get("Cobalt").unwrap();
        assert_eq!(table.unit, "metr. t");
        assert!(table.has_year(2020));
        assert_eq!(table.producers().count(), 1);

        assert_eq!(ctx.trade.len(), 2);
        let sentinel_row = &ctx.trade[1];
        assert_eq!(sentinel_row.qty, None);
        assert_eq!(sentinel_row.cifvalue, None);
        assert_eq!(sentinel_row.wgi_or_neutral(), 0.5);
    }

    #[test]
    fn test_missing_required_table_is_fatal() {
        let dir = TempDir::new().unwrap();
        let paths = seed_databases(&dir);

        let conn = Connection::open(&paths.trade_db).unwrap();
        conn.execute_batch("DROP TABLE baci_trade;").unwrap();
        drop(conn);

        match load(&paths) {
            Err(DataError::MissingTable(name)) => assert_eq!(name, TRADE_TABLE),
            other => panic!("expected MissingTable, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_database_file_is_fatal() {
        let dir = TempDir::new().unwrap();
        let paths = DataPaths {
            production_db: dir.path().join("absent.db"),
            trade_db: dir.path().join("also-absent.db"),
        };
        assert!(load(&paths).is_err());
    }
}
