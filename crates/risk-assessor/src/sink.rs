//! Result persistence and flat exports
//!
//! Records land in a SQLite store keyed by their deterministic id, so
//! rerunning a batch upserts instead of duplicating. CSV and JSON exports
//! serialize the same records for downstream tooling.

use crate::{ExporterRecord, Result, ResultRecord};
use rusqlite::{params, Connection};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

/// SQLite-backed record store, upserted by deterministic record id.
pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open (or create) the store and its tables.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS record_data (
                id                      TEXT PRIMARY KEY,
                country                 TEXT,
                resource                TEXT,
                year                    INTEGER,
                score                   REAL,
                characterization_factor REAL,
                hhi                     REAL,
                import_risk             REAL,
                price                   REAL
            );
            CREATE TABLE IF NOT EXISTS exporter_data (
                id            TEXT PRIMARY KEY,
                importer      TEXT,
                exporter      TEXT,
                exporter_code INTEGER,
                resource      TEXT,
                year          INTEGER,
                numerator     REAL,
                total_trade   REAL,
                country_price REAL,
                global_price  REAL
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn upsert(&mut self, records: &[ResultRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO record_data \
                 (id, country, resource, year, score, characterization_factor, \
                  hhi, import_risk, price) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
                 ON CONFLICT(id) DO UPDATE SET \
                    country = excluded.country, \
                    resource = excluded.resource, \
                    year = excluded.year, \
                    score = excluded.score, \
                    characterization_factor = excluded.characterization_factor, \
                    hhi = excluded.hhi, \
                    import_risk = excluded.import_risk, \
                    price = excluded.price",
            )?;
            for rec in records {
                stmt.execute(params![
                    rec.id,
                    rec.country,
                    rec.resource,
                    rec.year,
                    rec.score,
                    rec.characterization_factor,
                    rec.hhi,
                    rec.import_risk,
                    rec.price,
                ])?;
            }
        }
        tx.commit()?;
        info!(records = records.len(), "record store updated");
        Ok(())
    }

    pub fn upsert_exporters(&mut self, records: &[ExporterRecord]) -> Result<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO exporter_data \
                 (id, importer, exporter, exporter_code, resource, year, \
                  numerator, total_trade, country_price, global_price) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
                 ON CONFLICT(id) DO UPDATE SET \
                    importer = excluded.importer, \
                    exporter = excluded.exporter, \
                    exporter_code = excluded.exporter_code, \
                    resource = excluded.resource, \
                    year = excluded.year, \
                    numerator = excluded.numerator, \
                    total_trade = excluded.total_trade, \
                    country_price = excluded.country_price, \
                    global_price = excluded.global_price",
            )?;
            for rec in records {
                stmt.execute(params![
                    rec.id,
                    rec.importer,
                    rec.exporter,
                    rec.exporter_code,
                    rec.resource,
                    rec.year,
                    rec.numerator,
                    rec.total_trade,
                    rec.country_price,
                    rec.global_price,
                ])?;
            }
        }
        tx.commit()?;
        info!(records = records.len(), "exporter store updated");
        Ok(())
    }

    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM record_data", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    pub fn get(&self, id: &str) -> Result<Option<ResultRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, country, resource, year, score, characterization_factor, \
             hhi, import_risk, price FROM record_data WHERE id = ?1",
        )?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(ResultRecord {
                id: row.get(0)?,
                country: row.get(1)?,
                resource: row.get(2)?,
                year: row.get(3)?,
                score: row.get(4)?,
                characterization_factor: row.get(5)?,
                hhi: row.get(6)?,
                import_risk: row.get(7)?,
                price: row.get(8)?,
            })),
            None => Ok(None),
        }
    }
}

/// Write records as a flat CSV table.
pub fn export_csv<T: serde::Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for rec in records {
        writer.serialize(rec)?;
    }
    writer.flush()?;
    info!(path = ?path.as_ref(), records = records.len(), "CSV export written");
    Ok(())
}

/// Write records as pretty-printed JSON.
pub fn export_json<T: serde::Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let file = File::create(path.as_ref())?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, records).map_err(std::io::Error::from)?;
    info!(path = ?path.as_ref(), records = records.len(), "JSON export written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, score: f64) -> ResultRecord {
        ResultRecord {
            id: id.to_string(),
            country: "Germany".to_string(),
            resource: "Cobalt".to_string(),
            year: 2020,
            score,
            characterization_factor: score * 10.0,
            hhi: 0.58,
            import_risk: 0.27,
            price: 10.67,
        }
    }

    #[test]
    fn test_upsert_is_idempotent_by_id() {
        let dir = TempDir::new().unwrap();
        let mut store = RecordStore::open(dir.path().join("records.db")).unwrap();

        store.upsert(&[record("a2020", 0.1)]).unwrap();
        store.upsert(&[record("a2020", 0.9)]).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let stored = store.get("a2020").unwrap().unwrap();
        assert!((stored.score - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_distinct_ids_accumulate() {
        let dir = TempDir::new().unwrap();
        let mut store = RecordStore::open(dir.path().join("records.db")).unwrap();

        store
            .upsert(&[record("a2020", 0.1), record("b2020", 0.2)])
            .unwrap();
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_store_reopens() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("records.db");
        {
            let mut store = RecordStore::open(&path).unwrap();
            store.upsert(&[record("a2020", 0.1)]).unwrap();
        }
        let store = RecordStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_csv_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.csv");
        export_csv(&path, &[record("a2020", 0.1)]).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert!(body.starts_with("id,country,resource,year"));
        assert!(body.contains("a2020,Germany,Cobalt,2020"));
    }

    #[test]
    fn test_json_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        export_json(&path, &[record("a2020", 0.1)]).unwrap();

        let parsed: Vec<ResultRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].id, "a2020");
    }
}
