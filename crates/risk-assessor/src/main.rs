//! Supply-Risk Assessment CLI
//!
//! Runs a batch assessment over the requested periods, countries and
//! resources.
//!
//! Usage:
//!   assess-risk --production-db lib/world_mining_data.db \
//!               --trade-db lib/baci.db \
//!               --year 2020 --country Germany --resource Cobalt \
//!               --output output --csv

use anyhow::Result;
use clap::Parser;
use resource_data::{DataContext, DataPaths};
use risk_assessor::{orchestrator, sink, AssessmentRequest, RecordStore};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "assess-risk",
    about = "Batch geopolitical supply-risk assessment for raw materials"
)]
struct Args {
    /// Mining production database (per-resource tables + identifier maps)
    #[arg(long, default_value = "lib/world_mining_data.db")]
    production_db: PathBuf,

    /// Bilateral trade database (flattened, WGI-weighted)
    #[arg(long, default_value = "lib/baci.db")]
    trade_db: PathBuf,

    /// Year to assess (repeatable)
    #[arg(long = "year", required = true)]
    years: Vec<u16>,

    /// Country or region, by name or ISO code (repeatable)
    #[arg(long = "country", required = true)]
    countries: Vec<String>,

    /// Raw material, by name or HS code (repeatable)
    #[arg(long = "resource", required = true)]
    resources: Vec<String>,

    /// JSON file defining extra regions: {"name": ["member", ...], ...}
    #[arg(long)]
    regions: Option<PathBuf>,

    /// Break flows down per exporting partner instead of one row per country
    #[arg(long)]
    exporters: bool,

    /// Output directory for the record store and exports
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Also export a flat CSV table
    #[arg(long)]
    csv: bool,

    /// Also export pretty-printed JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let regions: HashMap<String, Vec<String>> = match &args.regions {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?))?,
        None => HashMap::new(),
    };

    let started = chrono::Utc::now();
    let mut ctx = DataContext::initialize(&DataPaths {
        production_db: args.production_db.clone(),
        trade_db: args.trade_db.clone(),
    })?;
    info!(
        "Reference data loaded: {} production tables, {} trade rows",
        ctx.production.len(),
        ctx.trade.len()
    );

    let request = AssessmentRequest {
        periods: args.years.clone(),
        countries: args.countries.clone(),
        resources: args.resources.clone(),
        regions,
    };

    std::fs::create_dir_all(&args.output)?;
    let mut store = RecordStore::open(args.output.join("records.db"))?;

    let written = if args.exporters {
        let records = orchestrator::run_exporter_assessment(&mut ctx, &request)?;
        store.upsert_exporters(&records)?;
        if args.csv {
            sink::export_csv(args.output.join("exporter_results.csv"), &records)?;
        }
        if args.json {
            sink::export_json(args.output.join("exporter_results.json"), &records)?;
        }
        records.len()
    } else {
        let records = orchestrator::run_assessment(&mut ctx, &request)?;
        store.upsert(&records)?;
        if args.csv {
            sink::export_csv(args.output.join("results.csv"), &records)?;
        }
        if args.json {
            sink::export_json(args.output.join("results.json"), &records)?;
        }
        records.len()
    };

    let elapsed = (chrono::Utc::now() - started).num_milliseconds() as f64 / 1000.0;
    info!("Wrote {} records in {:.1}s", written, elapsed);

    Ok(())
}
