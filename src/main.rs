use anyhow::Result;
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use poverty_county_resolver::{
    export_all, insert_run, save_mapping, setup_database, timestamp, CollisionPolicy,
    PipelineConfig, RunRecord,
};

#[derive(Parser, Debug)]
#[command(name = "poverty-county-resolver")]
#[command(about = "Resolve designated poverty counties to panel county codes and export the panel")]
struct Args {
    /// JSON configuration file (absent keys keep their defaults)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// County panel CSV (overrides config)
    #[arg(long, short = 'm')]
    master: Option<PathBuf>,

    /// Designated county roster CSV (overrides config)
    #[arg(long, short = 'r')]
    roster: Option<PathBuf>,

    /// Directory for result files (overrides config)
    #[arg(long, short = 'o')]
    output_dir: Option<PathBuf>,

    /// SQLite database to record the mapping and run history in
    #[arg(long)]
    db: Option<PathBuf>,

    /// Worker threads for the fuzzy matching stages
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Shared normalized key policy: last_writer_wins, first_writer_wins, reject_ambiguous
    #[arg(long, value_parser = parse_policy)]
    collision_policy: Option<CollisionPolicy>,
}

fn parse_policy(s: &str) -> Result<CollisionPolicy, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown collision policy: {}", s))
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(master) = self.master {
            config.paths.master = master;
        }
        if let Some(roster) = self.roster {
            config.paths.roster = roster;
        }
        if let Some(output_dir) = self.output_dir {
            config.paths.output_dir = output_dir;
        }
        if self.db.is_some() {
            config.paths.database = self.db;
        }
        if let Some(workers) = self.workers {
            config.matching.workers = workers;
        }
        if let Some(policy) = self.collision_policy {
            config.matching.collision_policy = policy;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Args::parse().into_config()?;

    println!("🏷️  Poverty County Resolver v{}", poverty_county_resolver::VERSION);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load + resolve + analyze
    println!("\n📂 Loading {:?} and {:?}...", config.paths.master, config.paths.roster);
    let output = poverty_county_resolver::run(&config)?;
    println!("✓ {}", output.result.summary());

    if !output.result.unmatched.is_empty() {
        println!("\n⚠️  Unmatched roster names ({}):", output.result.unmatched_count());
        for name in &output.result.unmatched {
            println!("   - {}", name);
        }
    }

    if !output.has_matches() {
        println!("\n❌ No roster name matched any county code, nothing exported");
        tracing::warn!("zero matches; check column names and roster contents");
        return Ok(());
    }

    // 2. Export
    println!("\n💾 Exporting results...");
    let stamp = timestamp();
    let files = export_all(
        &config.paths.output_dir,
        &stamp,
        &output.panel,
        &config.analysis.delisting_year_column,
        &output.result,
        &output.mapping,
        &output.analysis,
    )?;
    println!("✓ Panel:   {:?} ({} rows)", files.panel_csv, output.panel.len());
    println!("✓ Codes:   {:?}", files.codes_txt);
    println!("✓ Mapping: {:?}", files.mapping_csv);
    println!("✓ Report:  {:?}", files.report_txt);
    println!("✓ JSON:    {:?}", files.report_json);

    // 3. Optional persistence
    if let Some(db_path) = &config.paths.database {
        println!("\n🗄️  Recording run in {:?}...", db_path);
        let mut conn = Connection::open(db_path)?;
        setup_database(&conn)?;

        let run = RunRecord::new(&output.master_fingerprint, &output.roster_fingerprint, &output.result);
        insert_run(&conn, &run)?;
        let written = save_mapping(&mut conn, &run.run_id, &output.mapping, &output.result)?;
        println!("✓ Run {} stored, {} counties upserted", run.run_id, written);
    }

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Done");

    Ok(())
}
