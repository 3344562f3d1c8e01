use anyhow::Context;
use skillstat::{export, harvest::Harvester, HarvestConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// The main entry point of the application.
///
/// Loads the configuration (the optional first argument is a config file path),
/// harvests the listing and detail records, prints the ranking table and writes
/// the CSV export. Failed individual requests do not change the exit code.
#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config =
        HarvestConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    let start_time = Instant::now();

    let harvester = Harvester::new(config.clone())?;
    let report = harvester.harvest().await.context("harvest aborted")?;

    println!("\n{}", export::render_table(&report.entries, config.report.table_precision));

    export::write_csv(&config.report.csv_path, &report.entries)
        .with_context(|| format!("failed to write {}", config.report.csv_path))?;

    println!("\nData saved to file: {}", config.report.csv_path);
    info!(
        "Processed {} vacancies, {} distinct skills in {:.2?}",
        report.total_count,
        report.distinct_skills,
        start_time.elapsed()
    );

    Ok(())
}
