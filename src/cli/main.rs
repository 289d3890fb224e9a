//! `retail-etl` command-line entry point

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use retail_etl::config::EtlConfig;
use retail_etl::pipeline::{PipelineConfig, PipelineStage, PipelineStatus, run_pipeline};
use retail_etl::{error_chain, logging, store};

/// Extract retail purchase records, stage them and derive the normalized tables.
#[derive(Parser, Debug)]
#[command(name = "retail-etl", version, about = "Retail purchase ETL pipeline")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Comma-separated stages to run (extract,schema,load,types,normalize,repair)
    #[arg(long, value_delimiter = ',')]
    stages: Vec<PipelineStage>,

    /// Validate the input and mapping without writing to the database
    #[arg(long)]
    dry_run: bool,

    /// Print stage progress and enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match EtlConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::from(1));
        }
    };

    let _guard = logging::init_logging(&config.log_file_path, cli.verbose)
        .context("Failed to initialize logging")?;
    info!(config = %cli.config.display(), backend = ?config.db_config.backend, "Loaded configuration");

    let pipeline_config = PipelineConfig::from_etl_config(&config)
        .context("Invalid pipeline configuration")?
        .with_stages(cli.stages)
        .with_dry_run(cli.dry_run)
        .with_verbose(cli.verbose);

    let store = match store::open(&config.db_config) {
        Ok(store) => store,
        Err(e) => {
            error!(cause = %error_chain(&e), "Failed to open database");
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::from(1));
        }
    };

    // The store is owned by the run and closed when it returns
    match run_pipeline(pipeline_config, store) {
        Ok(report) => {
            report.print_summary();
            Ok(match report.status {
                PipelineStatus::Completed => ExitCode::SUCCESS,
                PipelineStatus::CompletedWithErrors => ExitCode::from(2),
            })
        }
        Err(e) => {
            error!(cause = %error_chain(&e), "Pipeline failed");
            eprintln!("{}", e.user_message());
            Ok(ExitCode::from(1))
        }
    }
}
