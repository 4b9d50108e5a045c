#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the placelink linkage pipeline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use placelink_config::RunConfig;

mod pipeline;

#[derive(Parser)]
#[command(name = "placelink", about = "Historical address linkage and spatial disambiguation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full two-round linkage pipeline
    Run {
        /// Path to the TOML run configuration
        #[arg(long, default_value = "placelink.toml")]
        config: PathBuf,
    },
    /// Validate a configuration file without running anything
    Check {
        /// Path to the TOML run configuration
        #[arg(long, default_value = "placelink.toml")]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let config = match RunConfig::load(&config) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("invalid configuration: {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Err(e) = pipeline::run(&config) {
                log::error!("pipeline failed: {e}");
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Commands::Check { config } => match RunConfig::load(&config) {
            Ok(_) => {
                log::info!("configuration is valid");
                ExitCode::SUCCESS
            }
            Err(e) => {
                log::error!("invalid configuration: {e}");
                ExitCode::FAILURE
            }
        },
    }
}
