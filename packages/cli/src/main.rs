#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for AOI clipping and analysis.
//!
//! Uses `indicatif-log-bridge` (via [`aoi_map_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod analyze;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "aoi_map_cli", about = "Area-of-interest clipping and analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the reference layer catalog
    Layers,
    /// Clip reference layers against one or more areas and report metrics
    Analyze(analyze::AnalyzeArgs),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = aoi_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Layers => {
            let definitions = aoi_map_layers::catalog::all_definitions();
            println!("{:<22} {:<18} NAME", "KEY", "PRIMARY");
            println!("{}", "-".repeat(70));
            for definition in &definitions {
                println!(
                    "{:<22} {:<18} {}",
                    definition.key, definition.primary_property, definition.display_name
                );
            }
        }
        Commands::Analyze(args) => analyze::run(args, &multi).await?,
    }

    Ok(())
}
