#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for the traffic monitor.
//!
//! Without a subcommand the API server is started. `scrape` runs a single
//! stand-alone cycle against the live page or a saved copy and prints the
//! result as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use traffic_monitor_orchestrator::{Pipeline, RefreshConfig};
use traffic_monitor_scraper::fetch::FileFetcher;

#[derive(Parser)]
#[command(name = "traffic_monitor", about = "ANWB traffic monitor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server and the refresh scheduler
    Serve,
    /// Run one scrape cycle and print the result as JSON
    Scrape {
        /// Read the page from a saved HTML or JSON file instead of fetching it
        #[arg(long)]
        input: Option<PathBuf>,
        /// Page to fetch (overrides `TRAFFIC_SOURCE_URL`)
        #[arg(long)]
        url: Option<String>,
    },
    /// List the cities known to the place vocabulary
    Vocabulary,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            // The server uses actix-web's runtime, so we need to run it
            // in a blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(traffic_monitor_server::run_server())
            })
            .await??;
        }
        Commands::Scrape { input, url } => {
            let mut config = RefreshConfig::from_env();
            if let Some(url) = url {
                config.source_url = url;
            }

            let pipeline = match input {
                Some(path) => {
                    log::info!("Scraping saved page {}", path.display());
                    Pipeline::configured(Arc::new(FileFetcher::new(path)), &config)
                }
                None => {
                    log::info!("Scraping {}", config.source_url);
                    Pipeline::from_config(&config)?
                }
            };

            let result = pipeline.scrape().await;
            println!("{}", serde_json::to_string_pretty(&result)?);

            if !result.success {
                std::process::exit(1);
            }
        }
        Commands::Vocabulary => {
            let vocabulary = traffic_monitor_normalize::vocabulary::netherlands();
            for city in vocabulary.city_names() {
                println!("{city}");
            }
        }
    }

    Ok(())
}
