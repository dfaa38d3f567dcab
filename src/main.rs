//! Meteo - weather dashboard with offline support
//!
//! Installs and activates the offline worker, then fetches the dashboard for
//! the selected city through it and prints the result.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use meteo::cache::CacheStorage;
use meteo::cli::{city_list, Cli, DashboardOptions, StartupConfig};
use meteo::config::WorkerConfig;
use meteo::data::WeatherClient;
use meteo::worker::{HttpFetcher, OfflineWorker};

/// Initialize the tracing subscriber for logging.
///
/// Log level is controlled by:
/// 1. `--debug` flag sets level to DEBUG
/// 2. `RUST_LOG` environment variable (if set)
/// 3. Default is INFO
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("meteo=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("meteo=info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn show_dashboard(options: DashboardOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = WorkerConfig::load(options.config.as_deref())?;
    let storage = match options.cache_dir {
        Some(dir) => CacheStorage::with_dir(dir),
        None => CacheStorage::new().ok_or("could not determine a cache directory")?,
    };

    let network = HttpFetcher::new();
    network.set_online(!options.offline);
    let worker = Arc::new(OfflineWorker::new(config, storage, network));

    // Install once per store generation; a failed install leaves older stores usable
    if worker.storage().has(&worker.config().static_store).await {
        tracing::debug!(store = %worker.config().static_store, "current generation already installed");
    } else {
        match worker.on_install().await {
            Ok(_) => {
                let report = worker.on_activate().await?;
                tracing::debug!(deleted = ?report.deleted, "activated");
            }
            Err(e) => tracing::warn!(error = %e, "running without a fresh install"),
        }
    }

    if options.clean {
        let tag = worker.config().janitor_tag.clone();
        let evicted = worker.on_periodic_trigger(&tag).await?;
        tracing::info!(evicted, "cleaned expired weather data");
    }

    let client = WeatherClient::new(Arc::clone(&worker), options.api_key);
    let dashboard = client.fetch_dashboard(options.city).await;
    print!("{}", dashboard);

    Ok(())
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match StartupConfig::from_cli(&cli)? {
        StartupConfig::ListCities => {
            println!("{}", city_list());
            Ok(())
        }
        StartupConfig::Dashboard(options) => show_dashboard(options).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    tracing::debug!(city = ?cli.city, offline = cli.offline, "meteo starting");

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
