//! Command-line interface parsing for Meteo
//!
//! This module handles parsing of CLI arguments using clap and turns them into a
//! validated startup configuration.

use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::data::{all_cities, find_city, DEFAULT_CITY};

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified city is not in the city list
    #[error("Unknown city: '{0}'. Run with --list-cities to see the available cities")]
    UnknownCity(String),

    /// No API key on the command line or in the environment
    #[error("Missing API key: pass --api-key or set OPENWEATHER_API_KEY")]
    MissingApiKey,
}

/// Meteo - weather dashboard with offline support
#[derive(Parser, Debug)]
#[command(name = "meteo")]
#[command(about = "Weather dashboard for European cities, usable offline")]
#[command(version)]
pub struct Cli {
    /// City to show (default: Sint-Pieters-Leeuw, BE)
    #[arg(short, long)]
    pub city: Option<String>,

    /// OpenWeatherMap API key
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Path to config file (default: $XDG_CONFIG_HOME/meteo/config.yaml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory holding the cache stores (default: $XDG_CACHE_HOME/meteo/stores)
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Simulate a disconnected network; only cached data is shown
    #[arg(long)]
    pub offline: bool,

    /// Evict expired weather data before fetching
    #[arg(long)]
    pub clean: bool,

    /// Print the available cities and exit
    #[arg(long)]
    pub list_cities: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

/// What the binary should do at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartupConfig {
    /// Print the city list
    ListCities,
    /// Show the dashboard for a city
    Dashboard(DashboardOptions),
}

/// Options for showing the dashboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    /// Canonical city name from the city list
    pub city: &'static str,
    pub api_key: String,
    pub config: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub offline: bool,
    pub clean: bool,
}

/// Resolves a city argument to its canonical spelling
///
/// # Returns
/// * `Ok(&str)` if the city is in the list
/// * `Err(CliError::UnknownCity)` if it is not
pub fn parse_city_arg(s: &str) -> Result<&'static str, CliError> {
    find_city(s).ok_or_else(|| CliError::UnknownCity(s.to_string()))
}

impl StartupConfig {
    /// Creates a StartupConfig from parsed CLI arguments.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        if cli.list_cities {
            return Ok(StartupConfig::ListCities);
        }

        let city = match &cli.city {
            Some(city) => parse_city_arg(city)?,
            None => DEFAULT_CITY,
        };

        let api_key = cli
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(CliError::MissingApiKey)?;

        Ok(StartupConfig::Dashboard(DashboardOptions {
            city,
            api_key: api_key.to_string(),
            config: cli.config.clone(),
            cache_dir: cli.cache_dir.clone(),
            offline: cli.offline,
            clean: cli.clean,
        }))
    }
}

/// Formats the city list, one per line
pub fn city_list() -> String {
    all_cities().join("\n")
}
