//! Worker configuration
//!
//! Store names, asset manifest, data endpoints and timing are explicit values
//! handed to the worker at construction. They can be overridden from a YAML file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    /// The config file could not be read
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid YAML for this schema
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The config parsed but its values are unusable
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything the offline worker needs to know about its deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin the application shell is served from; manifest paths resolve against it
    pub origin: Url,
    /// Name of the current static-asset store
    pub static_store: String,
    /// Name of the current data store
    pub data_store: String,
    /// Paths pre-cached at install time
    pub asset_manifest: Vec<String>,
    /// Path of the page served to HTML requests when offline
    pub offline_page: String,
    /// Host/path fragments identifying weather API calls
    pub data_endpoints: Vec<String>,
    /// Maximum age of a cached data response, in seconds
    pub ttl_secs: u64,
    /// Tag of the periodic trigger that runs the data store sweep
    pub janitor_tag: String,
    /// How often the sweep is triggered, in seconds
    pub janitor_interval_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            static_store: "meteo-static-v2".to_string(),
            data_store: "meteo-data-v2".to_string(),
            asset_manifest: [
                "/",
                "/index.html",
                "/style.css",
                "/script.js",
                "/manifest.json",
                "/offline.html",
                "/Meteo-180x180.png",
                "/Meteo-192x192.png",
                "/Meteo-512x512.png",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            offline_page: "/offline.html".to_string(),
            data_endpoints: [
                "api.openweathermap.org/data/2.5/weather",
                "api.openweathermap.org/data/2.5/forecast",
                "api.openweathermap.org/data/2.5/uvi",
                "api.openweathermap.org/data/2.5/air_pollution",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ttl_secs: 30 * 60,
            janitor_tag: "clean-caches".to_string(),
            janitor_interval_secs: 30 * 60,
        }
    }
}

fn default_origin() -> Url {
    Url::parse("http://localhost:8080/").expect("static origin URL is valid")
}

impl WorkerConfig {
    /// Load configuration
    ///
    /// Search order:
    /// 1. Explicit path if provided (must exist)
    /// 2. $XDG_CONFIG_HOME/meteo/config.yaml
    /// 3. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit_path {
            Some(p) if p.exists() => Some(p.to_path_buf()),
            Some(p) => return Err(ConfigError::NotFound(p.to_path_buf())),
            None => Self::find_config_file(),
        };

        match path {
            Some(p) => {
                tracing::debug!(path = %p.display(), "loading config");
                Self::load_from_path(&p)
            }
            None => Ok(Self::default()),
        }
    }

    fn find_config_file() -> Option<PathBuf> {
        let dirs = ProjectDirs::from("", "", "meteo")?;
        let path = dirs.config_dir().join("config.yaml");
        path.exists().then_some(path)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.static_store == self.data_store {
            return Err(ConfigError::Invalid(
                "static_store and data_store must differ".to_string(),
            ));
        }
        if self.ttl_secs == 0 {
            return Err(ConfigError::Invalid("ttl_secs must be positive".to_string()));
        }
        if self.janitor_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "janitor_interval_secs must be positive".to_string(),
            ));
        }
        if self.data_endpoints.iter().all(|e| e.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "data_endpoints must name at least one endpoint".to_string(),
            ));
        }
        if !self.offline_page.is_empty()
            && !self.asset_manifest.iter().any(|p| *p == self.offline_page)
        {
            tracing::warn!(page = %self.offline_page, "offline page is not in the asset manifest");
        }
        Ok(())
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs)
    }

    /// Resolves an application path against the origin
    pub fn asset_url(&self, path: &str) -> Result<Url, url::ParseError> {
        self.origin.join(path)
    }
}
