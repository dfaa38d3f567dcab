//! Weather data models for the dashboard
//!
//! Every field that comes from the weather provider is optional: a payload with
//! missing fields still produces a value, and the missing parts render as
//! placeholders instead of failing the whole view.

pub mod cities;
pub mod weather;

pub use cities::{all_cities, find_city, DEFAULT_CITY};
pub use weather::{WeatherClient, WeatherError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Base URL for weather condition icons
const ICON_BASE_URL: &str = "https://openweathermap.org/img/wn";

/// Geographic position reported by the provider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Current conditions for a city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    /// City name as reported by the provider, or as requested
    pub city: String,
    /// Temperature in Celsius
    pub temperature: Option<f64>,
    /// Relative humidity in percent
    pub humidity: Option<u8>,
    /// Localized description (e.g., "ciel dégagé")
    pub description: Option<String>,
    /// Wind speed in m/s
    pub wind_speed: Option<f64>,
    /// Rain over the last hour in mm; zero when not reported
    pub precipitation: f64,
    pub coordinates: Option<Coordinates>,
    /// Provider icon code (e.g., "10d")
    pub icon: Option<String>,
}

impl CurrentConditions {
    pub fn icon_url(&self) -> Option<String> {
        self.icon.as_deref().map(icon_url)
    }
}

/// One day of the multi-day forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: DateTime<Utc>,
    /// Temperature in Celsius
    pub temperature: Option<f64>,
    pub description: Option<String>,
    pub icon: Option<String>,
}

/// Everything the dashboard shows for one city
///
/// Each part is fetched independently; a part that could not be loaded is
/// left empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub city: String,
    pub current: Option<CurrentConditions>,
    pub uv_index: Option<f64>,
    /// Air quality index, 1 (good) to 5 (very poor)
    pub air_quality: Option<u8>,
    pub forecast: Vec<ForecastDay>,
    /// Messages for the parts that could not be loaded
    pub errors: Vec<String>,
}

/// Builds the URL of a weather icon at 2x resolution
pub fn icon_url(code: &str) -> String {
    format!("{}/{}@2x.png", ICON_BASE_URL, code)
}
