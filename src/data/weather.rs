//! OpenWeatherMap API client
//!
//! Fetches current conditions, forecast, UV index and air quality, and parses
//! them into the dashboard models. Requests go through any [`Fetch`]
//! transport, normally the offline worker, so responses may come from cache.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use super::{Coordinates, CurrentConditions, Dashboard, ForecastDay};
use crate::http::{Request, Response};
use crate::worker::{Fetch, NetworkError};

/// Base URL for the OpenWeatherMap data API
const OPEN_WEATHER_BASE_URL: &str = "https://api.openweathermap.org/data/2.5/";

/// Forecast entries are 3 hours apart; every 8th one gives one per day
const FORECAST_STEP: usize = 8;

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Transport failed
    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    /// The provider answered with an error status
    #[error("HTTP error {status}: {body}")]
    Status { status: u16, body: String },

    /// No live or cached data could be served
    #[error("weather data unavailable: {0}")]
    Unavailable(String),

    /// Failed to parse JSON response
    #[error("failed to parse JSON response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Request URL could not be built
    #[error("invalid request URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Client for the OpenWeatherMap API
#[derive(Debug, Clone)]
pub struct WeatherClient<F> {
    transport: F,
    api_key: String,
    base_url: Url,
    lang: String,
}

impl<F: Fetch> WeatherClient<F> {
    /// Create a new WeatherClient sending requests through `transport`
    pub fn new(transport: F, api_key: impl Into<String>) -> Self {
        Self {
            transport,
            api_key: api_key.into(),
            base_url: Url::parse(OPEN_WEATHER_BASE_URL).expect("static base URL is valid"),
            lang: "fr".to_string(),
        }
    }

    /// Use a different base URL (for testing)
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    /// Set the language of descriptions
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    fn city_url(&self, endpoint: &str, city: &str) -> Result<Url, WeatherError> {
        let mut url = self.base_url.join(endpoint)?;
        url.query_pairs_mut()
            .append_pair("q", city)
            .append_pair("appid", &self.api_key)
            .append_pair("units", "metric")
            .append_pair("lang", &self.lang);
        Ok(url)
    }

    fn position_url(&self, endpoint: &str, lat: f64, lon: f64) -> Result<Url, WeatherError> {
        let mut url = self.base_url.join(endpoint)?;
        url.query_pairs_mut()
            .append_pair("appid", &self.api_key)
            .append_pair("lat", &lat.to_string())
            .append_pair("lon", &lon.to_string());
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, WeatherError> {
        let request = Request::get(url).with_header("accept", "application/json");
        let response = self.transport.fetch(&request).await?;

        if response.is_ok() {
            return Ok(response);
        }

        // The offline worker answers with a JSON error body when nothing is usable
        let offline_message = serde_json::from_slice::<ErrorBody>(&response.body)
            .ok()
            .and_then(|body| body.error);
        if let (503, Some(message)) = (response.status, offline_message) {
            return Err(WeatherError::Unavailable(message));
        }
        Err(WeatherError::Status {
            status: response.status,
            body: response.text(),
        })
    }

    /// Fetch current conditions for a city
    pub async fn fetch_current(&self, city: &str) -> Result<CurrentConditions, WeatherError> {
        let response = self.get(self.city_url("weather", city)?).await?;
        let api_response: CurrentResponse = serde_json::from_slice(&response.body)?;
        Ok(parse_current(api_response, city))
    }

    /// Fetch the multi-day forecast for a city, one entry per day
    pub async fn fetch_forecast(&self, city: &str) -> Result<Vec<ForecastDay>, WeatherError> {
        let response = self.get(self.city_url("forecast", city)?).await?;
        let api_response: ForecastResponse = serde_json::from_slice(&response.body)?;
        Ok(parse_forecast(api_response))
    }

    /// Fetch the UV index at a position
    pub async fn fetch_uv_index(&self, lat: f64, lon: f64) -> Result<Option<f64>, WeatherError> {
        let response = self.get(self.position_url("uvi", lat, lon)?).await?;
        let api_response: UvResponse = serde_json::from_slice(&response.body)?;
        Ok(api_response.value)
    }

    /// Fetch the air quality index at a position
    pub async fn fetch_air_quality(&self, lat: f64, lon: f64) -> Result<Option<u8>, WeatherError> {
        let response = self.get(self.position_url("air_pollution", lat, lon)?).await?;
        let api_response: PollutionResponse = serde_json::from_slice(&response.body)?;
        Ok(api_response
            .list
            .first()
            .and_then(|entry| entry.main.as_ref())
            .and_then(|main| main.aqi))
    }

    /// Fetch everything the dashboard shows for a city
    ///
    /// Current conditions and forecast are fetched together; UV and air quality
    /// follow once coordinates are known. Each failure is recorded in
    /// `Dashboard::errors` and leaves only its own part empty.
    pub async fn fetch_dashboard(&self, city: &str) -> Dashboard {
        let mut dashboard = Dashboard {
            city: city.to_string(),
            ..Dashboard::default()
        };

        let (current, forecast) = tokio::join!(self.fetch_current(city), self.fetch_forecast(city));

        match forecast {
            Ok(days) => dashboard.forecast = days,
            Err(e) => record(&mut dashboard, "forecast", e),
        }

        let current = match current {
            Ok(current) => current,
            Err(e) => {
                record(&mut dashboard, "current conditions", e);
                return dashboard;
            }
        };

        if let Some(Coordinates { lat, lon }) = current.coordinates {
            let (uv, aqi) = tokio::join!(
                self.fetch_uv_index(lat, lon),
                self.fetch_air_quality(lat, lon)
            );
            match uv {
                Ok(value) => dashboard.uv_index = value,
                Err(e) => record(&mut dashboard, "UV index", e),
            }
            match aqi {
                Ok(value) => dashboard.air_quality = value,
                Err(e) => record(&mut dashboard, "air quality", e),
            }
        }

        dashboard.current = Some(current);
        dashboard
    }
}

fn record(dashboard: &mut Dashboard, part: &str, error: WeatherError) {
    tracing::warn!(city = %dashboard.city, part, error = %error, "failed to load weather data");
    dashboard.errors.push(format!("{}: {}", part, error));
}

/// Parse a current-weather payload, tolerating any missing field
fn parse_current(response: CurrentResponse, requested_city: &str) -> CurrentConditions {
    let summary = response.weather.into_iter().next().unwrap_or_default();
    let main = response.main.unwrap_or_default();

    CurrentConditions {
        city: response
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| requested_city.to_string()),
        temperature: main.temp,
        humidity: main.humidity.map(|h| h.round().clamp(0.0, 100.0) as u8),
        description: summary.description,
        wind_speed: response.wind.and_then(|w| w.speed),
        precipitation: response.rain.and_then(|r| r.one_hour).unwrap_or(0.0),
        coordinates: response.coord.and_then(|c| match (c.lat, c.lon) {
            (Some(lat), Some(lon)) => Some(Coordinates { lat, lon }),
            _ => None,
        }),
        icon: summary.icon,
    }
}

/// Keep one forecast entry per day
fn parse_forecast(response: ForecastResponse) -> Vec<ForecastDay> {
    response
        .list
        .into_iter()
        .step_by(FORECAST_STEP)
        .filter_map(|entry| {
            let date = DateTime::<Utc>::from_timestamp(entry.dt?, 0)?;
            let summary = entry.weather.into_iter().next().unwrap_or_default();
            Some(ForecastDay {
                date,
                temperature: entry.main.and_then(|m| m.temp),
                description: summary.description,
                icon: summary.icon,
            })
        })
        .collect()
}

/// Error payload, as produced by the offline worker
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

/// Current weather response from OpenWeatherMap
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CurrentResponse {
    name: Option<String>,
    main: Option<MainBlock>,
    weather: Vec<WeatherSummary>,
    wind: Option<WindBlock>,
    rain: Option<RainBlock>,
    coord: Option<CoordBlock>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MainBlock {
    temp: Option<f64>,
    humidity: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WeatherSummary {
    description: Option<String>,
    icon: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WindBlock {
    speed: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RainBlock {
    #[serde(rename = "1h")]
    one_hour: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CoordBlock {
    lat: Option<f64>,
    lon: Option<f64>,
}

/// Forecast response: 3-hourly entries
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForecastResponse {
    list: Vec<ForecastEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ForecastEntry {
    dt: Option<i64>,
    main: Option<MainBlock>,
    weather: Vec<WeatherSummary>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct UvResponse {
    value: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PollutionResponse {
    list: Vec<PollutionEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PollutionEntry {
    main: Option<PollutionMain>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PollutionMain {
    aqi: Option<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::future::Future;

    /// Sample current weather response
    const CURRENT_RESPONSE: &str = r#"{
        "coord": {"lon": 2.3488, "lat": 48.8534},
        "weather": [{"id": 500, "main": "Rain", "description": "légère pluie", "icon": "10d"}],
        "main": {"temp": 17.42, "feels_like": 17.1, "pressure": 1012, "humidity": 72},
        "wind": {"speed": 4.63, "deg": 240},
        "rain": {"1h": 0.27},
        "dt": 1721052000,
        "name": "Paris"
    }"#;

    /// Transport answering by endpoint path
    struct Routes(HashMap<&'static str, Response>);

    impl Fetch for Routes {
        fn fetch(
            &self,
            request: &Request,
        ) -> impl Future<Output = Result<Response, NetworkError>> + Send {
            let endpoint = request.url.path().rsplit('/').next().unwrap_or_default();
            let result = self
                .0
                .get(endpoint)
                .cloned()
                .ok_or(NetworkError::Offline);
            async move { result }
        }
    }

    fn json(body: &str) -> Response {
        Response::new(200, body)
    }

    fn forecast_body(entries: usize) -> String {
        let list: Vec<String> = (0..entries)
            .map(|i| {
                format!(
                    r#"{{"dt": {}, "main": {{"temp": {}}}, "weather": [{{"description": "nuageux", "icon": "04d"}}]}}"#,
                    1_721_052_000 + i as i64 * 3 * 3600,
                    10.0 + i as f64
                )
            })
            .collect();
        format!(r#"{{"list": [{}]}}"#, list.join(","))
    }

    #[test]
    fn test_parse_current() {
        let response: CurrentResponse = serde_json::from_str(CURRENT_RESPONSE).unwrap();
        let current = parse_current(response, "paris");

        assert_eq!(current.city, "Paris");
        assert!((current.temperature.unwrap() - 17.42).abs() < 0.001);
        assert_eq!(current.humidity, Some(72));
        assert_eq!(current.description.as_deref(), Some("légère pluie"));
        assert!((current.wind_speed.unwrap() - 4.63).abs() < 0.001);
        assert!((current.precipitation - 0.27).abs() < 0.001);
        assert_eq!(
            current.coordinates,
            Some(Coordinates {
                lat: 48.8534,
                lon: 2.3488
            })
        );
        assert_eq!(
            current.icon_url().as_deref(),
            Some("https://openweathermap.org/img/wn/10d@2x.png")
        );
    }

    #[test]
    fn test_parse_current_tolerates_missing_fields() {
        let response: CurrentResponse = serde_json::from_str(r#"{"main": {}}"#).unwrap();
        let current = parse_current(response, "Oslo");

        assert_eq!(current.city, "Oslo");
        assert!(current.temperature.is_none());
        assert!(current.humidity.is_none());
        assert!(current.description.is_none());
        assert_eq!(current.precipitation, 0.0);
        assert!(current.coordinates.is_none());
    }

    #[test]
    fn test_parse_forecast_keeps_one_entry_per_day() {
        let response: ForecastResponse = serde_json::from_str(&forecast_body(40)).unwrap();
        let days = parse_forecast(response);

        assert_eq!(days.len(), 5);
        assert_eq!(days[0].temperature, Some(10.0));
        assert_eq!(days[1].temperature, Some(18.0));
        assert_eq!(days[1].date - days[0].date, chrono::Duration::hours(24));
    }

    #[tokio::test]
    async fn test_fetch_dashboard_full() {
        let mut routes = HashMap::new();
        routes.insert("weather", json(CURRENT_RESPONSE));
        routes.insert("forecast", json(&forecast_body(16)));
        routes.insert("uvi", json(r#"{"lat": 48.85, "lon": 2.35, "value": 5.31}"#));
        routes.insert("air_pollution", json(r#"{"list": [{"main": {"aqi": 2}}]}"#));
        let client = WeatherClient::new(Routes(routes), "key");

        let dashboard = client.fetch_dashboard("Paris").await;

        assert!(dashboard.errors.is_empty(), "{:?}", dashboard.errors);
        assert_eq!(dashboard.current.unwrap().city, "Paris");
        assert_eq!(dashboard.forecast.len(), 2);
        assert_eq!(dashboard.uv_index, Some(5.31));
        assert_eq!(dashboard.air_quality, Some(2));
    }

    #[tokio::test]
    async fn test_fetch_dashboard_offline_response() {
        let mut routes = HashMap::new();
        routes.insert("weather", Response::offline_data());
        routes.insert("forecast", Response::offline_data());
        let client = WeatherClient::new(Routes(routes), "key");

        let dashboard = client.fetch_dashboard("Paris").await;

        assert!(dashboard.current.is_none());
        assert!(dashboard.forecast.is_empty());
        assert_eq!(dashboard.errors.len(), 2);
        assert!(dashboard.errors[0].contains("No weather data available offline"));
    }

    #[tokio::test]
    async fn test_fetch_current_maps_offline_body_to_unavailable() {
        let mut routes = HashMap::new();
        routes.insert("weather", Response::offline_data());
        let client = WeatherClient::new(Routes(routes), "key");

        let result = client.fetch_current("Paris").await;
        assert!(matches!(result, Err(WeatherError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_fetch_current_upstream_status() {
        let mut routes = HashMap::new();
        routes.insert("weather", Response::new(401, r#"{"cod": 401, "message": "Invalid API key"}"#));
        let client = WeatherClient::new(Routes(routes), "bad");

        let result = client.fetch_current("Paris").await;
        assert!(matches!(result, Err(WeatherError::Status { status: 401, .. })));
    }

    #[test]
    fn test_request_urls() {
        let client = WeatherClient::new(Routes(HashMap::new()), "k3y");

        let url = client.city_url("weather", "Knokke, BE").unwrap();
        assert_eq!(url.path(), "/data/2.5/weather");
        assert!(url.as_str().contains("q=Knokke%2C+BE"));
        assert!(url.as_str().contains("appid=k3y"));
        assert!(url.as_str().contains("units=metric"));
        assert!(url.as_str().contains("lang=fr"));

        let url = client.position_url("uvi", 48.85, 2.35).unwrap();
        assert_eq!(url.path(), "/data/2.5/uvi");
        assert!(url.as_str().contains("lat=48.85"));
        assert!(url.as_str().contains("lon=2.35"));
    }

    #[test]
    fn test_custom_base_url_and_lang() {
        let client = WeatherClient::new(Routes(HashMap::new()), "k")
            .with_base_url(Url::parse("http://localhost:9000/owm/").unwrap())
            .with_lang("en");

        let url = client.city_url("weather", "Oslo").unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert_eq!(url.path(), "/owm/weather");
        assert!(url.as_str().contains("lang=en"));
    }
}
