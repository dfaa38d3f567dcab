//! Request and response types passed through the offline worker
//!
//! These are deliberately small, owned, serializable values so that a response
//! can be written to disk, read back later, and handed to a caller unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

/// Header carrying the time (milliseconds since epoch) a data response was fetched
pub const FETCH_TIME_HEADER: &str = "x-fetch-time";

/// Body of the synthetic response returned when weather data is unavailable
pub const OFFLINE_DATA_MESSAGE: &str = "No weather data available offline";

/// Case-insensitive header map
///
/// Names are lower-cased on insertion, so lookups never depend on the casing
/// used by the server or the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing any existing value
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.0.insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    /// Adds a value to a header, joining repeated values with `, `
    pub fn append(&mut self, name: impl AsRef<str>, value: &str) {
        self.0
            .entry(name.as_ref().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.0.remove(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Identity of a cached entry: method and full URL
///
/// Headers never take part in the identity, so two requests for the same URL
/// with different `accept` headers share one entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: String,
    pub url: String,
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An outgoing request seen by the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub headers: Headers,
}

impl Request {
    /// Creates a GET request with no headers
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            headers: Headers::new(),
        }
    }

    /// Adds a header, builder style
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns true when the caller asked for an HTML document
    pub fn accepts_html(&self) -> bool {
        self.headers
            .get("accept")
            .map(|accept| accept.contains("text/html"))
            .unwrap_or(false)
    }

    pub fn key(&self) -> CacheKey {
        CacheKey {
            method: self.method.to_ascii_uppercase(),
            url: self.url.to_string(),
        }
    }
}

/// A complete, buffered response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub status_text: String,
    #[serde(default)]
    pub headers: Headers,
    #[serde(with = "hex")]
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: String::new(),
            headers: Headers::new(),
            body: body.into(),
        }
    }

    /// Builds a JSON response with the matching content type
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        let mut response = Self::new(status, value.to_string());
        response.headers.insert("content-type", "application/json");
        response
    }

    /// Synthetic response for data requests that cannot be served
    pub fn offline_data() -> Self {
        let mut response = Self::json(
            503,
            &serde_json::json!({ "error": OFFLINE_DATA_MESSAGE }),
        );
        response.status_text = "Service Unavailable".to_string();
        response
    }

    /// Synthetic response for asset requests that cannot be served
    pub fn service_unavailable() -> Self {
        let mut response = Self::new(503, "Service Unavailable");
        response.status_text = "Service Unavailable".to_string();
        response.headers.insert("content-type", "text/plain");
        response
    }

    /// True for 2xx statuses
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Parsed fetch-time stamp, if present and well-formed
    pub fn fetch_time(&self) -> Option<i64> {
        self.header(FETCH_TIME_HEADER)?.trim().parse().ok()
    }

    /// Returns a copy stamped with the given fetch time
    pub fn with_fetch_time(mut self, millis: i64) -> Self {
        self.headers.insert(FETCH_TIME_HEADER, millis.to_string());
        self
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json");

        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_headers_append_joins_values() {
        let mut headers = Headers::new();
        headers.append("Vary", "Accept");
        headers.append("vary", "Origin");

        assert_eq!(headers.get("vary"), Some("Accept, Origin"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_request_key_ignores_headers() {
        let plain = Request::get(url("https://example.com/index.html"));
        let html = plain.clone().with_header("Accept", "text/html");

        assert_eq!(plain.key(), html.key());
        assert_eq!(plain.key().to_string(), "GET https://example.com/index.html");
    }

    #[test]
    fn test_accepts_html() {
        let request = Request::get(url("https://example.com/"))
            .with_header("accept", "text/html,application/xhtml+xml");
        assert!(request.accepts_html());

        let request = Request::get(url("https://example.com/style.css"))
            .with_header("accept", "text/css");
        assert!(!request.accepts_html());

        assert!(!Request::get(url("https://example.com/")).accepts_html());
    }

    #[test]
    fn test_offline_data_shape() {
        let response = Response::offline_data();

        assert_eq!(response.status, 503);
        assert_eq!(response.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["error"], "No weather data available offline");
    }

    #[test]
    fn test_fetch_time_stamp() {
        let response = Response::new(200, "{}");
        assert_eq!(response.fetch_time(), None);

        let stamped = response.clone().with_fetch_time(1_700_000_000_000);
        assert_eq!(stamped.fetch_time(), Some(1_700_000_000_000));
        assert_eq!(stamped.body, response.body);
        assert_eq!(stamped.status, response.status);
    }

    #[test]
    fn test_unparsable_fetch_time_is_none() {
        let mut response = Response::new(200, "{}");
        response.headers.insert(FETCH_TIME_HEADER, "yesterday");
        assert_eq!(response.fetch_time(), None);
    }

    #[test]
    fn test_response_serializes_body_as_hex() {
        let response = Response::new(200, "hi");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"6869\""));

        let back: Response = serde_json::from_str(&json).unwrap();
        assert_eq!(back, response);
    }
}
