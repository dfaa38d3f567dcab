//! Splits intercepted requests into weather data calls and static assets

use crate::http::Request;

/// How an intercepted request is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Weather API call: network first, cache fallback bounded by age
    Data,
    /// Application shell file: cache first, network on miss
    StaticAsset,
}

/// Classifies requests by matching their host and path against known data endpoints
///
/// Only the host and path are inspected. Query strings vary per city and
/// credential, and a query value that happens to contain an endpoint name must
/// not turn an asset request into a data request.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    endpoints: Vec<String>,
}

impl RequestClassifier {
    pub fn new<I, S>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoints: endpoints.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classify(&self, request: &Request) -> RequestKind {
        let target = format!(
            "{}{}",
            request.url.host_str().unwrap_or_default(),
            request.url.path()
        );

        if self
            .endpoints
            .iter()
            .any(|endpoint| target.contains(endpoint.as_str()))
        {
            RequestKind::Data
        } else {
            RequestKind::StaticAsset
        }
    }
}
