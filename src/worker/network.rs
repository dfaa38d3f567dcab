//! The network seam used by the worker and the weather client

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use reqwest::Client;
use thiserror::Error;

use crate::http::{Headers, Request, Response};

/// Errors raised when a request cannot reach the network
#[derive(Debug, Error)]
pub enum NetworkError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Network access is switched off
    #[error("network unavailable")]
    Offline,

    /// Request carried a header reqwest refuses to send
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// Anything that can turn a request into a response
///
/// A non-2xx status is still `Ok`; only transport failures are errors.
pub trait Fetch: Send + Sync {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, NetworkError>> + Send;
}

impl<T: Fetch> Fetch for Arc<T> {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, NetworkError>> + Send {
        (**self).fetch(request)
    }
}

/// Fetches over HTTP with reqwest
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
    online: AtomicBool,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a fetcher with a custom HTTP client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            online: AtomicBool::new(true),
        }
    }

    /// Switches network access on or off; while off every fetch fails with `Offline`
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Relaxed)
    }

    async fn send(&self, request: &Request) -> Result<Response, NetworkError> {
        if !self.is_online() {
            return Err(NetworkError::Offline);
        }

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| NetworkError::InvalidHeader(format!("method {}", request.method)))?;
        let mut builder = self.client.request(method, request.url.clone());
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }

        let upstream = builder.send().await?;
        let status = upstream.status();
        let mut headers = Headers::new();
        for (name, value) in upstream.headers() {
            match value.to_str() {
                Ok(value) => headers.append(name.as_str(), value),
                Err(_) => tracing::debug!(header = %name, "dropping non-UTF-8 header"),
            }
        }
        let body = upstream.bytes().await?;

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: body.to_vec(),
        })
    }
}

impl Fetch for HttpFetcher {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, NetworkError>> + Send {
        self.send(request)
    }
}
