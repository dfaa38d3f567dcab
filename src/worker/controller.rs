//! The offline worker: lifecycle, request interception and data store sweeping
//!
//! The hosting environment drives the worker through four entry points:
//! `on_install`, `on_activate`, `on_intercept` and `on_periodic_trigger`.
//! Interception never fails. Every path ends in a response, either live,
//! cached, or synthetic.

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::future::{join_all, try_join_all};
use thiserror::Error;

use super::classifier::{RequestClassifier, RequestKind};
use super::network::{Fetch, NetworkError};
use crate::cache::{CacheError, CacheStorage, Clock, EntryFile, FreshnessPolicy, Store, SystemClock};
use crate::config::WorkerConfig;
use crate::http::{Request, Response};

/// Errors surfaced by lifecycle and maintenance operations
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Storage operation failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// A manifest path could not be turned into a URL
    #[error("invalid asset path '{path}': {source}")]
    InvalidAsset {
        path: String,
        source: url::ParseError,
    },

    /// A manifest asset could not be pre-cached
    #[error("failed to pre-cache {url}: {reason}")]
    Precache { url: String, reason: String },

    /// Lifecycle step invoked out of order
    #[error("cannot {action} while worker is {state:?}")]
    InvalidState {
        action: &'static str,
        state: WorkerState,
    },
}

/// Lifecycle position of the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Constructed, not yet installed
    Parsed,
    Installing,
    /// Installed and waiting to activate
    Installed,
    Activating,
    /// Controlling clients and handling requests
    Activated,
    /// Install failed; this generation will never activate
    Redundant,
}

/// Outcome of a successful install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// Number of manifest assets written to the static store
    pub precached: usize,
    /// Always true: activate immediately instead of waiting for older generations
    pub skip_waiting: bool,
}

/// Outcome of a successful activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    /// Stale stores removed, sorted by name
    pub deleted: Vec<String>,
    /// Always true: take control of open clients without a reload
    pub claim_clients: bool,
}

/// Offline caching layer for the weather dashboard
///
/// Data requests go network first and fall back to a cached copy younger than
/// the TTL. Static assets go cache first and fall back to the network, then to
/// the offline page for HTML documents.
pub struct OfflineWorker<N> {
    config: WorkerConfig,
    storage: CacheStorage,
    network: N,
    classifier: RequestClassifier,
    freshness: FreshnessPolicy,
    clock: Arc<dyn Clock>,
    state: Mutex<WorkerState>,
}

impl<N: Fetch> OfflineWorker<N> {
    pub fn new(config: WorkerConfig, storage: CacheStorage, network: N) -> Self {
        Self {
            classifier: RequestClassifier::new(config.data_endpoints.iter().cloned()),
            freshness: FreshnessPolicy::new(config.ttl()),
            config,
            storage,
            network,
            clock: Arc::new(SystemClock),
            state: Mutex::new(WorkerState::Parsed),
        }
    }

    /// Replaces the wall clock, builder style
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = state;
    }

    /// Pre-caches the asset manifest and opens the data store
    ///
    /// All manifest assets are fetched before anything is written; one failure
    /// fails the whole install and marks the worker redundant.
    pub async fn on_install(&self) -> Result<InstallReport, WorkerError> {
        self.set_state(WorkerState::Installing);
        tracing::info!(
            store = %self.config.static_store,
            assets = self.config.asset_manifest.len(),
            "installing"
        );

        match self.install().await {
            Ok(report) => {
                self.set_state(WorkerState::Installed);
                tracing::info!(precached = report.precached, "install complete");
                Ok(report)
            }
            Err(e) => {
                self.set_state(WorkerState::Redundant);
                tracing::warn!(error = %e, "install failed");
                Err(e)
            }
        }
    }

    async fn install(&self) -> Result<InstallReport, WorkerError> {
        let requests = self
            .config
            .asset_manifest
            .iter()
            .map(|path| {
                self.config
                    .asset_url(path)
                    .map(Request::get)
                    .map_err(|source| WorkerError::InvalidAsset {
                        path: path.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Stores are only created once every asset is in hand
        let pairs =
            try_join_all(requests.into_iter().map(|request| self.precache(request))).await?;
        let static_store = self.storage.open(&self.config.static_store).await?;
        static_store.put_all(&pairs).await?;
        self.storage.open(&self.config.data_store).await?;

        Ok(InstallReport {
            precached: pairs.len(),
            skip_waiting: true,
        })
    }

    async fn precache(&self, request: Request) -> Result<(Request, Response), WorkerError> {
        match self.network.fetch(&request).await {
            Ok(response) if response.is_ok() => Ok((request, response)),
            Ok(response) => Err(WorkerError::Precache {
                url: request.url.to_string(),
                reason: format!("status {}", response.status),
            }),
            Err(e) => Err(WorkerError::Precache {
                url: request.url.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Deletes every store that is not one of the two current ones
    pub async fn on_activate(&self) -> Result<ActivateReport, WorkerError> {
        let state = self.state();
        if !matches!(state, WorkerState::Installed | WorkerState::Activated) {
            return Err(WorkerError::InvalidState {
                action: "activate",
                state,
            });
        }
        self.set_state(WorkerState::Activating);

        let current: HashSet<&str> = [
            self.config.static_store.as_str(),
            self.config.data_store.as_str(),
        ]
        .into_iter()
        .collect();

        let stale: Vec<String> = match self.storage.keys().await {
            Ok(names) => names
                .into_iter()
                .filter(|name| !current.contains(name.as_str()))
                .collect(),
            Err(e) => {
                self.set_state(state);
                return Err(e.into());
            }
        };

        let result = try_join_all(stale.iter().map(|name| self.storage.delete(name))).await;
        if let Err(e) = result {
            self.set_state(state);
            return Err(e.into());
        }

        for name in &stale {
            tracing::info!(store = %name, "deleted stale store");
        }
        self.set_state(WorkerState::Activated);

        Ok(ActivateReport {
            deleted: stale,
            claim_clients: true,
        })
    }

    /// Handles one intercepted request
    pub async fn on_intercept(&self, request: &Request) -> Response {
        match self.classifier.classify(request) {
            RequestKind::Data => self.network_first(request).await,
            RequestKind::StaticAsset => self.cache_first(request).await,
        }
    }

    async fn network_first(&self, request: &Request) -> Response {
        match self.network.fetch(request).await {
            Ok(response) if response.is_ok() => {
                let stamped = response
                    .clone()
                    .with_fetch_time(self.clock.now().timestamp_millis());
                if let Err(e) = self.put(&self.config.data_store, request, &stamped).await {
                    tracing::warn!(url = %request.url, error = %e, "failed to cache data response");
                }
                return response;
            }
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "upstream error, trying cache");
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network failure, trying cache");
            }
        }

        let cached = match self
            .storage
            .match_in(&[self.config.data_store.as_str()], request)
            .await
        {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "data cache lookup failed");
                None
            }
        };

        if self.freshness.is_fresh(cached.as_ref(), self.clock.now()) {
            if let Some(response) = cached {
                tracing::debug!(url = %request.url, "serving cached data");
                return response;
            }
        }

        tracing::debug!(url = %request.url, "no usable cached data");
        Response::offline_data()
    }

    async fn cache_first(&self, request: &Request) -> Response {
        let current = [
            self.config.static_store.as_str(),
            self.config.data_store.as_str(),
        ];
        match self.storage.match_in(&current, request).await {
            Ok(Some(response)) => return response,
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %request.url, error = %e, "asset cache lookup failed"),
        }

        match self.network.fetch(request).await {
            Ok(response) if response.is_ok() => {
                if let Err(e) = self.put(&self.config.static_store, request, &response).await {
                    tracing::warn!(url = %request.url, error = %e, "failed to cache asset");
                }
                return response;
            }
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "asset fetch returned error status");
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "asset fetch failed");
            }
        }

        if request.accepts_html() {
            if let Some(page) = self.offline_page().await {
                return page;
            }
        }

        Response::service_unavailable()
    }

    async fn offline_page(&self) -> Option<Response> {
        let url = self.config.asset_url(&self.config.offline_page).ok()?;
        match self
            .storage
            .match_in(&[self.config.static_store.as_str()], &Request::get(url))
            .await
        {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "offline page lookup failed");
                None
            }
        }
    }

    async fn put(
        &self,
        store: &str,
        request: &Request,
        response: &Response,
    ) -> Result<(), CacheError> {
        self.storage.open(store).await?.put(request, response).await
    }

    /// Runs the data store sweep when `tag` is the configured janitor tag
    ///
    /// Returns the number of evicted entries. Unknown tags are ignored.
    pub async fn on_periodic_trigger(&self, tag: &str) -> Result<usize, WorkerError> {
        if tag != self.config.janitor_tag {
            tracing::debug!(tag, "ignoring periodic trigger");
            return Ok(0);
        }

        let evicted = self.sweep_data_store().await?;
        tracing::info!(evicted, store = %self.config.data_store, "data store sweep complete");
        Ok(evicted)
    }

    async fn sweep_data_store(&self) -> Result<usize, WorkerError> {
        let store = self.storage.open(&self.config.data_store).await?;
        let files = store.entries().await?;
        let now = self.clock.now();

        let results =
            join_all(files.iter().map(|file| self.evict_if_stale(&store, file, now))).await;

        let mut evicted = 0;
        for (file, result) in files.iter().zip(results) {
            match result {
                Ok(true) => evicted += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(path = %file.path.display(), error = %e, "failed to evict data entry");
                }
            }
        }
        Ok(evicted)
    }

    /// Unreadable entry files have no usable fetch time and count as stale
    async fn evict_if_stale(
        &self,
        store: &Store,
        file: &EntryFile,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<bool, CacheError> {
        let cached = file.entry.as_ref().map(|(_, response)| response);
        if self.freshness.is_fresh(cached, now) {
            return Ok(false);
        }
        match &file.entry {
            Some((key, _)) => tracing::debug!(key = %key, "evicting stale data entry"),
            None => tracing::debug!(path = %file.path.display(), "evicting unreadable data entry"),
        }
        store.remove_entry_file(file).await
    }
}

impl<N: Fetch> Fetch for OfflineWorker<N> {
    fn fetch(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, NetworkError>> + Send {
        async move { Ok(self.on_intercept(request).await) }
    }
}
