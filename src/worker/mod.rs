//! Offline worker for the weather dashboard
//!
//! Intercepts every request the dashboard makes. Weather API calls are served
//! network first with a bounded-age cache fallback; application shell files are
//! served cache first. A periodic sweep evicts expired weather data.

mod classifier;
mod controller;
mod janitor;
mod network;

pub use classifier::{RequestClassifier, RequestKind};
pub use controller::{ActivateReport, InstallReport, OfflineWorker, WorkerError, WorkerState};
pub use janitor::{try_recv, JanitorConfig, JanitorHandle, JanitorMessage};
pub use network::{Fetch, HttpFetcher, NetworkError};
