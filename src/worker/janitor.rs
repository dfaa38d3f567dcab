//! Recurring trigger for the data store sweep
//!
//! Delivers the janitor tag to the worker on a fixed interval from a background
//! tokio task, reporting each outcome over a channel.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::controller::OfflineWorker;
use super::network::Fetch;
use crate::config::WorkerConfig;

/// Messages sent from the background sweep task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JanitorMessage {
    /// A sweep finished
    SweepCompleted {
        tag: String,
        evicted: usize,
    },
    /// A sweep failed; the next tick tries again
    SweepFailed(String),
}

/// Configuration for the recurring trigger
#[derive(Debug, Clone)]
pub struct JanitorConfig {
    /// Time between sweeps
    pub interval: Duration,
    /// Tag delivered to the worker on each tick
    pub tag: String,
    /// Whether the trigger runs at all
    pub enabled: bool,
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1800), // 30 minutes
            tag: "clean-caches".to_string(),
            enabled: true,
        }
    }
}

impl From<&WorkerConfig> for JanitorConfig {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            interval: config.janitor_interval(),
            tag: config.janitor_tag.clone(),
            enabled: true,
        }
    }
}

/// Handle for controlling the background sweep task
pub struct JanitorHandle {
    /// Channel for receiving sweep outcomes
    pub receiver: mpsc::Receiver<JanitorMessage>,
    shutdown_tx: mpsc::Sender<()>,
}

impl JanitorHandle {
    /// Spawns the background task; the first sweep happens one interval from now
    pub fn spawn<N>(worker: Arc<OfflineWorker<N>>, config: JanitorConfig) -> Self
    where
        N: Fetch + 'static,
    {
        let (msg_tx, msg_rx) = mpsc::channel(32);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        if config.enabled {
            let JanitorConfig { interval, tag, .. } = config;

            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                // Skip the first tick (immediate)
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let message = match worker.on_periodic_trigger(&tag).await {
                                Ok(evicted) => JanitorMessage::SweepCompleted {
                                    tag: tag.clone(),
                                    evicted,
                                },
                                Err(e) => {
                                    tracing::warn!(error = %e, "data store sweep failed");
                                    JanitorMessage::SweepFailed(e.to_string())
                                }
                            };
                            // Receiver may have been dropped; keep sweeping regardless
                            let _ = msg_tx.try_send(message);
                        }
                        _ = shutdown_rx.recv() => {
                            break;
                        }
                    }
                }
            });
        }

        Self {
            receiver: msg_rx,
            shutdown_tx,
        }
    }

    /// Stops the background task
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

/// Checks for a pending sweep outcome without blocking
pub fn try_recv(handle: &mut JanitorHandle) -> Option<JanitorMessage> {
    handle.receiver.try_recv().ok()
}
