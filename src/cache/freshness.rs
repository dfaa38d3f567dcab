//! Age-based freshness checks for cached data responses

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::http::Response;

/// Default maximum age of a cached data response (30 minutes)
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Source of the current time
///
/// Injected into the worker so that tests can move time forward without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Decides whether a cached data response may still be served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    ttl: Duration,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FreshnessPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns true if the entry exists, carries a readable fetch time, and is
    /// younger than the TTL at `now`
    ///
    /// A missing entry or a missing/unparsable stamp is always stale.
    pub fn is_fresh(&self, entry: Option<&Response>, now: DateTime<Utc>) -> bool {
        let Some(fetched_at) = entry.and_then(Response::fetch_time) else {
            return false;
        };

        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        now.timestamp_millis().saturating_sub(fetched_at) < ttl_ms
    }
}
