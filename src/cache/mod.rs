//! Persistent response stores and the freshness policy applied to them
//!
//! This module provides named, disk-backed stores of request/response pairs that
//! survive restarts, plus the age check used to decide whether a cached weather
//! response may still be served.

mod freshness;
mod manager;

pub use freshness::{Clock, FreshnessPolicy, SystemClock, DEFAULT_TTL};
pub use manager::{CacheError, CacheStorage, EntryFile, Store};
