//! Meteo Library
//!
//! Weather dashboard client with an offline caching layer. The worker
//! intercepts every request, serving weather data network first and the
//! application shell cache first, so the dashboard keeps working without a
//! connection.

pub mod cache;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod data;
pub mod http;
pub mod worker;
