//! Core library for the weather service.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Abstraction over weather providers and the provider registry
//! - A freshness-windowed cache with stale fallback
//! - The lookup orchestrator that fails over between providers
//! - The HTTP router exposing it
//!
//! It is used by `weather-server`, but can also be embedded by other binaries.

pub mod cache;
pub mod config;
pub mod lookup;
pub mod model;
pub mod provider;
pub mod server;

#[cfg(test)]
mod testing;

pub use cache::{MeasurementCache, MemoryCache};
pub use config::{Config, ProviderConfig};
pub use lookup::{LookupError, LookupSettings, Served, Source, WeatherLookup};
pub use model::{Measurement, Weather};
pub use provider::{ProviderId, WeatherProvider};
