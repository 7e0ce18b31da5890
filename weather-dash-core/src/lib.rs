//! Core library for the `weather-dash` tool.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The outbound HTTP client (geocoding and current-weather endpoints)
//! - Normalization of the upstream payload into a stable record
//! - A single-slot, time-expiring cache of the last lookup
//! - [`WeatherService`], which composes the pieces above
//!
//! It is used by `weather-dash-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod normalize;
pub mod service;

pub use cache::{CacheKey, FileCache};
pub use client::{HttpFetch, RemoteClient};
pub use config::Config;
pub use error::FetchError;
pub use model::{
    Clouds, ConditionEntry, Coordinate, GeocodeOutcome, LookupRequest, NormalizedWeather,
    Precipitation, SysInfo, Temperatures, Wind,
};
pub use service::WeatherService;
