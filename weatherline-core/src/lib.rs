//! Core library for `weatherline`.
//!
//! This crate defines:
//! - The canonical weather record and query types
//! - A remote fetcher for the OpenWeather current-weather endpoint
//! - A time-bounded cache over a persistent key-value store
//! - The [`WeatherGateway`] that decides between network and cache
//! - Configuration & credentials handling
//!
//! It is used by `weatherline-cli`, but can also be reused by other binaries or services.

pub mod cache;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod gateway;
pub mod location;
pub mod model;
pub mod provider;
pub mod storage;

pub use cache::WeatherCache;
pub use config::Config;
pub use connectivity::{Connectivity, StaticConnectivity, TcpProbe};
pub use error::{Failure, FailureKind, FetchError};
pub use gateway::WeatherGateway;
pub use location::{FixedLocation, LocationSource};
pub use model::{CacheEntry, Coordinates, Query, WeatherRecord};
pub use provider::{OpenWeatherFetcher, UnconfiguredFetcher, WeatherFetcher};
pub use storage::{FileStore, KeyValueStore, MemoryStore, UnavailableStore};
pub use tokio_util::sync::CancellationToken;
