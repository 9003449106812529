use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};
use tokio_util::sync::CancellationToken;

use crate::{Config, error::FetchError, model::{Query, WeatherRecord}};

pub mod openweather;

pub use openweather::{OpenWeatherFetcher, parse_current_weather};

/// A remote source of current-weather records.
///
/// Each call issues a single request. Cancelling `cancel` aborts an
/// in-flight request with [`FetchError::Cancelled`].
#[async_trait]
pub trait WeatherFetcher: Send + Sync + Debug {
    async fn fetch_by_coordinates(
        &self,
        latitude: f64,
        longitude: f64,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, FetchError>;

    async fn fetch_by_city(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, FetchError>;

    async fn fetch(
        &self,
        query: &Query,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, FetchError> {
        match query {
            Query::ByCoordinates { latitude, longitude } => {
                self.fetch_by_coordinates(*latitude, *longitude, cancel).await
            }
            Query::ByCity { name } => self.fetch_by_city(name, cancel).await,
        }
    }
}

/// Fetcher used when the real one cannot be built (e.g. no API key).
///
/// Every request fails with [`FetchError::Other`] carrying `reason`, so
/// offline lookups that never reach the fetcher still work.
#[derive(Debug, Clone)]
pub struct UnconfiguredFetcher {
    reason: String,
}

impl UnconfiguredFetcher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl WeatherFetcher for UnconfiguredFetcher {
    async fn fetch_by_coordinates(
        &self,
        _latitude: f64,
        _longitude: f64,
        _cancel: &CancellationToken,
    ) -> Result<WeatherRecord, FetchError> {
        Err(FetchError::Other(self.reason.clone()))
    }

    async fn fetch_by_city(
        &self,
        _name: &str,
        _cancel: &CancellationToken,
    ) -> Result<WeatherRecord, FetchError> {
        Err(FetchError::Other(self.reason.clone()))
    }
}

/// Construct the OpenWeather fetcher from config.
pub fn fetcher_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherFetcher>> {
    let fetcher = OpenWeatherFetcher::new(config.fetcher_settings()?)?;
    Ok(Arc::new(fetcher))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetcher_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = fetcher_from_config(&cfg).unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("No API key configured"));
        assert!(msg.contains("Hint: run `weatherline configure`"));
    }

    #[tokio::test]
    async fn unconfigured_fetcher_reports_reason() {
        let fetcher = UnconfiguredFetcher::new("No API key configured");
        let err = fetcher.fetch(&Query::city("London"), &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, FetchError::Other(ref msg) if msg == "No API key configured"));
    }

    #[test]
    fn fetcher_from_config_works_when_key_set() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".to_string());

        assert!(fetcher_from_config(&cfg).is_ok());
    }
}
