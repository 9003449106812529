//! Chooses between the remote fetcher and the local cache for each query.
//!
//! Online: always fetch, cache the result on success, and surface fetch
//! failures as they are (no cache fallback). Offline: serve a cache entry
//! that has not expired, or fail with [`Failure::Network`].

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::{
    cache::WeatherCache,
    connectivity::Connectivity,
    error::Failure,
    location::LocationSource,
    model::{Query, WeatherRecord},
    provider::WeatherFetcher,
};

#[derive(Debug, Clone)]
pub struct WeatherGateway {
    fetcher: Arc<dyn WeatherFetcher>,
    cache: WeatherCache,
    connectivity: Arc<dyn Connectivity>,
}

impl WeatherGateway {
    pub fn new(
        fetcher: Arc<dyn WeatherFetcher>,
        cache: WeatherCache,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self { fetcher, cache, connectivity }
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    pub async fn resolve(&self, query: &Query) -> Result<WeatherRecord, Failure> {
        self.resolve_with_cancel(query, CancellationToken::new()).await
    }

    /// Like [`resolve`](Self::resolve), but the outbound request can be
    /// cancelled. Cancellation does not reach the cache write once the
    /// fetch has completed.
    #[instrument(skip(self, cancel), fields(key = %query.cache_key()))]
    pub async fn resolve_with_cancel(
        &self,
        query: &Query,
        cancel: CancellationToken,
    ) -> Result<WeatherRecord, Failure> {
        let key = query.cache_key();

        if self.connectivity.is_connected().await {
            debug!("online, fetching");
            self.fetch_and_cache(query, &key, &cancel).await
        } else {
            debug!("offline, consulting cache");
            self.from_cache(&key).await
        }
    }

    /// Resolve the weather at the position reported by `location`.
    pub async fn resolve_current_location(
        &self,
        location: &dyn LocationSource,
    ) -> Result<WeatherRecord, Failure> {
        let coordinates = location.current_coordinates().await?;
        self.resolve(&Query::from(coordinates)).await
    }

    async fn fetch_and_cache(
        &self,
        query: &Query,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<WeatherRecord, Failure> {
        let record = match self.fetcher.fetch(query, cancel).await {
            Ok(record) => record,
            Err(e) => {
                debug!(error = %e, "fetch failed");
                return Err(e.into());
            }
        };

        if let Err(e) = self.cache.write(key, &record).await {
            warn!(error = %e, "failed to cache weather record");
        }

        Ok(record)
    }

    async fn from_cache(&self, key: &str) -> Result<WeatherRecord, Failure> {
        match self.cache.read_valid(key).await {
            Ok(Some(record)) => {
                debug!("serving cached record");
                Ok(record)
            }
            Ok(None) => Err(Failure::Network {
                message: "No internet connection and no cached weather data available".to_string(),
            }),
            Err(e) => {
                warn!(error = %e, "failed to read weather cache");
                Err(e.into())
            }
        }
    }
}
