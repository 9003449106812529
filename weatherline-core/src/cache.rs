//! Time-bounded cache of weather records on top of a [`KeyValueStore`].
//!
//! Each entry is two store keys: the record encoded as JSON, and the write
//! time in epoch milliseconds. Expiry is judged lazily at read time.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock},
    error::CacheError,
    model::{CacheEntry, WeatherRecord},
    storage::KeyValueStore,
};

/// Entries at least this many minutes old are no longer valid.
pub const CACHE_EXPIRATION_MINUTES: i64 = 30;

const RECORD_PREFIX: &str = "weather_cache:";
const TIME_PREFIX: &str = "weather_cache_time:";

#[derive(Debug, Clone)]
pub struct WeatherCache {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    expiration: Duration,
}

impl WeatherCache {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock, expiration: Duration::minutes(CACHE_EXPIRATION_MINUTES) }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Store `record` under `key`, stamped with the current time.
    /// Any previous entry for the key is replaced.
    pub async fn write(&self, key: &str, record: &WeatherRecord) -> Result<(), CacheError> {
        let json = serde_json::to_string(record)?;
        let stored_at = self.clock.now().timestamp_millis();

        self.store.set_string(&record_key(key), json).await?;
        if let Err(e) = self.store.set_int(&time_key(key), stored_at).await {
            // a record must never pair with an older entry's timestamp
            if let Err(cleanup) = self.store.remove(&record_key(key)).await {
                tracing::warn!(key, error = %cleanup, "failed to drop unstamped weather record");
            }
            return Err(e.into());
        }

        tracing::debug!(key, stored_at, "cached weather record");
        Ok(())
    }

    /// The record under `key` if it is younger than the expiration window.
    pub async fn read_valid(&self, key: &str) -> Result<Option<WeatherRecord>, CacheError> {
        match self.entry(key).await? {
            Some(entry) if self.is_fresh(entry.stored_at) => Ok(Some(entry.record)),
            Some(entry) => {
                tracing::debug!(key, stored_at = %entry.stored_at, "cached weather record expired");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// The record under `key` regardless of age.
    pub async fn read_stale(&self, key: &str) -> Result<Option<WeatherRecord>, CacheError> {
        let Some(json) = self.store.get_string(&record_key(key)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Whether a timestamped entry exists under `key` and has not expired.
    pub async fn is_valid(&self, key: &str) -> Result<bool, CacheError> {
        if self.store.get_string(&record_key(key)).await?.is_none() {
            return Ok(false);
        }
        Ok(self.stored_at(key).await?.is_some_and(|t| self.is_fresh(t)))
    }

    /// Record plus write time. Entries without a timestamp are not reported.
    pub async fn entry(&self, key: &str) -> Result<Option<CacheEntry>, CacheError> {
        let Some(stored_at) = self.stored_at(key).await? else {
            return Ok(None);
        };
        let Some(record) = self.read_stale(key).await? else {
            return Ok(None);
        };
        Ok(Some(CacheEntry { key: key.to_string(), record, stored_at }))
    }

    pub async fn evict(&self, key: &str) -> Result<(), CacheError> {
        self.store.remove(&record_key(key)).await?;
        self.store.remove(&time_key(key)).await?;
        tracing::debug!(key, "evicted cached weather record");
        Ok(())
    }

    /// Remove every cache entry. Unrelated keys in the store are left alone.
    pub async fn clear_all(&self) -> Result<(), CacheError> {
        let keys = self.store.keys().await?;
        let mut removed = 0usize;
        for key in keys
            .iter()
            .filter(|k| k.starts_with(RECORD_PREFIX) || k.starts_with(TIME_PREFIX))
        {
            self.store.remove(key).await?;
            removed += 1;
        }
        tracing::debug!(removed, "cleared weather cache");
        Ok(())
    }

    /// Query keys that currently have a cached record.
    pub async fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys: Vec<String> = self
            .store
            .keys()
            .await?
            .into_iter()
            .filter_map(|k| k.strip_prefix(RECORD_PREFIX).map(str::to_string))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn stored_at(&self, key: &str) -> Result<Option<DateTime<Utc>>, CacheError> {
        let millis = self.store.get_int(&time_key(key)).await?;
        Ok(millis.and_then(DateTime::from_timestamp_millis))
    }

    fn is_fresh(&self, stored_at: DateTime<Utc>) -> bool {
        self.clock.now() - stored_at < self.expiration
    }
}

fn record_key(key: &str) -> String {
    format!("{RECORD_PREFIX}{key}")
}

fn time_key(key: &str) -> String {
    format!("{TIME_PREFIX}{key}")
}
