use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::LocationError;

/// Icon used when the provider omits one ("clear sky, day").
pub const DEFAULT_ICON: &str = "01d";

/// Where to look up the weather.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    ByCoordinates { latitude: f64, longitude: f64 },
    ByCity { name: String },
}

impl Query {
    pub fn coordinates(latitude: f64, longitude: f64) -> Self {
        Query::ByCoordinates { latitude, longitude }
    }

    pub fn city(name: impl Into<String>) -> Self {
        Query::ByCity { name: name.into() }
    }

    /// Cache slot for this query.
    ///
    /// Coordinate and city queries for the same place produce different keys.
    pub fn cache_key(&self) -> String {
        match self {
            Query::ByCoordinates { latitude, longitude } => format!("{latitude}_{longitude}"),
            Query::ByCity { name } => name.clone(),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::ByCoordinates { latitude, longitude } => write!(f, "({latitude}, {longitude})"),
            Query::ByCity { name } => f.write_str(name),
        }
    }
}

impl From<Coordinates> for Query {
    fn from(c: Coordinates) -> Self {
        Query::coordinates(c.latitude, c.longitude)
    }
}

/// A validated latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::InvalidCoordinates { latitude, longitude });
        }
        Ok(Self { latitude, longitude })
    }
}

/// Canonical current-weather observation.
///
/// Only built by parsing a provider response, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub id: i64,
    pub city: String,
    pub country: String,
    pub latitude: f64,
    pub longitude: f64,
    pub temperature: f64,
    pub feels_like: f64,
    pub min_temperature: f64,
    pub max_temperature: f64,
    /// Relative humidity, percent.
    pub humidity: u8,
    /// hPa.
    pub pressure: f64,
    /// m/s.
    pub wind_speed: f64,
    /// Cloud cover, percent.
    pub cloudiness: u8,
    /// Meters.
    pub visibility: u32,
    pub description: String,
    pub condition_main: String,
    pub icon_code: String,
    /// Unix seconds.
    pub sunrise: i64,
    /// Unix seconds.
    pub sunset: i64,
    pub observed_at: DateTime<Utc>,
}

/// A cached record together with the time it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub record: WeatherRecord,
    pub stored_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) fn sample_record() -> WeatherRecord {
    use chrono::TimeZone;

    WeatherRecord {
        id: 2643743,
        city: "London".into(),
        country: "GB".into(),
        latitude: 51.5,
        longitude: -0.12,
        temperature: 15.0,
        feels_like: 14.2,
        min_temperature: 13.9,
        max_temperature: 16.1,
        humidity: 72,
        pressure: 1012.0,
        wind_speed: 4.1,
        cloudiness: 20,
        visibility: 10000,
        description: "clear sky".into(),
        condition_main: "Clear".into(),
        icon_code: "01d".into(),
        sunrise: 1_700_000_000,
        sunset: 1_700_030_000,
        observed_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
    }
}
