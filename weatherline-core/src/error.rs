//! Error types for every layer, and the [`Failure`] taxonomy returned by the gateway.

use thiserror::Error;

/// Errors raised by a remote fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Provider returned {status_code}: {message}")]
    Api { status_code: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        FetchError::InvalidData(msg.into())
    }
}

/// Errors from the persistent key-value backing store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Value under '{key}' is not a {expected}")]
    TypeMismatch { key: String, expected: &'static str },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Errors from the cache store. A miss is not an error.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to encode cached record: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Coordinates out of range: ({latitude}, {longitude})")]
    InvalidCoordinates { latitude: f64, longitude: f64 },

    #[error("Location unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a failed [`WeatherGateway::resolve`](crate::WeatherGateway::resolve).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Failure {
    #[error("{message}")]
    Network { message: String },

    #[error("{message}")]
    Timeout { message: String },

    #[error("{message} (HTTP {status_code})")]
    Api { status_code: u16, message: String },

    #[error("{message}")]
    InvalidData { message: String },

    #[error("{message}")]
    Cache { message: String },

    #[error("{message}")]
    Generic { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Timeout,
    Api,
    InvalidData,
    Cache,
    Generic,
}

impl Failure {
    pub fn message(&self) -> &str {
        match self {
            Failure::Network { message }
            | Failure::Timeout { message }
            | Failure::Api { message, .. }
            | Failure::InvalidData { message }
            | Failure::Cache { message }
            | Failure::Generic { message } => message,
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Failure::Network { .. } => FailureKind::Network,
            Failure::Timeout { .. } => FailureKind::Timeout,
            Failure::Api { .. } => FailureKind::Api,
            Failure::InvalidData { .. } => FailureKind::InvalidData,
            Failure::Cache { .. } => FailureKind::Cache,
            Failure::Generic { .. } => FailureKind::Generic,
        }
    }
}

impl From<FetchError> for Failure {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout(message) => Failure::Timeout { message },
            FetchError::Api { status_code, message } => Failure::Api { status_code, message },
            FetchError::Network(message) => Failure::Network { message },
            FetchError::Cancelled => Failure::Network { message: "Request cancelled".to_string() },
            FetchError::InvalidData(message) => Failure::InvalidData { message },
            FetchError::Other(message) => Failure::Generic { message },
        }
    }
}

impl From<CacheError> for Failure {
    fn from(err: CacheError) -> Self {
        Failure::Cache { message: err.to_string() }
    }
}

impl From<LocationError> for Failure {
    fn from(err: LocationError) -> Self {
        Failure::Generic { message: err.to_string() }
    }
}
