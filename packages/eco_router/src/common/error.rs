//! Error types for each stage of the engine. Missing map data is never an
//! error (defaults are applied instead), and cache failures are logged and
//! swallowed, so neither appears here as something a caller must handle.

use std::path::PathBuf;

use thiserror::Error;

/// Outcomes of a routing request which do not produce a route
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RoutingError {
    /// The requested origin or destination is not a node in the graph
    #[error("node {id} is not part of the road graph")]
    UnknownNode { id: i64 },

    /// The graph topology offers no way from origin to destination
    #[error("no path found between {origin} and {destination}")]
    NoPathFound { origin: i64, destination: i64 },
}

/// Raised when the road graph is mutated in a way it does not support
#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("elevations have already been assigned to this graph")]
    ElevationsAlreadyAssigned,
}

/// Failures reported by the external map, elevation and geocoding
/// collaborators
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// The upstream service answered, but not with anything usable
    #[error("upstream provider failed: {message}")]
    Upstream { message: String },

    #[error("no result for {query}")]
    NotFound { query: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Raised while reading settings from the environment or converting a user
/// request into engine types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {field}")]
    InvalidValue { field: &'static str, value: String },

    #[error("{field} must be set")]
    Missing { field: &'static str },

    #[error("failed to read cost tables from {path}: {source}")]
    CostTables {
        path: PathBuf,
        #[source]
        source: ProviderError,
    },
}

/// Internal failures of the value cache. These never leave the cache module;
/// they are logged and treated as a miss.
#[derive(Debug, Error)]
pub(crate) enum CacheError {
    #[error("dataset name '{0}' may only contain ASCII letters, digits, '_' and '-'")]
    InvalidDataset(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<tempfile::PersistError> for CacheError {
    fn from(err: tempfile::PersistError) -> Self {
        CacheError::Io(err.error)
    }
}
