//! Error types for the resolver

use thiserror::Error;

/// Result type alias using the resolver's error type
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Resolver error types
#[derive(Debug, Error)]
pub enum ResolverError {
    /// Raised by the builder when asked to construct a resolver without a usable primary.
    #[error("primary database handle is required")]
    PrimaryNil,

    /// A read found no healthy replica and `read_fallback` is disabled.
    #[error("replica query failed and fallback to primary is disabled")]
    ReplicaFailedNoFallback,

    /// Any error surfaced by the underlying database, passed through unchanged.
    #[error("database error: {0}")]
    Database(String),

    /// Resolver/replica configuration could not be parsed or was out of range.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ResolverError {
    /// Wrap an arbitrary upstream error as a passthrough database error.
    pub fn database(msg: impl std::fmt::Display) -> Self {
        Self::Database(msg.to_string())
    }

    /// Create a Config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<sqlx::Error> for ResolverError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err.to_string())
    }
}
