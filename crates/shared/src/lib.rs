//! Shared library for the dbresolver demo services
//!
//! This crate provides common functionality used by the gateway binary:
//! - Database connection pooling (primary pool + replica pool factory)
//! - Error handling types
//! - Configuration management
//! - Logging infrastructure

pub mod config;
pub mod db;
pub mod error;

// Re-export commonly used types
pub use config::Config;
pub use db::DbPool;
pub use error::{Error, Result};

/// Initialize tracing subscriber for structured logging
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shared=debug,api_gateway=debug,dbresolver=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
