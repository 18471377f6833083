//! The minimal capability a concrete database pool type must provide to be
//! used as the resolver's primary or replica handle.
//!
//! Query-shaped operations (`query`/`query_row`/`exec`/`select`/`prepare`/
//! `begin`) are *not* part of this trait — they are generic methods on
//! [`crate::resolver::Resolver`] taking caller-supplied closures over `P`
//! directly, since their result types vary per call site. This trait covers
//! only the fixed, non-generic surface: health reporting, shutdown, and
//! dialect identification.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Health status of a single database handle.
#[derive(Debug, Clone, Serialize)]
pub struct HealthRecord {
    pub status: String,
    pub detail: Option<String>,
}

impl HealthRecord {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            detail: None,
        }
    }

    pub fn unhealthy(detail: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            detail: Some(detail.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Capability required of any type used as a resolver's primary/replica
/// handle. Implemented for `sqlx::PgPool` in [`crate::pg`]; tests implement
/// it for an in-memory mock so the routing core needs no live database.
#[async_trait]
pub trait DbHandle: Clone + Send + Sync + 'static {
    async fn health_check(&self) -> HealthRecord;
    async fn close(&self) -> Result<()>;
    fn dialect(&self) -> &'static str;
}
