//! Adapter wiring `sqlx::PgPool` up as a resolver [`DbHandle`]. This is the
//! only module in this crate that knows about a concrete SQL driver; the
//! rest of the resolver only ever sees the `DbHandle` trait.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::Result;
use crate::handle::{DbHandle, HealthRecord};

#[async_trait]
impl DbHandle for PgPool {
    async fn health_check(&self) -> HealthRecord {
        match sqlx::query("SELECT 1").execute(self).await {
            Ok(_) => HealthRecord::healthy(),
            Err(err) => HealthRecord::unhealthy(err.to_string()),
        }
    }

    async fn close(&self) -> Result<()> {
        PgPool::close(self).await;
        Ok(())
    }

    fn dialect(&self) -> &'static str {
        "postgres"
    }
}
