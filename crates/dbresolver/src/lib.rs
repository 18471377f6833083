//! Read/write-splitting SQL router.
//!
//! A [`resolver::Resolver`] sits between application code and a primary
//! (read+write) database handle plus zero or more read-only replicas. It
//! decides per call whether to route to the primary or a replica, guards
//! each replica with a [`circuit_breaker::CircuitBreaker`], falls back to
//! the primary when a replica is unhealthy or fails, and exposes
//! aggregate [`stats::Statistics`] plus tracing of its routing decisions.
//!
//! Build one with [`provider::Provider::connect`]:
//!
//! ```ignore
//! let config = config::ResolverConfig::from_env()?;
//! let resolver = provider::Provider::connect(&config, Some(primary_pool), replica_pools)?;
//! let ctx = context::RequestContext::new().with_method("GET").with_path("/items");
//! let rows = resolver.query(&ctx, |pool| async move { /* ... */ }).await?;
//! ```

pub mod circuit_breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod pg;
pub mod provider;
pub mod resolver;
pub mod stats;
pub mod strategy;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use config::{ResolverConfig, StrategyKind};
pub use context::{PrimaryRoutes, RequestContext};
pub use error::{ResolverError, Result};
pub use handle::{DbHandle, HealthRecord};
pub use provider::Provider;
pub use resolver::{ReplicaSlot, Resolver, ResolverHealth, Target};
pub use stats::{Counter, StatsSnapshot, Statistics};
pub use strategy::Strategy;
