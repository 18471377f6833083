//! Builds a configured [`Resolver`] from a [`ResolverConfig`] plus an
//! already-constructed primary handle and replica handles.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;

use crate::circuit_breaker::CircuitBreaker;
use crate::config::ResolverConfig;
use crate::context::PrimaryRoutes;
use crate::error::{ResolverError, Result};
use crate::handle::DbHandle;
use crate::resolver::{ReplicaSlot, Resolver};
use crate::strategy;

static METRICS_REGISTERED: OnceCell<()> = OnceCell::new();

/// Factory that assembles a [`Resolver`] from configuration plus
/// caller-constructed database handles. Mirrors the "everything but the
/// driver and the replica-connection factory is ours" split described in
/// the purpose/scope section: the provider never opens a connection
/// itself, it only wires together handles the caller already has.
pub struct Provider;

impl Provider {
    /// Construct a resolver. Rejects an absent primary with
    /// [`ResolverError::PrimaryNil`] — modeled here as `Option<P>` since
    /// Rust has no nullable-pointer default; callers that always have a
    /// primary in hand may use [`Provider::connect_with`] instead.
    pub fn connect<P: DbHandle>(
        config: &ResolverConfig,
        primary: Option<P>,
        replicas: Vec<P>,
    ) -> Result<Arc<Resolver<P>>> {
        let primary = primary.ok_or(ResolverError::PrimaryNil)?;
        Self::connect_with(config, primary, replicas)
    }

    /// Construct a resolver from a primary that is known to exist.
    pub fn connect_with<P: DbHandle>(
        config: &ResolverConfig,
        primary: P,
        replicas: Vec<P>,
    ) -> Result<Arc<Resolver<P>>> {
        Self::register_metrics();

        let timeout = Duration::from_secs(config.timeout_secs);
        let slots: Vec<ReplicaSlot<P>> = replicas
            .into_iter()
            .enumerate()
            .map(|(index, db)| ReplicaSlot {
                db,
                breaker: CircuitBreaker::new(config.max_failures, timeout),
                index,
            })
            .collect();

        let strategy = strategy::from_name::<P>(config.strategy.as_str());
        let primary_routes = PrimaryRoutes::from_routes(&config.primary_routes);

        Ok(Resolver::new(
            primary,
            slots,
            strategy,
            primary_routes,
            config.read_fallback,
        ))
    }

    fn register_metrics() {
        METRICS_REGISTERED.get_or_init(|| {
            metrics::describe_histogram!(
                "dbresolver_query_duration",
                metrics::Unit::Microseconds,
                "Duration of a resolver-routed database query"
            );
            metrics::describe_gauge!(
                "dbresolver_primary_reads",
                "Cumulative reads routed to the primary"
            );
            metrics::describe_gauge!(
                "dbresolver_primary_writes",
                "Cumulative writes routed to the primary"
            );
            metrics::describe_gauge!(
                "dbresolver_replica_reads",
                "Cumulative reads routed to a replica"
            );
            metrics::describe_gauge!(
                "dbresolver_fallbacks",
                "Cumulative reads that fell back to the primary"
            );
            metrics::describe_gauge!(
                "dbresolver_failures",
                "Cumulative replica query failures"
            );
        });
    }
}
