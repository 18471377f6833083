//! The resolver: classifies each call, selects a target, records outcomes,
//! falls back, and periodically publishes stats as gauges.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::circuit_breaker::CircuitBreaker;
use crate::context::{PrimaryRoutes, RequestContext};
use crate::error::{ResolverError, Result};
use crate::handle::{DbHandle, HealthRecord};
use crate::stats::{Counter, StatsSnapshot, Statistics};
use crate::strategy::Strategy;

const PUBLISH_INTERVAL: Duration = Duration::from_secs(30);

/// The query-method label used in tracing spans, the duration histogram,
/// and the `target` label on the same histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Primary,
    Replica,
    PrimaryFallback,
    ReplicaFailed,
}

impl Target {
    fn as_str(self) -> &'static str {
        match self {
            Target::Primary => "primary",
            Target::Replica => "replica",
            Target::PrimaryFallback => "primary-fallback",
            Target::ReplicaFailed => "replica-failed",
        }
    }
}

/// A replica plus its circuit breaker and stable index. Created once at
/// construction; only the breaker's internal state changes afterward.
pub struct ReplicaSlot<P> {
    pub db: P,
    pub breaker: CircuitBreaker,
    pub index: usize,
}

/// Per-replica health detail reported by [`Resolver::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaHealth {
    pub index: usize,
    pub circuit_state: String,
    pub failures: u32,
    #[serde(flatten)]
    pub record: HealthRecord,
}

/// Aggregate health payload: status mirrors the primary's, with per-replica
/// detail and a statistics snapshot alongside.
#[derive(Debug, Clone, Serialize)]
pub struct ResolverHealth {
    pub status: String,
    pub primary: HealthRecord,
    pub replicas: Vec<ReplicaHealth>,
    pub stats: StatsSnapshot,
}

/// Read/write-splitting SQL router.
///
/// Generic over the database handle type `P` so the routing, breaker,
/// strategy, and statistics logic can be exercised against an in-memory
/// mock in tests — the concrete `sqlx::PgPool` wiring lives in
/// [`crate::pg`] and never needs to be touched to unit test this type.
pub struct Resolver<P: DbHandle> {
    primary: P,
    replicas: Vec<ReplicaSlot<P>>,
    strategy: Box<dyn Strategy<P>>,
    stats: Arc<Statistics>,
    primary_routes: PrimaryRoutes,
    read_fallback: bool,
    cancel: CancellationToken,
    closed: AtomicBool,
    publisher: AsyncMutex<Option<JoinHandle<()>>>,
}

impl<P: DbHandle> Resolver<P> {
    /// Assembles a resolver and spawns its background gauge publisher. Used
    /// by [`crate::provider::Provider`]; not normally called directly.
    pub(crate) fn new(
        primary: P,
        replicas: Vec<ReplicaSlot<P>>,
        strategy: Box<dyn Strategy<P>>,
        primary_routes: PrimaryRoutes,
        read_fallback: bool,
    ) -> Arc<Self> {
        let resolver = Arc::new(Self {
            primary,
            replicas,
            strategy,
            stats: Arc::new(Statistics::new()),
            primary_routes,
            read_fallback,
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            publisher: AsyncMutex::new(None),
        });
        let handle = resolver.clone().spawn_publisher();
        // SAFETY-free: no await here, a blocking lock suffices for a single
        // write immediately after construction.
        if let Ok(mut guard) = resolver.publisher.try_lock() {
            *guard = Some(handle);
        }
        resolver
    }

    fn spawn_publisher(self: Arc<Self>) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(PUBLISH_INTERVAL);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.publish_gauges();
                    }
                }
            }
        })
    }

    fn publish_gauges(&self) {
        let snap = self.stats.snapshot();
        metrics::gauge!("dbresolver_primary_reads").set(snap.primary_reads as f64);
        metrics::gauge!("dbresolver_primary_writes").set(snap.primary_writes as f64);
        metrics::gauge!("dbresolver_replica_reads").set(snap.replica_reads as f64);
        metrics::gauge!("dbresolver_fallbacks").set(snap.primary_fallbacks as f64);
        metrics::gauge!("dbresolver_failures").set(snap.replica_failures as f64);
    }

    /// Decide whether a read should attempt a replica at all.
    fn should_use_replica(&self, ctx: &RequestContext) -> bool {
        if self.replicas.is_empty() {
            return false;
        }
        if let Some(path) = &ctx.request_path {
            if self.primary_routes.is_primary_route(path) {
                return false;
            }
        }
        match &ctx.http_method {
            None => false,
            Some(method) => matches!(method.to_ascii_uppercase().as_str(), "GET" | "HEAD" | "OPTIONS"),
        }
    }

    /// Filter to currently-healthy slots, then ask the strategy to pick one
    /// by index into that filtered list. The chosen index identifies the
    /// slot directly — no secondary "locate the matching slot" step is
    /// needed, since the strategy returns a position rather than a value.
    fn select_healthy_replica(&self) -> Option<&ReplicaSlot<P>> {
        if self.replicas.is_empty() {
            return None;
        }
        let healthy: Vec<&ReplicaSlot<P>> = self
            .replicas
            .iter()
            .filter(|slot| slot.breaker.allow_request())
            .collect();
        if healthy.is_empty() {
            return None;
        }
        let handles: Vec<P> = healthy.iter().map(|slot| slot.db.clone()).collect();
        let idx = self.strategy.choose(&handles).ok()?;
        healthy.into_iter().nth(idx)
    }

    async fn run_on_primary<F, Fut, T>(&self, op: F, counter: Counter) -> Result<T>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.stats.add(Counter::TotalQueries);
        self.stats.add(counter);
        op(self.primary.clone()).await
    }

    /// Shared read-routing protocol used by `query` and `select`. `label`
    /// is the method name used in the tracing span and histogram
    /// (`"query"` or `"select"`).
    ///
    /// The span does not carry a `dbresolver.query` attribute: `op` is a
    /// generic closure over `P`, so the resolver never sees the SQL text
    /// being executed. See DESIGN.md's REDESIGN FLAGS for why that's an
    /// accepted consequence of the generic-closure routing design.
    async fn read_op<F, Fut, T>(&self, ctx: &RequestContext, label: &'static str, op: F) -> Result<T>
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = tracing::info_span!(
            "dbresolver-query",
            dbresolver.method = label,
            dbresolver.is_read = true,
            dbresolver.target = tracing::field::Empty,
            dbresolver.duration = tracing::field::Empty,
        );
        let _enter = span.enter();
        let start = Instant::now();
        self.stats.add(Counter::TotalQueries);

        let use_replica = self.should_use_replica(ctx);

        if use_replica {
            if let Some(slot) = self.select_healthy_replica() {
                match op(slot.db.clone()).await {
                    Ok(value) => {
                        self.stats.add(Counter::ReplicaReads);
                        slot.breaker.record_success();
                        self.record_duration(&span, label, Target::Replica, start);
                        return Ok(value);
                    }
                    Err(err) => {
                        slot.breaker.record_failure();
                        self.stats.add(Counter::ReplicaFailures);
                        tracing::error!(slot = slot.index, error = %err, "replica query failed");
                        return self.fallback(&span, ctx, label, op, start).await;
                    }
                }
            }
            tracing::warn!("No healthy replica available, falling back to primary");
            return self.fallback(&span, ctx, label, op, start).await;
        }

        let result = op(self.primary.clone()).await;
        self.stats.add(Counter::PrimaryReads);
        self.record_duration(&span, label, Target::Primary, start);
        result
    }

    async fn fallback<F, Fut, T>(
        &self,
        span: &tracing::Span,
        _ctx: &RequestContext,
        label: &'static str,
        op: F,
        start: Instant,
    ) -> Result<T>
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.read_fallback {
            self.record_duration(span, label, Target::ReplicaFailed, start);
            return Err(ResolverError::ReplicaFailedNoFallback);
        }
        self.stats.add(Counter::PrimaryFallbacks);
        self.stats.add(Counter::PrimaryReads);
        tracing::warn!("falling back to primary after replica failure");
        let result = op(self.primary.clone()).await;
        self.record_duration(span, label, Target::PrimaryFallback, start);
        result
    }

    /// Records the computable span attributes (`dbresolver.target`,
    /// `dbresolver.duration`) and the duration histogram in one place, so
    /// every return path reports both consistently.
    fn record_duration(&self, span: &tracing::Span, method: &'static str, target: Target, start: Instant) {
        let micros = start.elapsed().as_micros() as f64;
        span.record("dbresolver.target", target.as_str());
        span.record("dbresolver.duration", micros);
        metrics::histogram!(
            "dbresolver_query_duration",
            "method" => method,
            "target" => target.as_str(),
        )
        .record(micros);
    }

    /// Read that returns a value, e.g. a decoded row set. Routed per the
    /// read protocol in the spec: replica on success, single-level fallback
    /// to primary on replica failure or replica unavailability.
    pub async fn query<F, Fut, T>(&self, ctx: &RequestContext, op: F) -> Result<T>
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.read_op(ctx, "query", op).await
    }

    /// Scan-style convenience read with the same routing as `query`, but
    /// labeled `"select"` for tracing/metrics.
    pub async fn select<F, Fut, T>(&self, ctx: &RequestContext, op: F) -> Result<T>
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.read_op(ctx, "select", op).await
    }

    /// Best-effort single-row read. Unlike `query`, a later failure while
    /// reading the row (e.g. during `.try_get`) cannot be observed here, so
    /// the breaker is never driven by this path's outcome — only by
    /// replica *unavailability* at selection time, not query success.
    pub async fn query_row<F, Fut, T>(&self, ctx: &RequestContext, op: F) -> Result<T>
    where
        F: Fn(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = tracing::info_span!(
            "dbresolver-query-row",
            dbresolver.method = "query-row",
            dbresolver.is_read = true,
            dbresolver.target = tracing::field::Empty,
            dbresolver.duration = tracing::field::Empty,
        );
        let _enter = span.enter();
        let start = Instant::now();
        self.stats.add(Counter::TotalQueries);

        if self.should_use_replica(ctx) {
            if let Some(slot) = self.select_healthy_replica() {
                self.stats.add(Counter::ReplicaReads);
                self.record_duration(&span, "query-row", Target::Replica, start);
                return op(slot.db.clone()).await;
            }
        }

        self.stats.add(Counter::PrimaryReads);
        self.record_duration(&span, "query-row", Target::Primary, start);
        op(self.primary.clone()).await
    }

    /// Write-style operation: always primary, never subject to routing.
    pub async fn exec<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let span = tracing::info_span!(
            "dbresolver-exec",
            dbresolver.method = "exec",
            dbresolver.is_read = false,
            dbresolver.target = tracing::field::Empty,
            dbresolver.duration = tracing::field::Empty,
        );
        let _enter = span.enter();
        let start = Instant::now();
        let result = self.run_on_primary(op, Counter::PrimaryWrites).await;
        self.record_duration(&span, "exec", Target::Primary, start);
        result
    }

    /// Prepared statements always go to primary (§1 non-goal: no
    /// cross-node statement management).
    pub async fn prepare<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_on_primary(op, Counter::PrimaryWrites).await
    }

    /// Transactions always go to primary (§1 non-goal: no cross-node
    /// transaction management).
    pub async fn begin<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce(P) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_on_primary(op, Counter::PrimaryWrites).await
    }

    /// Dialect of the underlying driver, passed through from the primary.
    pub fn dialect(&self) -> &'static str {
        self.primary.dialect()
    }

    /// Aggregate health of the primary and every replica, plus a
    /// statistics snapshot. The aggregate status equals the primary's.
    pub async fn health_check(&self) -> ResolverHealth {
        let primary = self.primary.health_check().await;
        let status = primary.status.clone();
        let mut replicas = Vec::with_capacity(self.replicas.len());
        for slot in &self.replicas {
            let record = slot.db.health_check().await;
            replicas.push(ReplicaHealth {
                index: slot.index,
                circuit_state: slot.breaker.state().to_string(),
                failures: slot.breaker.failures(),
                record,
            });
        }
        ResolverHealth {
            status,
            primary,
            replicas,
            stats: self.stats.snapshot(),
        }
    }

    /// Stop the background publisher (once) and close the primary and every
    /// replica handle, returning the last error encountered while closing.
    /// Calling `close` a second time is a no-op returning `Ok(())`.
    pub async fn close(&self) -> Result<()> {
        if self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(());
        }

        self.cancel.cancel();
        if let Some(handle) = self.publisher.lock().await.take() {
            let _ = handle.await;
        }

        let mut last_err = None;
        if let Err(err) = self.primary.close().await {
            last_err = Some(err);
        }
        for slot in &self.replicas {
            if let Err(err) = slot.db.close().await {
                last_err = Some(err);
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::strategy::RoundRobin;
    use std::sync::atomic::AtomicUsize;

    #[derive(Clone)]
    struct MockPool {
        name: &'static str,
        healthy: bool,
        fail_query: Arc<AtomicBool>,
        calls: Arc<AtomicUsize>,
    }

    impl MockPool {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                healthy: true,
                fail_query: Arc::new(AtomicBool::new(false)),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing(mut self) -> Self {
            self.fail_query.store(true, Ordering::SeqCst);
            self
        }
    }

    #[async_trait::async_trait]
    impl DbHandle for MockPool {
        async fn health_check(&self) -> HealthRecord {
            if self.healthy {
                HealthRecord::healthy()
            } else {
                HealthRecord::unhealthy("down")
            }
        }
        async fn close(&self) -> Result<()> {
            Ok(())
        }
        fn dialect(&self) -> &'static str {
            "mock"
        }
    }

    fn make_resolver(
        primary: MockPool,
        replicas: Vec<MockPool>,
        read_fallback: bool,
    ) -> Arc<Resolver<MockPool>> {
        let slots = replicas
            .into_iter()
            .enumerate()
            .map(|(index, db)| ReplicaSlot {
                db,
                breaker: CircuitBreaker::with_defaults(),
                index,
            })
            .collect();
        Resolver::new(
            primary,
            slots,
            Box::new(RoundRobin::new()),
            PrimaryRoutes::from_routes(&[]),
            read_fallback,
        )
    }

    async fn ok_op(pool: MockPool) -> Result<&'static str> {
        pool.calls.fetch_add(1, Ordering::SeqCst);
        if pool.fail_query.load(Ordering::SeqCst) {
            Err(ResolverError::database("simulated replica failure"))
        } else {
            Ok(pool.name)
        }
    }

    #[tokio::test]
    async fn read_to_healthy_replica_succeeds() {
        let resolver = make_resolver(MockPool::new("primary"), vec![MockPool::new("replica-0")], true);
        let ctx = RequestContext::new().with_method("GET").with_path("/items");
        let result = resolver.query(&ctx, ok_op).await.unwrap();
        assert_eq!(result, "replica-0");
        let snap = resolver.stats().snapshot();
        assert_eq!(snap.total_queries, 1);
        assert_eq!(snap.replica_reads, 1);
        assert_eq!(snap.primary_reads, 0);
        assert_eq!(snap.primary_writes, 0);
        resolver.close().await.unwrap();
    }

    #[tokio::test]
    async fn read_falls_back_to_primary_on_replica_failure() {
        let resolver = make_resolver(
            MockPool::new("primary"),
            vec![MockPool::new("replica-0").failing()],
            true,
        );
        let ctx = RequestContext::new().with_method("GET").with_path("/items");
        let result = resolver.query(&ctx, ok_op).await.unwrap();
        assert_eq!(result, "primary");
        let snap = resolver.stats().snapshot();
        assert_eq!(snap.total_queries, 1);
        assert_eq!(snap.replica_failures, 1);
        assert_eq!(snap.primary_fallbacks, 1);
        assert_eq!(snap.primary_reads, 1);
        resolver.close().await.unwrap();
    }

    #[tokio::test]
    async fn write_always_goes_to_primary() {
        let resolver = make_resolver(MockPool::new("primary"), vec![MockPool::new("replica-0")], true);
        let result = resolver.exec(ok_op).await.unwrap();
        assert_eq!(result, "primary");
        let snap = resolver.stats().snapshot();
        assert_eq!(snap.total_queries, 1);
        assert_eq!(snap.primary_writes, 1);
        assert_eq!(snap.primary_reads, 0, "writes must never be counted as primary reads");
        resolver.close().await.unwrap();
    }

    #[tokio::test]
    async fn reads_routed_to_primary_never_count_as_writes() {
        // Regression test for the historical miscount documented in the
        // design notes: a read with no replicas configured must still land
        // in primary_reads, never primary_writes.
        let resolver = make_resolver(MockPool::new("primary"), vec![], true);
        let ctx = RequestContext::new().with_method("GET").with_path("/items");
        resolver.query(&ctx, ok_op).await.unwrap();
        let snap = resolver.stats().snapshot();
        assert_eq!(snap.primary_reads, 1);
        assert_eq!(snap.primary_writes, 0);
    }

    #[tokio::test]
    async fn explicit_primary_route_skips_replicas() {
        let resolver = Resolver::new(
            MockPool::new("primary"),
            vec![ReplicaSlot {
                db: MockPool::new("replica-0"),
                breaker: CircuitBreaker::with_defaults(),
                index: 0,
            }],
            Box::new(RoundRobin::new()),
            PrimaryRoutes::from_routes(&["/admin".to_string()]),
            true,
        );
        let ctx = RequestContext::new().with_method("GET").with_path("/admin");
        let result = resolver.query(&ctx, ok_op).await.unwrap();
        assert_eq!(result, "primary");
        resolver.close().await.unwrap();
    }

    #[tokio::test]
    async fn prefix_primary_route_skips_replicas() {
        let resolver = Resolver::new(
            MockPool::new("primary"),
            vec![ReplicaSlot {
                db: MockPool::new("replica-0"),
                breaker: CircuitBreaker::with_defaults(),
                index: 0,
            }],
            Box::new(RoundRobin::new()),
            PrimaryRoutes::from_routes(&["/api/write/*".to_string()]),
            true,
        );
        let ctx = RequestContext::new()
            .with_method("GET")
            .with_path("/api/write/order");
        let result = resolver.query(&ctx, ok_op).await.unwrap();
        assert_eq!(result, "primary");
        resolver.close().await.unwrap();
    }

    #[tokio::test]
    async fn zero_replicas_counts_as_primary_read_not_write() {
        let resolver = make_resolver(MockPool::new("primary"), vec![], true);
        let ctx = RequestContext::new().with_method("GET").with_path("/items");
        resolver.query(&ctx, ok_op).await.unwrap();
        let snap = resolver.stats().snapshot();
        assert_eq!(snap.primary_reads, 1);
        assert_eq!(snap.primary_fallbacks, 0);
        assert_eq!(snap.primary_writes, 0);
        resolver.close().await.unwrap();
    }

    #[tokio::test]
    async fn all_breakers_open_fallback_disabled_returns_fatal_error() {
        let replica = MockPool::new("replica-0");
        let resolver = Resolver::new(
            MockPool::new("primary"),
            vec![ReplicaSlot {
                db: replica,
                breaker: CircuitBreaker::new(1, Duration::from_secs(30)),
                index: 0,
            }],
            Box::new(RoundRobin::new()),
            PrimaryRoutes::from_routes(&[]),
            false,
        );
        // force the breaker open before issuing the read under test.
        resolver.replicas[0].breaker.record_failure();
        assert_eq!(
            resolver.replicas[0].breaker.state(),
            crate::circuit_breaker::CircuitState::Open
        );

        let ctx = RequestContext::new().with_method("GET").with_path("/items");
        let err = resolver.query(&ctx, ok_op).await.unwrap_err();
        assert!(matches!(err, ResolverError::ReplicaFailedNoFallback));
        assert_eq!(resolver.replicas[0].db.calls.load(Ordering::SeqCst), 0);
        resolver.close().await.unwrap();
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let resolver = make_resolver(MockPool::new("primary"), vec![MockPool::new("replica-0")], true);
        resolver.close().await.unwrap();
        resolver.close().await.unwrap();
    }

    #[tokio::test]
    async fn health_check_reports_primary_and_replica_state() {
        let resolver = make_resolver(MockPool::new("primary"), vec![MockPool::new("replica-0")], true);
        let health = resolver.health_check().await;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.replicas.len(), 1);
        assert_eq!(health.replicas[0].circuit_state, "CLOSED");
        resolver.close().await.unwrap();
    }
}
