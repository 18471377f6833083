//! API Gateway demo for the dbresolver read/write-splitting SQL router.
//!
//! Wires a [`dbresolver::Resolver`] around a primary `PgPool` and a set of
//! replica `PgPool`s, then serves a small REST API behind it: request
//! context middleware, a metrics scrape endpoint, and a health handler
//! that aggregates the resolver's own health check.

use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dbresolver::{Provider, ResolverConfig};
use shared::{db, Config};

mod handlers;
mod middleware;
mod routes;

use api_gateway::AppResolver;
use middleware::metrics::{init_metrics, PrometheusMetrics};
use middleware::request_context::RequestContextLayer;
use middleware::security_headers::SecurityHeaders;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    shared::init_tracing();
    tracing::info!("Starting API Gateway...");

    let config = Config::from_env().context("Failed to load configuration")?;

    let primary_pool = db::create_pool(&config.database)
        .await
        .context("Failed to create primary database pool")?;
    db::run_migrations(&primary_pool)
        .await
        .context("Failed to run database migrations")?;
    db::check_health(&primary_pool)
        .await
        .context("Primary database health check failed")?;

    let replica_pools = db::create_replica_pools()
        .await
        .context("Failed to create replica database pools")?;
    tracing::info!(replicas = replica_pools.len(), "Replica pools ready");

    // Install the Prometheus recorder before the provider describes any
    // metrics, so `dbresolver_*` and `http_*` series are registered against it.
    let _prometheus_handle = init_metrics();

    let resolver_config = ResolverConfig::from_env().context("Failed to load resolver configuration")?;
    let resolver: AppResolver = Provider::connect(&resolver_config, Some(primary_pool), replica_pools)
        .context("Failed to build resolver")?;
    tracing::info!(
        strategy = resolver_config.strategy.as_str(),
        replicas = resolver.replica_count(),
        "Resolver connected"
    );

    let server_addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("API Gateway listening on {}", server_addr);

    let server_resolver = resolver.clone();
    let server = HttpServer::new(move || {
        App::new()
            .wrap(SecurityHeaders::for_api())
            .wrap(Logger::default())
            .wrap(middleware::cors())
            .wrap(PrometheusMetrics::new())
            .wrap(RequestContextLayer::new())
            .app_data(web::JsonConfig::default().limit(1_048_576))
            .app_data(web::Data::new(server_resolver.clone()))
            .configure(routes::configure)
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind to {}", server_addr))?;

    let server_handle = server.run();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
    });

    server_handle.await.context("Server error")?;

    resolver.close().await.context("Failed to close resolver cleanly")?;
    tracing::info!("API Gateway shutdown complete");

    Ok(())
}
