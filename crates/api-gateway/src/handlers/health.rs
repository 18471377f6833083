//! Health check endpoint, aggregating the resolver's own health report.

use actix_web::{web, HttpResponse, Responder};

use crate::AppResolver;

/// Health check endpoint.
///
/// Delegates to [`dbresolver::Resolver::health_check`], which reports the
/// primary's status (the aggregate status), per-replica circuit breaker
/// state, and a snapshot of the routing counters.
pub async fn health_check(resolver: web::Data<AppResolver>) -> impl Responder {
    let health = resolver.health_check().await;
    if health.status == "healthy" {
        HttpResponse::Ok().json(health)
    } else {
        HttpResponse::ServiceUnavailable().json(health)
    }
}
