//! Route configuration for the API

use actix_web::web;

use crate::handlers;
use crate::middleware::metrics::metrics_handler;

/// Configure all routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/metrics", web::get().to(metrics_handler)).service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .route("/items", web::get().to(handlers::list_items))
            .route("/items", web::post().to(handlers::create_item)),
    );
}
