//! API Gateway Library
//!
//! Demo `actix-web` server wiring a [`dbresolver::Resolver`] up behind a
//! small set of HTTP endpoints: request-context middleware that populates
//! the resolver's routing context from the incoming method/path, a metrics
//! scrape endpoint, and a health handler aggregating the resolver's own
//! health check.
//!
//! Exposed as a library (rather than only a binary) so integration tests
//! can build the same `App` the production binary serves.

use std::sync::Arc;

pub mod handlers;
pub mod middleware;
pub mod routes;

/// The resolver type this gateway is wired to: a [`dbresolver::Resolver`]
/// generic over `sqlx::PgPool`, shared across all requests behind an `Arc`.
pub type AppResolver = Arc<dbresolver::Resolver<sqlx::PgPool>>;
