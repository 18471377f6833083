//! Request Context Middleware
//!
//! Populates a [`dbresolver::RequestContext`] from the incoming request's
//! HTTP method and path, and stores it in the request extensions so
//! handlers can hand it straight to `Resolver::query`/`select`/`query_row`.
//!
//! This is the "external middleware" §6.2 of the resolver's routing
//! contract describes only abstractly: it is what sets `http_method` and
//! `request_path` before the resolver ever sees a request.
//!
//! # Usage
//!
//! ```ignore
//! use actix_web::App;
//! use api_gateway::middleware::request_context::RequestContextLayer;
//!
//! let app = App::new()
//!     .wrap(RequestContextLayer::new())
//!     // ... routes
//! ```

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error, HttpMessage,
};
use dbresolver::RequestContext;
use futures_util::future::LocalBoxFuture;
use std::{
    future::{ready, Ready},
    rc::Rc,
};

/// Inserts a [`RequestContext`] built from the request's method and path
/// into the request extensions.
pub struct RequestContextLayer;

impl RequestContextLayer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RequestContextLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestContextLayer
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestContextMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestContextMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestContextMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestContextMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        let ctx = RequestContext::new()
            .with_method(req.method().as_str().to_ascii_uppercase())
            .with_path(req.path());
        req.extensions_mut().insert(ctx);

        Box::pin(async move { service.call(req).await })
    }
}

/// Fetch the [`RequestContext`] a handler's request carries. Falls back to
/// an empty context (no method, no path) if the middleware was not
/// registered — matching the resolver's own "unset ⇒ primary" safety rule.
pub fn context_of(req: &actix_web::HttpRequest) -> RequestContext {
    req.extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpResponse};

    async fn echo_method(req: actix_web::HttpRequest) -> HttpResponse {
        let ctx = context_of(&req);
        HttpResponse::Ok().body(ctx.http_method.unwrap_or_default())
    }

    #[actix_web::test]
    async fn populates_method_and_path() {
        let app = test::init_service(
            App::new()
                .wrap(RequestContextLayer::new())
                .route("/items", web::get().to(echo_method)),
        )
        .await;

        let req = test::TestRequest::get().uri("/items").to_request();
        let resp = test::call_service(&app, req).await;
        let body = test::read_body(resp).await;
        assert_eq!(body, "GET");
    }

    #[actix_web::test]
    async fn missing_middleware_yields_empty_context() {
        let ctx = RequestContext::default();
        assert!(ctx.http_method.is_none());
        assert!(ctx.request_path.is_none());
    }
}
