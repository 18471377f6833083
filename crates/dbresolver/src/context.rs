//! Per-request routing context and the primary-route override list.

use std::collections::HashSet;

/// HTTP method and path for the request driving a query, passed explicitly
/// to every routing-sensitive operation. Rust has no implicit per-request
/// context carrier, so this is a plain value type rather than a context key.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub http_method: Option<String>,
    pub request_path: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.http_method = Some(method.into());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.request_path = Some(path.into());
        self
    }
}

/// Literal and prefix routes that always force a read to the primary,
/// regardless of HTTP method.
#[derive(Debug, Clone, Default)]
pub struct PrimaryRoutes {
    literal: HashSet<String>,
    prefixes: Vec<String>,
}

impl PrimaryRoutes {
    /// Split `routes` into literal entries and prefixes. A route ending in
    /// `*` contributes its prefix (without the trailing `*`); everything
    /// else is a literal entry.
    pub fn from_routes(routes: &[String]) -> Self {
        let mut literal = HashSet::new();
        let mut prefixes = Vec::new();
        for route in routes {
            if let Some(prefix) = route.strip_suffix('*') {
                prefixes.push(prefix.to_string());
            } else {
                literal.insert(route.clone());
            }
        }
        Self { literal, prefixes }
    }

    pub fn is_primary_route(&self, path: &str) -> bool {
        self.literal.contains(path) || self.prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_route_matches_exactly() {
        let routes = PrimaryRoutes::from_routes(&["/admin".to_string()]);
        assert!(routes.is_primary_route("/admin"));
        assert!(!routes.is_primary_route("/admin/users"));
    }

    #[test]
    fn prefix_route_matches_descendants() {
        let routes = PrimaryRoutes::from_routes(&["/api/write/*".to_string()]);
        assert!(routes.is_primary_route("/api/write/order"));
        assert!(!routes.is_primary_route("/api/read/order"));
    }

    #[test]
    fn empty_routes_match_nothing() {
        let routes = PrimaryRoutes::from_routes(&[]);
        assert!(!routes.is_primary_route("/anything"));
    }

    #[test]
    fn request_context_builder_sets_fields() {
        let ctx = RequestContext::new().with_method("GET").with_path("/x");
        assert_eq!(ctx.http_method.as_deref(), Some("GET"));
        assert_eq!(ctx.request_path.as_deref(), Some("/x"));
    }

    #[test]
    fn default_context_has_no_method_or_path() {
        let ctx = RequestContext::default();
        assert!(ctx.http_method.is_none());
        assert!(ctx.request_path.is_none());
    }
}
