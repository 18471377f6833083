//! Resolver-level configuration: strategy choice, fallback policy, breaker
//! defaults, and primary-route overrides. Replica connection construction
//! (hosts, credentials, pool sizing) is a separate external concern, loaded
//! by `shared::db::create_replica_pools` instead.

use std::env;

use crate::error::{ResolverError, Result};

/// Which `Strategy` implementation the provider should wire up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    RoundRobin,
    Random,
}

impl StrategyKind {
    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "random" => StrategyKind::Random,
            _ => StrategyKind::RoundRobin,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::RoundRobin => "round-robin",
            StrategyKind::Random => "random",
        }
    }
}

/// Resolver-level configuration consumed by [`crate::provider::Provider`].
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub strategy: StrategyKind,
    pub read_fallback: bool,
    pub max_failures: u32,
    pub timeout_secs: u64,
    pub primary_routes: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::RoundRobin,
            read_fallback: true,
            max_failures: 5,
            timeout_secs: 30,
            primary_routes: Vec::new(),
        }
    }
}

impl ResolverConfig {
    /// Load from environment variables, falling back to the defaults above
    /// for anything unset. Unknown strategy names default to round-robin.
    pub fn from_env() -> Result<Self> {
        dotenvy_ok();

        let strategy = StrategyKind::from_name(
            &env::var("DB_RESOLVER_STRATEGY").unwrap_or_else(|_| "round-robin".to_string()),
        );

        let read_fallback = env::var("DB_RESOLVER_READ_FALLBACK")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(true);

        let max_failures = match env::var("DB_RESOLVER_MAX_FAILURES") {
            Ok(v) => v
                .parse()
                .map_err(|e| ResolverError::config(format!("invalid DB_RESOLVER_MAX_FAILURES: {e}")))?,
            Err(_) => 5,
        };

        let timeout_secs = match env::var("DB_RESOLVER_TIMEOUT_SECS") {
            Ok(v) => v
                .parse()
                .map_err(|e| ResolverError::config(format!("invalid DB_RESOLVER_TIMEOUT_SECS: {e}")))?,
            Err(_) => 30,
        };

        let primary_routes = env::var("DB_RESOLVER_PRIMARY_ROUTES")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            strategy,
            read_fallback,
            max_failures,
            timeout_secs,
            primary_routes,
        })
    }
}

fn dotenvy_ok() {
    let _ = dotenvy::dotenv();
}
