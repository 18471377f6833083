//! Replica selection strategies.
//!
//! A `Strategy` picks one index out of a non-empty slice of currently
//! healthy replica handles. Implementations must be safe to call
//! concurrently from many tasks.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

use crate::error::{ResolverError, Result};

/// Policy used to pick a replica from the filtered healthy set.
pub trait Strategy<P>: Send + Sync {
    /// Choose an index into `dbs`. Errors only when `dbs` is empty.
    fn choose(&self, dbs: &[P]) -> Result<usize>;

    /// Name used for logging/metrics labels (`"round-robin"` or `"random"`).
    fn name(&self) -> &'static str;
}

/// Evenly distributes selections over the current healthy set using a
/// shared atomic counter. Approximate under a changing replica set: the
/// counter keeps advancing even as membership shifts, so distribution is
/// only even over long runs with stable membership.
#[derive(Default)]
pub struct RoundRobin {
    current: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
        }
    }
}

impl<P> Strategy<P> for RoundRobin {
    fn choose(&self, dbs: &[P]) -> Result<usize> {
        if dbs.is_empty() {
            return Err(ResolverError::database("no replicas available to choose from"));
        }
        let count = self.current.fetch_add(1, Ordering::Relaxed);
        Ok(count % dbs.len())
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}

/// Picks a uniformly random index. A weak RNG is acceptable here — this is
/// load balancing, not a security-sensitive choice.
#[derive(Default)]
pub struct Random;

impl Random {
    pub fn new() -> Self {
        Self
    }
}

impl<P> Strategy<P> for Random {
    fn choose(&self, dbs: &[P]) -> Result<usize> {
        if dbs.is_empty() {
            return Err(ResolverError::database("no replicas available to choose from"));
        }
        Ok(rand::thread_rng().gen_range(0..dbs.len()))
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

/// Resolve a strategy name from configuration. Unknown names default to
/// round-robin.
pub fn from_name<P: Send + Sync + 'static>(name: &str) -> Box<dyn Strategy<P>> {
    match name.to_ascii_lowercase().as_str() {
        "random" => Box::new(Random::new()),
        _ => Box::new(RoundRobin::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_robin_cycles_evenly() {
        let strategy = RoundRobin::new();
        let dbs = vec![0, 1, 2];
        let mut counts = [0usize; 3];
        for _ in 0..9 {
            let idx = Strategy::<i32>::choose(&strategy, &dbs).unwrap();
            counts[idx] += 1;
        }
        assert_eq!(counts, [3, 3, 3]);
    }

    #[test]
    fn round_robin_errors_on_empty() {
        let strategy = RoundRobin::new();
        let dbs: Vec<i32> = vec![];
        assert!(Strategy::<i32>::choose(&strategy, &dbs).is_err());
    }

    #[test]
    fn random_errors_on_empty() {
        let strategy = Random::new();
        let dbs: Vec<i32> = vec![];
        assert!(Strategy::<i32>::choose(&strategy, &dbs).is_err());
    }

    #[test]
    fn random_returns_in_bounds_index() {
        let strategy = Random::new();
        let dbs = vec![0, 1, 2, 3];
        for _ in 0..50 {
            let idx = Strategy::<i32>::choose(&strategy, &dbs).unwrap();
            assert!(idx < dbs.len());
        }
    }

    #[test]
    fn unknown_strategy_name_defaults_to_round_robin() {
        let strategy: Box<dyn Strategy<i32>> = from_name("nonexistent");
        assert_eq!(strategy.name(), "round-robin");
    }

    #[test]
    fn names_match_expected_labels() {
        let rr: Box<dyn Strategy<i32>> = from_name("round-robin");
        let rnd: Box<dyn Strategy<i32>> = from_name("random");
        assert_eq!(rr.name(), "round-robin");
        assert_eq!(rnd.name(), "random");
    }
}
