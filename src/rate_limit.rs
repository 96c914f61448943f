//! Rate limiting primitives.
//!
//! This module provides the building blocks the admission manager composes:
//! - [`RateLimitRule`] / [`RuleTable`] / [`WeightTable`]: static per-venue configuration.
//! - [`KeyExtractor`]: derives rule, counter and weight keys from a request.
//! - [`RateLimitAlgorithm`]: sliding-window counting ([`CountWindow`]) and weighted
//!   budgets ([`WeightWindow`]).
//! - [`Limiter`]: one extractor plus one algorithm, checked as a unit.
//! - [`AdmissionLayer`]: Tower middleware that refuses calls the manager denies.
//!
//! # Architecture
//!
//! - **Middleware**: `AdmissionLayer` wraps your service. It doesn't know *how* limiting
//!   works, only that it should ask the `AdmissionManager`.
//! - **Logic**: the algorithms in `strategies` decide what an admission means.
//! - **Storage**: `CounterStore` (in `store` module) owns the per-key event logs and runs
//!   the read-check-write as one atomic step, in memory or in a shared backend (Redis).

use std::time::Duration;

pub mod keys;
pub mod limiter;
pub mod middleware;
pub mod rules;
pub mod store;
pub mod strategies;

pub use keys::{AccountScopedKeys, IpScopedKeys, KeyExtractor, MarketClassifier};
pub use limiter::{Limiter, WindowLimiter};
pub use middleware::{Admissible, AdmissionLayer, AdmissionService, AdmissionServiceError};
pub use rules::{RateLimitRule, RuleTable, WeightTable};
pub use store::{CounterStore, InMemoryCounterStore, StoreReply, WindowOp};
pub use strategies::{CountWindow, RateLimitAlgorithm, WeightWindow};

/// The decision returned by a limiter or the admission manager.
///
/// `retry_after` and `reason` only carry meaning when `allowed` is false.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Decision {
    pub allowed: bool,
    /// How long the caller should wait before retrying.
    pub retry_after: Duration,
    /// Why the request was denied (or, for fail-open allows, why no limit applied).
    pub reason: String,
}

impl Decision {
    pub fn allow() -> Self {
        Self { allowed: true, retry_after: Duration::ZERO, reason: String::new() }
    }

    pub fn allow_with_reason(reason: impl Into<String>) -> Self {
        Self { allowed: true, retry_after: Duration::ZERO, reason: reason.into() }
    }

    pub fn deny(reason: impl Into<String>, retry_after: Duration) -> Self {
        Self { allowed: false, retry_after, reason: reason.into() }
    }

    /// Helper to check if allowed.
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}
