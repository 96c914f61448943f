//! Per-venue limiter wiring.
//!
//! Each venue decides which limiters a request must pass, based on its
//! request type. Order placement is usually constrained twice (per-account
//! order count and per-IP request weight); informational calls only by weight.

use crate::clock::Clock;
use crate::error::AdmissionError;
use crate::rate_limit::limiter::Limiter;
use crate::rate_limit::store::CounterStore;
use crate::request::RequestDescriptor;
use std::sync::Arc;

pub mod binance;
pub mod okx;

pub use binance::BinanceLimiters;
pub use okx::OkxLimiters;

/// The limiters a request must pass, in the order they are checked.
pub trait LimiterSet: Send + Sync + std::fmt::Debug {
    /// Unknown request types are an error, never an empty (allow-all) set.
    fn limiters_for(&self, request: &RequestDescriptor) -> Result<&[Arc<dyn Limiter>], AdmissionError>;
}

/// Shared collaborators every venue's limiters are built over.
#[derive(Debug, Clone)]
pub struct LimiterDeps {
    pub store: Arc<dyn CounterStore>,
    pub clock: Arc<dyn Clock>,
    pub fallback_scope: String,
}
