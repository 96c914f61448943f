//! Convenient re-exports for common tollgate types.
pub use crate::{
    config::{AdmissionConfig, VenueRules},
    context::CheckContext,
    error::{AdmissionError, ConfigError, StoreError},
    manager::{AdmissionManager, AdmissionManagerBuilder},
    rate_limit::{
        Admissible, AdmissionLayer, CounterStore, Decision, InMemoryCounterStore, Limiter,
        RateLimitRule, RuleTable, WeightTable,
    },
    request::{Exchange, MarketType, RequestDescriptor, RequestType},
};
