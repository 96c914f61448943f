//! The admission manager: the one call every outbound-request site makes.

use crate::clock::{Clock, SystemClock};
use crate::config::AdmissionConfig;
use crate::context::CheckContext;
use crate::error::AdmissionError;
use crate::rate_limit::store::CounterStore;
use crate::rate_limit::Decision;
use crate::request::{Exchange, RequestDescriptor};
use crate::venues::{BinanceLimiters, LimiterDeps, LimiterSet, OkxLimiters};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Decides, before every outbound call, whether it may proceed, and records it if so.
///
/// Each venue contributes a [`LimiterSet`]; a request passes only if every
/// limiter in its set allows it, checked in order and stopping at the first
/// denial. There is no separate record step: an allowed decision has already
/// been counted.
///
/// ```rust
/// use std::sync::Arc;
/// use tollgate::{AdmissionConfig, AdmissionManager, CheckContext, Exchange, MarketType, RequestDescriptor};
/// use tollgate::rate_limit::InMemoryCounterStore;
///
/// # #[tokio::main]
/// # async fn main() {
/// let manager = AdmissionManager::builder(AdmissionConfig::default())
///     .store(Arc::new(InMemoryCounterStore::new()))
///     .build();
///
/// let request = RequestDescriptor::order(Exchange::Binance, MarketType::Spot, "acct-1");
/// let decision = manager.pre_check(&CheckContext::new(), &request).await.unwrap();
/// assert!(decision.allowed);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdmissionManager {
    venues: Arc<HashMap<Exchange, Arc<dyn LimiterSet>>>,
    store_timeout: Option<Duration>,
}

impl AdmissionManager {
    pub fn builder(config: AdmissionConfig) -> AdmissionManagerBuilder {
        AdmissionManagerBuilder::new(config)
    }

    /// Check every limiter that applies to `request`.
    ///
    /// `Ok` with `allowed == false` is a normal over-limit denial. `Err` is also
    /// a denial, for a reason that is not the caller's traffic: an unsupported
    /// request, a store failure, cancellation or timeout. Nothing is retried here.
    pub async fn pre_check(
        &self,
        ctx: &CheckContext,
        request: &RequestDescriptor,
    ) -> Result<Decision, AdmissionError> {
        let set = self
            .venues
            .get(&request.exchange)
            .ok_or(AdmissionError::UnsupportedExchange(request.exchange))?;
        let limiters = set.limiters_for(request)?;
        let ctx = ctx.or_timeout(self.store_timeout);

        for limiter in limiters {
            let decision = match limiter.check(&ctx, request).await {
                Ok(decision) => decision,
                Err(err) => {
                    tracing::warn!(
                        exchange = %request.exchange,
                        request_type = %request.request_type,
                        limiter = limiter.name(),
                        error = %err,
                        "admission check failed, denying"
                    );
                    return Err(err);
                }
            };
            if !decision.allowed {
                return Ok(decision);
            }
        }
        Ok(Decision::allow())
    }

    /// Like [`pre_check`](Self::pre_check), with errors folded into a denial
    /// whose reason is the error text.
    pub async fn decide(&self, ctx: &CheckContext, request: &RequestDescriptor) -> Decision {
        match self.pre_check(ctx, request).await {
            Ok(decision) => decision,
            Err(err) => Decision::deny(err.to_string(), Duration::ZERO),
        }
    }

    pub fn supports(&self, exchange: Exchange) -> bool {
        self.venues.contains_key(&exchange)
    }
}

/// Builder for [`AdmissionManager`].
///
/// Venues present in the config get their built-in limiter wiring; extra or
/// replacement sets can be registered with [`limiter_set`](Self::limiter_set).
#[derive(Debug)]
pub struct AdmissionManagerBuilder {
    config: AdmissionConfig,
    store: Option<Arc<dyn CounterStore>>,
    clock: Arc<dyn Clock>,
    custom: HashMap<Exchange, Arc<dyn LimiterSet>>,
}

impl AdmissionManagerBuilder {
    fn new(config: AdmissionConfig) -> Self {
        Self { config, store: None, clock: Arc::new(SystemClock), custom: HashMap::new() }
    }

    /// Shared counter store. Defaults to a process-local in-memory store.
    pub fn store(mut self, store: Arc<dyn CounterStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn limiter_set(mut self, exchange: Exchange, set: Arc<dyn LimiterSet>) -> Self {
        self.custom.insert(exchange, set);
        self
    }

    pub fn build(self) -> AdmissionManager {
        let store = match self.store {
            Some(store) => store,
            None => {
                tracing::warn!("no counter store configured, limits are local to this process");
                Arc::new(crate::rate_limit::store::InMemoryCounterStore::new())
            }
        };
        let deps = LimiterDeps {
            store,
            clock: self.clock,
            fallback_scope: self.config.fallback_scope().to_string(),
        };

        let mut venues: HashMap<Exchange, Arc<dyn LimiterSet>> = HashMap::new();
        for (exchange, tables) in self.config.venues() {
            let tables = Arc::new(tables.clone());
            let set: Arc<dyn LimiterSet> = match exchange {
                Exchange::Binance => Arc::new(BinanceLimiters::new(tables, &deps)),
                Exchange::Okx => Arc::new(OkxLimiters::new(tables, &deps)),
            };
            venues.insert(exchange, set);
        }
        venues.extend(self.custom);

        AdmissionManager { venues: Arc::new(venues), store_timeout: self.config.store_timeout() }
    }
}
