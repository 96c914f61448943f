//! Binance: per-account order counts plus per-IP request weight.

use crate::config::VenueRules;
use crate::error::AdmissionError;
use crate::rate_limit::keys::{AccountScopedKeys, IpScopedKeys};
use crate::rate_limit::limiter::{Limiter, WindowLimiter};
use crate::rate_limit::rules::{RateLimitRule, RuleTable, WeightTable};
use crate::rate_limit::strategies::{CountWindow, WeightWindow};
use crate::request::{Exchange, MarketType, RequestDescriptor, RequestType};
use crate::venues::{LimiterDeps, LimiterSet};
use std::sync::Arc;

/// Futures: at most 300 orders per 10 seconds.
pub const FUTURES_CREATE_ORDER_10S: &str = "binance:futures:createorder:10s";
/// Futures: at most 1200 orders per minute.
pub const FUTURES_CREATE_ORDER_1M: &str = "binance:futures:createorder:1m";
/// Spot: at most 100 orders per 10 seconds.
pub const SPOT_CREATE_ORDER_10S: &str = "binance:spot:createorder:10s";
/// Spot: at most 6000 request weight per minute.
pub const SPOT_REQUEST_1M: &str = "binance:spot:request:1m";
/// Futures: at most 2400 request weight per minute.
pub const FUTURES_REQUEST_1M: &str = "binance:futures:request:1m";

pub const FUTURES_CREATE_ORDER_WEIGHT: &str = "binance:futures:createorder:weight";
pub const SPOT_CREATE_ORDER_WEIGHT: &str = "binance:spot:createorder:weight";
pub const SPOT_REQUEST_WEIGHT: &str = "binance:spot:request:weight";
pub const FUTURES_REQUEST_WEIGHT: &str = "binance:futures:request:weight";

/// Binance runs separate quotas for the spot and futures APIs; options have none here.
pub fn classify(market: MarketType) -> Option<&'static str> {
    match market {
        MarketType::Spot | MarketType::Margin => Some("spot"),
        m if m.is_derivative() => Some("futures"),
        _ => None,
    }
}

pub fn default_rules() -> VenueRules {
    VenueRules {
        rules: RuleTable::new()
            .with_rule(FUTURES_CREATE_ORDER_10S, RateLimitRule::from_parts(10, 300))
            .with_rule(FUTURES_CREATE_ORDER_1M, RateLimitRule::from_parts(60, 1200))
            .with_rule(SPOT_CREATE_ORDER_10S, RateLimitRule::from_parts(10, 100))
            .with_rule(SPOT_REQUEST_1M, RateLimitRule::from_parts(60, 6000))
            .with_rule(FUTURES_REQUEST_1M, RateLimitRule::from_parts(60, 2400)),
        weights: WeightTable::new()
            .with_weight(FUTURES_CREATE_ORDER_WEIGHT, 1)
            .with_weight(SPOT_CREATE_ORDER_WEIGHT, 1)
            .with_weight(SPOT_REQUEST_WEIGHT, 1)
            .with_weight(FUTURES_REQUEST_WEIGHT, 1),
    }
}

/// Orders pass the account order counter then the IP weight budget; plain
/// requests pass the IP weight budget only.
#[derive(Debug)]
pub struct BinanceLimiters {
    orders: Vec<Arc<dyn Limiter>>,
    requests: Vec<Arc<dyn Limiter>>,
}

impl BinanceLimiters {
    pub fn new(tables: Arc<VenueRules>, deps: &LimiterDeps) -> Self {
        let order: Arc<dyn Limiter> = Arc::new(WindowLimiter::new(
            "order",
            AccountScopedKeys::new(Exchange::Binance, classify),
            CountWindow::with_clock(deps.store.clone(), deps.clock.clone()),
            tables.clone(),
        ));
        let ip_weight: Arc<dyn Limiter> = Arc::new(WindowLimiter::new(
            "ip_weight",
            IpScopedKeys::new(Exchange::Binance, classify, deps.fallback_scope.clone()),
            WeightWindow::with_clock(deps.store.clone(), deps.clock.clone()),
            tables,
        ));
        Self { orders: vec![order, ip_weight.clone()], requests: vec![ip_weight] }
    }
}

impl LimiterSet for BinanceLimiters {
    fn limiters_for(&self, request: &RequestDescriptor) -> Result<&[Arc<dyn Limiter>], AdmissionError> {
        match request.request_type {
            RequestType::Order => Ok(&self.orders),
            RequestType::Normal => Ok(&self.requests),
        }
    }
}
