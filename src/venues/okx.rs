//! OKX: per-account order counts only.

use crate::config::VenueRules;
use crate::error::AdmissionError;
use crate::rate_limit::keys::AccountScopedKeys;
use crate::rate_limit::limiter::{Limiter, WindowLimiter};
use crate::rate_limit::rules::{RateLimitRule, RuleTable, WeightTable};
use crate::rate_limit::strategies::CountWindow;
use crate::request::{Exchange, MarketType, RequestDescriptor, RequestType};
use crate::venues::{LimiterDeps, LimiterSet};
use std::sync::Arc;

/// Spot: at most 60 orders per 2 seconds.
pub const SPOT_CREATE_ORDER_2S: &str = "okx:spot:createorder:2s";
/// Futures and perpetuals: at most 60 orders per 2 seconds.
pub const FUTURES_CREATE_ORDER_2S: &str = "okx:futures:createorder:2s";
/// Options: at most 60 orders per 2 seconds.
pub const OPTIONS_CREATE_ORDER_2S: &str = "okx:options:createorder:2s";

pub fn classify(market: MarketType) -> Option<&'static str> {
    match market {
        MarketType::Spot | MarketType::Margin => Some("spot"),
        MarketType::Options => Some("options"),
        _ => Some("futures"),
    }
}

pub fn default_rules() -> VenueRules {
    VenueRules {
        rules: RuleTable::new()
            .with_rule(SPOT_CREATE_ORDER_2S, RateLimitRule::from_parts(2, 60))
            .with_rule(FUTURES_CREATE_ORDER_2S, RateLimitRule::from_parts(2, 60))
            .with_rule(OPTIONS_CREATE_ORDER_2S, RateLimitRule::from_parts(2, 60)),
        weights: WeightTable::new(),
    }
}

/// Only order placement is limited; any other request type is unsupported.
#[derive(Debug)]
pub struct OkxLimiters {
    orders: Vec<Arc<dyn Limiter>>,
}

impl OkxLimiters {
    pub fn new(tables: Arc<VenueRules>, deps: &LimiterDeps) -> Self {
        let order: Arc<dyn Limiter> = Arc::new(WindowLimiter::new(
            "order",
            AccountScopedKeys::new(Exchange::Okx, classify),
            CountWindow::with_clock(deps.store.clone(), deps.clock.clone()),
            tables,
        ));
        Self { orders: vec![order] }
    }
}

impl LimiterSet for OkxLimiters {
    fn limiters_for(&self, request: &RequestDescriptor) -> Result<&[Arc<dyn Limiter>], AdmissionError> {
        match request.request_type {
            RequestType::Order => Ok(&self.orders),
            other => Err(AdmissionError::UnsupportedRequestType {
                exchange: Exchange::Okx,
                request_type: other,
            }),
        }
    }
}
