use crate::config::VenueRules;
use crate::context::CheckContext;
use crate::error::AdmissionError;
use crate::rate_limit::keys::KeyExtractor;
use crate::rate_limit::strategies::RateLimitAlgorithm;
use crate::rate_limit::Decision;
use crate::request::RequestDescriptor;
use async_trait::async_trait;
use std::sync::Arc;

/// One admission check for a request: extract keys, resolve rules, run an algorithm.
#[async_trait]
pub trait Limiter: Send + Sync + std::fmt::Debug {
    /// Short name used in logs ("order", "ip_weight", ...).
    fn name(&self) -> &str;

    async fn check(
        &self,
        ctx: &CheckContext,
        request: &RequestDescriptor,
    ) -> Result<Decision, AdmissionError>;
}

/// A [`Limiter`] built from one key extractor and one algorithm over a venue's tables.
#[derive(Debug)]
pub struct WindowLimiter<E, A> {
    name: &'static str,
    extractor: E,
    algorithm: A,
    tables: Arc<VenueRules>,
}

impl<E, A> WindowLimiter<E, A>
where
    E: KeyExtractor,
    A: RateLimitAlgorithm,
{
    pub fn new(name: &'static str, extractor: E, algorithm: A, tables: Arc<VenueRules>) -> Self {
        Self { name, extractor, algorithm, tables }
    }
}

#[async_trait]
impl<E, A> Limiter for WindowLimiter<E, A>
where
    E: KeyExtractor,
    A: RateLimitAlgorithm,
{
    fn name(&self) -> &str {
        self.name
    }

    async fn check(
        &self,
        ctx: &CheckContext,
        request: &RequestDescriptor,
    ) -> Result<Decision, AdmissionError> {
        let rule_key = self.extractor.rule_key(request);
        let rules = self.tables.rules.resolve(&rule_key);
        let counter_key = self.extractor.counter_key(request);
        let weight = match self.extractor.weight_key(request) {
            Some(weight_key) => self.tables.weights.weight_for(&weight_key),
            None => 1,
        };
        tracing::trace!(
            limiter = self.name,
            rule_key = %rule_key,
            counter_key = %counter_key,
            weight,
            rules = rules.len(),
            "checking limiter"
        );
        self.algorithm.check(ctx, &counter_key, weight, &rules).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::rate_limit::keys::{AccountScopedKeys, IpScopedKeys};
    use crate::rate_limit::rules::{RateLimitRule, RuleTable, WeightTable};
    use crate::rate_limit::store::InMemoryCounterStore;
    use crate::rate_limit::strategies::{CountWindow, WeightWindow};
    use crate::request::{Exchange, MarketType};

    fn spot(_: MarketType) -> Option<&'static str> {
        Some("spot")
    }

    fn tables() -> Arc<VenueRules> {
        Arc::new(VenueRules {
            rules: RuleTable::new()
                .with_rule("binance:spot:createorder:10s", RateLimitRule::from_parts(10, 2))
                .with_rule("binance:spot:request:1m", RateLimitRule::from_parts(60, 10)),
            weights: WeightTable::new()
                .with_weight("binance:spot:createorder:weight", 4)
                .with_weight("binance:spot:request:weight", 1),
        })
    }

    #[tokio::test]
    async fn order_limiter_counts_per_account() {
        let store = Arc::new(InMemoryCounterStore::new());
        let clock = Arc::new(ManualClock::new(100));
        let limiter = WindowLimiter::new(
            "order",
            AccountScopedKeys::new(Exchange::Binance, spot),
            CountWindow::with_clock(store.clone(), clock),
            tables(),
        );
        let ctx = CheckContext::new();
        let a = RequestDescriptor::order(Exchange::Binance, MarketType::Spot, "a");
        let b = RequestDescriptor::order(Exchange::Binance, MarketType::Spot, "b");

        assert!(limiter.check(&ctx, &a).await.unwrap().allowed);
        assert!(limiter.check(&ctx, &a).await.unwrap().allowed);
        assert!(!limiter.check(&ctx, &a).await.unwrap().allowed);
        assert!(limiter.check(&ctx, &b).await.unwrap().allowed);
        assert_eq!(store.scores("binance:spot:createorder:a").len(), 2);
        assert_eq!(limiter.name(), "order");
    }

    #[tokio::test]
    async fn weight_limiter_charges_configured_cost() {
        let store = Arc::new(InMemoryCounterStore::new());
        let clock = Arc::new(ManualClock::new(100));
        let limiter = WindowLimiter::new(
            "ip_weight",
            IpScopedKeys::new(Exchange::Binance, spot, "unknown"),
            WeightWindow::with_clock(store.clone(), clock),
            tables(),
        );
        let ctx = CheckContext::new();
        let order = RequestDescriptor::order(Exchange::Binance, MarketType::Spot, "a").with_ip("ip1");
        let normal = RequestDescriptor::normal(Exchange::Binance, MarketType::Spot).with_ip("ip1");

        // 4 + 4 = 8, then 2 x 1 = 10, then anything more is over budget
        assert!(limiter.check(&ctx, &order).await.unwrap().allowed);
        assert!(limiter.check(&ctx, &order).await.unwrap().allowed);
        assert!(limiter.check(&ctx, &normal).await.unwrap().allowed);
        assert!(limiter.check(&ctx, &normal).await.unwrap().allowed);
        let denied = limiter.check(&ctx, &normal).await.unwrap();
        assert!(!denied.allowed);
        assert_eq!(store.scores("binance:spot:request:ip1").len(), 4);
    }
}
