//! Key extraction: request descriptor -> rule, counter and weight keys.
//!
//! All three keys share the `venue:class:type` stem but identify different
//! things: the rule key selects thresholds, the counter key names one sliding
//! window in the store, and the weight key selects a per-request cost.

use crate::request::{Exchange, MarketType, RequestDescriptor, RequestType};
use std::fmt;

/// Buckets a literal market type into the class a venue applies quotas to.
///
/// `None` marks a market the venue has no quota class for; every key derived
/// from such a request is empty and resolves to no rules.
pub type MarketClassifier = fn(MarketType) -> Option<&'static str>;

/// Derives the keys one limiter needs from a request.
///
/// Implementations are pure: same request, same keys, no I/O.
pub trait KeyExtractor: Send + Sync + fmt::Debug {
    /// Selects which rules apply.
    fn rule_key(&self, request: &RequestDescriptor) -> String;
    /// Names the sliding window that is inspected and appended to.
    fn counter_key(&self, request: &RequestDescriptor) -> String;
    /// Selects the cost of this request; `None` when every event counts as one.
    fn weight_key(&self, request: &RequestDescriptor) -> Option<String>;
}

/// Order-count keys, one window per account.
///
/// rule `venue:class:type`, counter `venue:class:type:account`.
#[derive(Clone)]
pub struct AccountScopedKeys {
    venue: Exchange,
    classify: MarketClassifier,
}

impl AccountScopedKeys {
    pub fn new(venue: Exchange, classify: MarketClassifier) -> Self {
        Self { venue, classify }
    }
}

impl fmt::Debug for AccountScopedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountScopedKeys").field("venue", &self.venue).finish()
    }
}

impl KeyExtractor for AccountScopedKeys {
    fn rule_key(&self, request: &RequestDescriptor) -> String {
        match (self.classify)(request.market_type) {
            Some(class) => format!("{}:{}:{}", self.venue, class, request.request_type),
            None => String::new(),
        }
    }

    fn counter_key(&self, request: &RequestDescriptor) -> String {
        match (self.classify)(request.market_type) {
            Some(class) => format!(
                "{}:{}:{}:{}",
                self.venue, class, request.request_type, request.account_id
            ),
            None => String::new(),
        }
    }

    fn weight_key(&self, _request: &RequestDescriptor) -> Option<String> {
        None
    }
}

/// Request-weight keys, one window per source IP.
///
/// rule `venue:class:request`, counter `venue:class:request:ip`,
/// weight `venue:class:type:weight`. Requests without an IP share the
/// configured fallback scope so unattributed traffic is still limited.
#[derive(Clone)]
pub struct IpScopedKeys {
    venue: Exchange,
    classify: MarketClassifier,
    fallback_scope: String,
}

impl IpScopedKeys {
    pub fn new(venue: Exchange, classify: MarketClassifier, fallback_scope: impl Into<String>) -> Self {
        Self { venue, classify, fallback_scope: fallback_scope.into() }
    }

    fn scope<'a>(&'a self, request: &'a RequestDescriptor) -> &'a str {
        if request.ip.is_empty() {
            &self.fallback_scope
        } else {
            &request.ip
        }
    }
}

impl fmt::Debug for IpScopedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IpScopedKeys")
            .field("venue", &self.venue)
            .field("fallback_scope", &self.fallback_scope)
            .finish()
    }
}

impl KeyExtractor for IpScopedKeys {
    fn rule_key(&self, request: &RequestDescriptor) -> String {
        match (self.classify)(request.market_type) {
            Some(class) => format!("{}:{}:{}", self.venue, class, RequestType::Normal),
            None => String::new(),
        }
    }

    fn counter_key(&self, request: &RequestDescriptor) -> String {
        match (self.classify)(request.market_type) {
            Some(class) => format!(
                "{}:{}:{}:{}",
                self.venue,
                class,
                RequestType::Normal,
                self.scope(request)
            ),
            None => String::new(),
        }
    }

    fn weight_key(&self, request: &RequestDescriptor) -> Option<String> {
        let key = match (self.classify)(request.market_type) {
            Some(class) => format!("{}:{}:{}:weight", self.venue, class, request.request_type),
            None => String::new(),
        };
        Some(key)
    }
}
