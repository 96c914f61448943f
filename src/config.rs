//! Admission configuration: per-venue rule and weight tables plus the few
//! knobs that apply to every venue.
//!
//! Loaded once and handed to [`AdmissionManager`](crate::AdmissionManager) at
//! construction; there is no reload path.

use crate::error::ConfigError;
use crate::rate_limit::rules::{RawRule, RuleTable, WeightTable};
use crate::request::Exchange;
use crate::venues;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::time::Duration;

/// Scope used for weight windows when a request carries no IP.
pub const DEFAULT_FALLBACK_SCOPE: &str = "unknown";

/// Environment variable consulted by [`AdmissionConfig::from_env`] for the fallback scope.
pub const HOST_IP_ENV: &str = "HOST_IP";

/// Rule and weight tables for one venue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VenueRules {
    pub rules: RuleTable,
    pub weights: WeightTable,
}

/// Everything the admission manager is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionConfig {
    venues: BTreeMap<Exchange, VenueRules>,
    fallback_scope: String,
    store_timeout: Option<Duration>,
}

impl Default for AdmissionConfig {
    /// Built-in Binance and OKX tables, `"unknown"` fallback scope, no store deadline.
    fn default() -> Self {
        let mut venues = BTreeMap::new();
        venues.insert(Exchange::Binance, venues::binance::default_rules());
        venues.insert(Exchange::Okx, venues::okx::default_rules());
        Self { venues, fallback_scope: DEFAULT_FALLBACK_SCOPE.to_string(), store_timeout: None }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    fallback_scope: Option<String>,
    #[serde(default)]
    store_timeout_ms: Option<u64>,
    #[serde(default)]
    venues: HashMap<String, RawVenue>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVenue {
    #[serde(default)]
    rules: BTreeMap<String, RawRule>,
    #[serde(default)]
    weights: HashMap<String, u64>,
}

impl AdmissionConfig {
    /// Config with no venues at all; every request would be unsupported.
    pub fn empty() -> Self {
        Self {
            venues: BTreeMap::new(),
            fallback_scope: DEFAULT_FALLBACK_SCOPE.to_string(),
            store_timeout: None,
        }
    }

    /// Defaults, with the fallback scope taken from `HOST_IP` when set.
    pub fn from_env() -> Self {
        let config = Self::default();
        match std::env::var(HOST_IP_ENV) {
            Ok(ip) if !ip.trim().is_empty() => config.with_fallback_scope(ip.trim()),
            _ => config,
        }
    }

    /// Parse a JSON document. Venues named in the document replace the built-in
    /// tables for that venue; unnamed venues keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        let mut config = Self::default();
        let mut seen = BTreeSet::new();

        for (name, raw_venue) in raw.venues {
            let exchange: Exchange =
                name.parse().map_err(|_| ConfigError::UnknownExchange(name.clone()))?;
            // names are case-insensitive, so "binance" and "Binance" collide
            if !seen.insert(exchange) {
                return Err(ConfigError::DuplicateExchange(exchange.to_string()));
            }
            let mut rules = RuleTable::new();
            for (key, raw_rule) in raw_venue.rules {
                let rule = raw_rule.into_rule(&key)?;
                rules.insert(key, rule);
            }
            let weights = raw_venue
                .weights
                .into_iter()
                .fold(WeightTable::new(), |table, (key, weight)| table.with_weight(key, weight));
            config.venues.insert(exchange, VenueRules { rules, weights });
        }
        if let Some(scope) = raw.fallback_scope {
            config.fallback_scope = scope;
        }
        config.store_timeout = raw.store_timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis);
        Ok(config)
    }

    /// Read and parse a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            venues = config.venues.len(),
            "loaded admission config"
        );
        Ok(config)
    }

    pub fn with_venue(mut self, exchange: Exchange, rules: VenueRules) -> Self {
        self.venues.insert(exchange, rules);
        self
    }

    pub fn with_fallback_scope(mut self, scope: impl Into<String>) -> Self {
        self.fallback_scope = scope.into();
        self
    }

    /// Default deadline for store round-trips when the caller sets none.
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = (timeout > Duration::ZERO).then_some(timeout);
        self
    }

    pub fn venue(&self, exchange: Exchange) -> Option<&VenueRules> {
        self.venues.get(&exchange)
    }

    pub fn venues(&self) -> impl Iterator<Item = (Exchange, &VenueRules)> {
        self.venues.iter().map(|(e, v)| (*e, v))
    }

    pub fn fallback_scope(&self) -> &str {
        &self.fallback_scope
    }

    pub fn store_timeout(&self) -> Option<Duration> {
        self.store_timeout
    }
}
