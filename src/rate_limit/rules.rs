//! Static rule and weight tables, and rule-key resolution.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// A sliding window and the most events (or weight) it may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawRule", into = "RawRule")]
pub struct RateLimitRule {
    window: Duration,
    threshold: u64,
}

impl RateLimitRule {
    /// Build a rule. Windows are enforced at one-second granularity, so the
    /// window must be a whole, non-zero number of seconds.
    pub fn new(window: Duration, threshold: u64) -> Result<Self, ConfigError> {
        if window.as_secs() == 0 {
            return Err(ConfigError::ZeroWindow { key: String::new() });
        }
        if window.subsec_nanos() != 0 {
            return Err(ConfigError::FractionalWindow { key: String::new() });
        }
        if threshold == 0 {
            return Err(ConfigError::ZeroThreshold { key: String::new() });
        }
        Ok(Self { window, threshold })
    }

    pub(crate) const fn from_parts(window_secs: u64, threshold: u64) -> Self {
        Self { window: Duration::from_secs(window_secs), threshold }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub(crate) struct RawRule {
    pub(crate) window_secs: u64,
    pub(crate) threshold: u64,
}

impl RawRule {
    /// Validate under a table key so errors name the offending rule.
    pub(crate) fn into_rule(self, key: &str) -> Result<RateLimitRule, ConfigError> {
        RateLimitRule::try_from(self).map_err(|err| match err {
            ConfigError::ZeroWindow { .. } => ConfigError::ZeroWindow { key: key.to_string() },
            ConfigError::ZeroThreshold { .. } => ConfigError::ZeroThreshold { key: key.to_string() },
            ConfigError::FractionalWindow { .. } => {
                ConfigError::FractionalWindow { key: key.to_string() }
            }
            other => other,
        })
    }
}

impl TryFrom<RawRule> for RateLimitRule {
    type Error = ConfigError;

    fn try_from(raw: RawRule) -> Result<Self, Self::Error> {
        RateLimitRule::new(Duration::from_secs(raw.window_secs), raw.threshold)
    }
}

impl From<RateLimitRule> for RawRule {
    fn from(rule: RateLimitRule) -> Self {
        RawRule { window_secs: rule.window_secs(), threshold: rule.threshold }
    }
}

/// Rule key -> rule, for one venue.
///
/// Ordered so that resolution hands rules to the store in a stable order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleTable {
    rules: BTreeMap<String, RateLimitRule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, builder-style.
    pub fn with_rule(mut self, key: impl Into<String>, rule: RateLimitRule) -> Self {
        self.insert(key, rule);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, rule: RateLimitRule) {
        self.rules.insert(key.into(), rule);
    }

    pub fn get(&self, key: &str) -> Option<&RateLimitRule> {
        self.rules.get(key)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RateLimitRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Turn a rule key into the rules to enforce.
    ///
    /// An exact entry wins on its own. Otherwise the key is cut to its first
    /// three `:` segments (dropping any scope suffix) and every entry at or
    /// below that base key applies, so one bucket can carry several windows
    /// (`...:createorder:10s` and `...:createorder:1m`). No match yields an
    /// empty set, which the algorithms treat as allow.
    pub fn resolve(&self, rule_key: &str) -> Vec<RateLimitRule> {
        if rule_key.is_empty() {
            tracing::trace!("empty rule key, no rules apply");
            return Vec::new();
        }
        if let Some(rule) = self.rules.get(rule_key) {
            tracing::trace!(rule_key, ?rule, "exact rule match");
            return vec![*rule];
        }

        let base = base_key(rule_key);
        let rules: Vec<RateLimitRule> = self
            .rules
            .iter()
            .filter(|(key, _)| is_under(key, base))
            .map(|(_, rule)| *rule)
            .collect();
        tracing::trace!(rule_key, base, matched = rules.len(), "prefix rule match");
        rules
    }
}

impl FromIterator<(String, RateLimitRule)> for RuleTable {
    fn from_iter<I: IntoIterator<Item = (String, RateLimitRule)>>(iter: I) -> Self {
        Self { rules: iter.into_iter().collect() }
    }
}

/// First three `:`-delimited segments of `key`, or the whole key when shorter.
fn base_key(key: &str) -> &str {
    match key.match_indices(':').nth(2) {
        Some((idx, _)) => &key[..idx],
        None => key,
    }
}

/// `key` equals `base` or extends it by at least one more segment.
fn is_under(key: &str, base: &str) -> bool {
    key.strip_prefix(base).is_some_and(|rest| rest.is_empty() || rest.starts_with(':'))
}

/// Weight key -> cost in venue units.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightTable {
    weights: HashMap<String, u64>,
}

impl WeightTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weight(mut self, key: impl Into<String>, weight: u64) -> Self {
        self.weights.insert(key.into(), weight);
        self
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Cost of one request under `weight_key`; unknown keys cost nothing.
    pub fn weight_for(&self, weight_key: &str) -> u64 {
        match self.weights.get(weight_key) {
            Some(weight) => *weight,
            None => {
                tracing::debug!(weight_key, "no weight configured, charging 0");
                0
            }
        }
    }
}
