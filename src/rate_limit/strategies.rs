use crate::clock::{Clock, SystemClock};
use crate::context::CheckContext;
use crate::error::AdmissionError;
use crate::rate_limit::rules::RateLimitRule;
use crate::rate_limit::store::{CounterStore, StoreReply, WindowOp};
use crate::rate_limit::Decision;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Reason attached to allows that had no rule to enforce.
pub const NO_RULES_REASON: &str = "no rules found";

/// A sliding-window admission algorithm over a counter key.
///
/// Checking and recording are the same operation: an allowed decision means
/// the event is already in the window.
#[async_trait]
pub trait RateLimitAlgorithm: Send + Sync + std::fmt::Debug {
    /// Admit one event of `weight` into `counter_key` if every rule has room.
    async fn check(
        &self,
        ctx: &CheckContext,
        counter_key: &str,
        weight: u64,
        rules: &[RateLimitRule],
    ) -> Result<Decision, AdmissionError>;
}

#[derive(Debug, Clone)]
struct SlidingWindow {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl SlidingWindow {
    async fn admit(
        &self,
        ctx: &CheckContext,
        counter_key: &str,
        op: WindowOp,
        rules: &[RateLimitRule],
    ) -> Result<Decision, AdmissionError> {
        if rules.is_empty() {
            tracing::debug!(counter_key, "no rules found, allowing");
            return Ok(Decision::allow_with_reason(NO_RULES_REASON));
        }

        let now = self.clock.now_unix_secs();
        let nonce: u32 = rand::random();
        let reply = ctx
            .run(async {
                self.store
                    .try_admit(counter_key, op, now, nonce, rules)
                    .await
                    .map_err(AdmissionError::from)
            })
            .await;

        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                tracing::error!(counter_key, error = %err, "counter store check failed");
                return Err(err);
            }
        };

        let decision = parse_reply(counter_key, reply);
        if decision.allowed {
            tracing::debug!(counter_key, ?op, "admitted");
        } else {
            tracing::info!(
                counter_key,
                ?op,
                retry_after = ?decision.retry_after,
                reason = %decision.reason,
                "denied"
            );
        }
        Ok(decision)
    }
}

/// Interpret the store's verdict.
///
/// A reply that is not a recognisable verdict means the script and this code
/// disagree; that is not evidence of an over-limit window, so the request is
/// allowed and the mismatch logged loudly.
pub(crate) fn parse_reply(counter_key: &str, reply: StoreReply) -> Decision {
    let text = match reply {
        StoreReply::Text(text) => text,
        StoreReply::Unexpected(shape) => {
            tracing::error!(counter_key, reply = %shape, "malformed store reply, failing open");
            return Decision::allow();
        }
    };

    let mut parts = text.splitn(2, ':');
    match (parts.next(), parts.next()) {
        (Some("true"), _) => Decision::allow(),
        (Some("false"), Some(rest)) => {
            let mut denial = rest.splitn(2, ':');
            match (denial.next().map(str::parse::<u64>), denial.next()) {
                (Some(Ok(secs)), Some(reason)) => Decision::deny(reason, Duration::from_secs(secs)),
                _ => {
                    tracing::error!(counter_key, reply = %text, "malformed denial, failing open");
                    Decision::allow()
                }
            }
        }
        _ => {
            tracing::error!(counter_key, reply = %text, "malformed store reply, failing open");
            Decision::allow()
        }
    }
}

/// Sliding-window event counting.
///
/// Denies when a window already holds `threshold` events (`count >= threshold`),
/// with `retry_after` set to that rule's window. The weight argument is ignored:
/// every event counts as one.
#[derive(Debug, Clone)]
pub struct CountWindow {
    inner: SlidingWindow,
}

impl CountWindow {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { inner: SlidingWindow { store, clock } }
    }
}

#[async_trait]
impl RateLimitAlgorithm for CountWindow {
    async fn check(
        &self,
        ctx: &CheckContext,
        counter_key: &str,
        _weight: u64,
        rules: &[RateLimitRule],
    ) -> Result<Decision, AdmissionError> {
        self.inner.admit(ctx, counter_key, WindowOp::Count, rules).await
    }
}

/// Sliding-window weighted budget.
///
/// Denies when the window's weight plus the incoming weight would exceed the
/// threshold (`sum + weight > threshold`); a request that exactly fills the
/// remaining budget is admitted.
#[derive(Debug, Clone)]
pub struct WeightWindow {
    inner: SlidingWindow,
}

impl WeightWindow {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn CounterStore>, clock: Arc<dyn Clock>) -> Self {
        Self { inner: SlidingWindow { store, clock } }
    }
}

#[async_trait]
impl RateLimitAlgorithm for WeightWindow {
    async fn check(
        &self,
        ctx: &CheckContext,
        counter_key: &str,
        weight: u64,
        rules: &[RateLimitRule],
    ) -> Result<Decision, AdmissionError> {
        self.inner.admit(ctx, counter_key, WindowOp::Weight(weight), rules).await
    }
}
