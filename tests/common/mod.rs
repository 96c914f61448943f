#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tollgate::rate_limit::{CounterStore, InMemoryCounterStore, RateLimitRule, StoreReply, WindowOp};
use tollgate::{AdmissionConfig, AdmissionManager, ManualClock, StoreError};

pub fn rule(secs: u64, threshold: u64) -> RateLimitRule {
    RateLimitRule::new(Duration::from_secs(secs), threshold).expect("valid rule")
}

/// Manager over a fresh in-memory store and a manual clock starting at `start`.
pub fn manager_at(
    config: AdmissionConfig,
    start: u64,
) -> (AdmissionManager, ManualClock, Arc<InMemoryCounterStore>) {
    let clock = ManualClock::new(start);
    let store = Arc::new(InMemoryCounterStore::new());
    let manager = AdmissionManager::builder(config)
        .store(store.clone())
        .clock(Arc::new(clock.clone()))
        .build();
    (manager, clock, store)
}

/// Store that takes `delay` before answering from an in-memory store.
#[derive(Debug, Default)]
pub struct SlowStore {
    pub delay: Duration,
    pub inner: InMemoryCounterStore,
}

#[async_trait]
impl CounterStore for SlowStore {
    async fn try_admit(
        &self,
        key: &str,
        op: WindowOp,
        now_secs: u64,
        nonce: u32,
        rules: &[RateLimitRule],
    ) -> Result<StoreReply, StoreError> {
        tokio::time::sleep(self.delay).await;
        self.inner.try_admit(key, op, now_secs, nonce, rules).await
    }
}
