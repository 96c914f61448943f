use crate::error::StoreError;
use crate::rate_limit::rules::RateLimitRule;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What an admission appends to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOp {
    /// One event; windows hold at most `threshold` events.
    Count,
    /// An event costing `weight`; window weights sum to at most `threshold`.
    Weight(u64),
}

impl WindowOp {
    /// Log member recorded for an admitted event: `now:nonce` for counts,
    /// `weight:now:nonce` for weights. The nonce keeps same-second entries distinct.
    pub fn member(&self, now_secs: u64, nonce: u32) -> String {
        match self {
            WindowOp::Count => format!("{now_secs}:{nonce}"),
            WindowOp::Weight(weight) => format!("{weight}:{now_secs}:{nonce}"),
        }
    }
}

/// Raw verdict returned by the store's admission script.
///
/// Well-formed text is `"true:"` or `"false:<retry_after_secs>:<reason>"`.
/// Anything else is handed back as-is and judged by the algorithm layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreReply {
    Text(String),
    /// A reply that was not text at all, described for logging.
    Unexpected(String),
}

pub(crate) const ADMITTED: &str = "true:";

pub(crate) fn denied(window_secs: u64, reason: &str) -> String {
    format!("false:{window_secs}:{reason}")
}

/// Abstract storage interface for sliding-window event logs.
///
/// One ordered log per counter key, scored by Unix seconds. `try_admit` must run
/// its whole read-check-write as one atomic step against every other caller of
/// the same key, including callers in other processes: evaluate every rule,
/// and only if all pass append `op.member(now, nonce)`, refresh the key's TTL
/// to twice the widest window and drop entries that have left the widest window.
#[async_trait]
pub trait CounterStore: Send + Sync + std::fmt::Debug {
    async fn try_admit(
        &self,
        key: &str,
        op: WindowOp,
        now_secs: u64,
        nonce: u32,
        rules: &[RateLimitRule],
    ) -> Result<StoreReply, StoreError>;
}

#[async_trait]
impl<S: CounterStore + ?Sized> CounterStore for Arc<S> {
    async fn try_admit(
        &self,
        key: &str,
        op: WindowOp,
        now_secs: u64,
        nonce: u32,
        rules: &[RateLimitRule],
    ) -> Result<StoreReply, StoreError> {
        (**self).try_admit(key, op, now_secs, nonce, rules).await
    }
}

#[derive(Debug, Default, Clone)]
struct Bucket {
    // (score, member), append order == time order for a well-behaved clock
    entries: Vec<(u64, String)>,
    expires_at: Option<u64>,
}

impl Bucket {
    fn in_window(&self, min_score: u64) -> impl Iterator<Item = &String> {
        self.entries.iter().filter(move |(score, _)| *score >= min_score).map(|(_, m)| m)
    }

    fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Default)]
struct Buckets {
    by_key: HashMap<String, Bucket>,
    // earliest expiry among held buckets; no sweep runs before it
    next_sweep: Option<u64>,
}

impl Buckets {
    /// Drop every expired bucket once `now` reaches the earliest known expiry.
    fn sweep(&mut self, now: u64) {
        if !self.next_sweep.is_some_and(|at| at <= now) {
            return;
        }
        let before = self.by_key.len();
        self.by_key.retain(|_, bucket| !bucket.is_expired(now));
        self.next_sweep = self.by_key.values().filter_map(|b| b.expires_at).min();
        tracing::trace!(removed = before - self.by_key.len(), "swept expired counter keys");
    }

    fn note_expiry(&mut self, expires_at: Option<u64>) {
        if let Some(at) = expires_at {
            self.next_sweep = Some(self.next_sweep.map_or(at, |next| next.min(at)));
        }
    }
}

/// Leading `weight:` of a weight-log member; count members carry no weight.
fn member_weight(member: &str) -> u64 {
    let mut parts = member.splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(weight), Some(_), Some(_)) => weight.parse().unwrap_or(0),
        _ => 0,
    }
}

/// Process-local counter store.
///
/// The whole admission runs under one mutex, so it is atomic for every task in
/// this process. Shares nothing across processes; use a shared backend there.
/// Expired keys are removed, so memory follows the set of recently active keys.
#[derive(Default, Clone, Debug)]
pub struct InMemoryCounterStore {
    data: Arc<Mutex<Buckets>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores currently held for `key`, oldest first, ignoring TTL.
    pub fn scores(&self, key: &str) -> Vec<u64> {
        let guard = self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .by_key
            .get(key)
            .map(|b| b.entries.iter().map(|(s, _)| *s).collect())
            .unwrap_or_default()
    }

    /// Expiry deadline (Unix seconds) of `key`, if it has one.
    pub fn expires_at(&self, key: &str) -> Option<u64> {
        let guard = self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.by_key.get(key).and_then(|b| b.expires_at)
    }

    /// Number of counter keys currently held.
    pub fn key_count(&self) -> usize {
        let guard = self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.by_key.len()
    }

    /// Check every rule against `bucket`; on success record the event. Returns
    /// the denial text, or `None` when admitted.
    fn evaluate(
        bucket: &mut Bucket,
        op: WindowOp,
        now: u64,
        nonce: u32,
        rules: &[RateLimitRule],
    ) -> Option<String> {
        for rule in rules {
            let window = rule.window_secs();
            let min_score = now.saturating_sub(window);
            let threshold = rule.threshold();
            match op {
                WindowOp::Count => {
                    let count = bucket.in_window(min_score).count() as u64;
                    if count >= threshold {
                        return Some(denied(
                            window,
                            &format!("Too many requests: limit {threshold} per {window} seconds reached"),
                        ));
                    }
                }
                WindowOp::Weight(weight) => {
                    let total: u64 = bucket.in_window(min_score).map(|m| member_weight(m)).sum();
                    let total = total.saturating_add(weight);
                    if total > threshold {
                        return Some(denied(
                            window,
                            &format!(
                                "Weight limit exceeded: total {total} > limit {threshold} per {window} seconds"
                            ),
                        ));
                    }
                }
            }
        }

        // nothing to enforce means nothing worth remembering
        let widest = rules.iter().map(RateLimitRule::window_secs).max()?;
        bucket.entries.push((now, op.member(now, nonce)));
        bucket.expires_at = Some(now.saturating_add(widest.saturating_mul(2)));
        // an entry exactly at now - widest is still inside the widest window
        let oldest = now.saturating_sub(widest);
        bucket.entries.retain(|(score, _)| *score >= oldest);
        None
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn try_admit(
        &self,
        key: &str,
        op: WindowOp,
        now_secs: u64,
        nonce: u32,
        rules: &[RateLimitRule],
    ) -> Result<StoreReply, StoreError> {
        let mut guard = self
            .data
            .lock()
            .map_err(|_| StoreError::Backend("in-memory store lock poisoned".into()))?;
        let buckets = &mut *guard;
        buckets.sweep(now_secs);
        if buckets.by_key.get(key).is_some_and(|b| b.is_expired(now_secs)) {
            buckets.by_key.remove(key);
        }

        let (denial, expires_at) = match buckets.by_key.get_mut(key) {
            Some(bucket) => {
                let denial = Self::evaluate(bucket, op, now_secs, nonce, rules);
                (denial, bucket.expires_at)
            }
            None => {
                let mut bucket = Bucket::default();
                let denial = Self::evaluate(&mut bucket, op, now_secs, nonce, rules);
                let expires_at = bucket.expires_at;
                // only an admitted event creates a key
                if denial.is_none() && !bucket.entries.is_empty() {
                    buckets.by_key.insert(key.to_string(), bucket);
                }
                (denial, expires_at)
            }
        };
        if denial.is_none() {
            buckets.note_expiry(expires_at);
        }
        Ok(StoreReply::Text(denial.unwrap_or_else(|| ADMITTED.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(secs: u64, threshold: u64) -> RateLimitRule {
        RateLimitRule::from_parts(secs, threshold)
    }

    async fn admit(store: &InMemoryCounterStore, op: WindowOp, now: u64, rules: &[RateLimitRule]) -> String {
        match store.try_admit("k", op, now, 7, rules).await.unwrap() {
            StoreReply::Text(text) => text,
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn members_encode_weight_and_nonce() {
        assert_eq!(WindowOp::Count.member(100, 42), "100:42");
        assert_eq!(WindowOp::Weight(5).member(100, 42), "5:100:42");
        assert_eq!(member_weight("5:100:42"), 5);
        assert_eq!(member_weight("100:42"), 0);
    }

    #[tokio::test]
    async fn count_blocks_at_threshold() {
        let store = InMemoryCounterStore::new();
        let rules = [rule(10, 2)];
        assert_eq!(admit(&store, WindowOp::Count, 100, &rules).await, "true:");
        assert_eq!(admit(&store, WindowOp::Count, 100, &rules).await, "true:");
        let reply = admit(&store, WindowOp::Count, 101, &rules).await;
        assert!(reply.starts_with("false:10:Too many requests"), "{reply}");
        assert_eq!(store.scores("k"), vec![100, 100]);
    }

    #[tokio::test]
    async fn weight_allows_exact_fill() {
        let store = InMemoryCounterStore::new();
        let rules = [rule(60, 10)];
        assert_eq!(admit(&store, WindowOp::Weight(6), 100, &rules).await, "true:");
        assert!(admit(&store, WindowOp::Weight(5), 100, &rules).await.starts_with("false:60:"));
        assert_eq!(admit(&store, WindowOp::Weight(4), 100, &rules).await, "true:");
    }

    #[tokio::test]
    async fn ttl_is_twice_widest_window_and_prunes_old_entries() {
        let store = InMemoryCounterStore::new();
        let rules = [rule(10, 100), rule(60, 100)];
        admit(&store, WindowOp::Count, 100, &rules).await;
        assert_eq!(store.expires_at("k"), Some(220));
        admit(&store, WindowOp::Count, 160, &rules).await;
        assert_eq!(store.scores("k"), vec![100, 160]);
        admit(&store, WindowOp::Count, 161, &rules).await;
        assert_eq!(store.scores("k"), vec![160, 161]);
    }

    #[tokio::test]
    async fn count_keeps_entry_on_window_edge() {
        let store = InMemoryCounterStore::new();
        let rules = [rule(10, 2)];
        assert_eq!(admit(&store, WindowOp::Count, 0, &rules).await, "true:");
        assert_eq!(admit(&store, WindowOp::Count, 10, &rules).await, "true:");
        // the event at 0 is still inside [0, 10]
        let reply = admit(&store, WindowOp::Count, 10, &rules).await;
        assert!(reply.starts_with("false:10:"), "{reply}");
        assert_eq!(store.scores("k"), vec![0, 10]);
    }

    #[tokio::test]
    async fn weight_keeps_entry_on_window_edge() {
        let store = InMemoryCounterStore::new();
        let rules = [rule(10, 10)];
        assert_eq!(admit(&store, WindowOp::Weight(6), 0, &rules).await, "true:");
        assert_eq!(admit(&store, WindowOp::Weight(4), 10, &rules).await, "true:");
        let reply = admit(&store, WindowOp::Weight(4), 10, &rules).await;
        assert_eq!(reply, "false:10:Weight limit exceeded: total 14 > limit 10 per 10 seconds");
    }

    #[tokio::test]
    async fn expired_keys_are_swept() {
        let store = InMemoryCounterStore::new();
        let rules = [rule(2, 5)];
        for i in 0..1000u32 {
            let key = format!("ip:{i}");
            store.try_admit(&key, WindowOp::Count, 100, i, &rules).await.unwrap();
        }
        assert_eq!(store.key_count(), 1000);
        assert_eq!(store.expires_at("ip:0"), Some(104));

        store.try_admit("other", WindowOp::Count, 1_000_000, 1, &rules).await.unwrap();
        assert_eq!(store.key_count(), 1);
        assert!(store.scores("ip:0").is_empty());
    }

    #[tokio::test]
    async fn sweep_keeps_live_keys() {
        let store = InMemoryCounterStore::new();
        store.try_admit("short", WindowOp::Count, 100, 1, &[rule(1, 5)]).await.unwrap();
        store.try_admit("long", WindowOp::Count, 100, 2, &[rule(60, 5)]).await.unwrap();
        store.try_admit("short", WindowOp::Count, 101, 3, &[rule(1, 5)]).await.unwrap();

        // short expires at 103, long at 220
        store.try_admit("x", WindowOp::Count, 150, 4, &[rule(1, 5)]).await.unwrap();
        assert_eq!(store.key_count(), 2);
        assert_eq!(store.scores("long"), vec![100]);
        assert!(store.scores("short").is_empty());
    }

    #[tokio::test]
    async fn denials_and_rule_free_checks_create_no_keys() {
        let store = InMemoryCounterStore::new();
        let reply = store.try_admit("heavy", WindowOp::Weight(20), 100, 1, &[rule(60, 10)]).await.unwrap();
        assert!(matches!(reply, StoreReply::Text(text) if text.starts_with("false:60:")));
        let reply = store.try_admit("free", WindowOp::Count, 100, 2, &[]).await.unwrap();
        assert_eq!(reply, StoreReply::Text(ADMITTED.to_string()));
        assert_eq!(store.key_count(), 0);
    }

    #[tokio::test]
    async fn expired_bucket_starts_empty() {
        let store = InMemoryCounterStore::new();
        let rules = [rule(5, 1)];
        admit(&store, WindowOp::Count, 100, &rules).await;
        // TTL is 110; an entry inside a long window would still be gone after expiry.
        let wide = [rule(1000, 1)];
        assert_eq!(admit(&store, WindowOp::Count, 110, &wide).await, "true:");
        assert_eq!(store.scores("k"), vec![110]);
    }
}
