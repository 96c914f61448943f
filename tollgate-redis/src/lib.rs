//! Redis counter store for `tollgate`.
//!
//! Each counter key is a sorted set scored by Unix seconds. Every admission
//! runs as one Lua script on the server, so concurrent checks against the same
//! key from any number of processes are serialized by Redis itself.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tollgate::{AdmissionConfig, AdmissionManager};
//! use tollgate_redis::RedisCounterStore;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedisCounterStore::connect("redis://127.0.0.1:6379").await?;
//! let manager = AdmissionManager::builder(AdmissionConfig::from_env())
//!     .store(Arc::new(store))
//!     .build();
//! # let _ = manager;
//! # Ok(()) }
//! ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, Script, Value};
use tollgate::rate_limit::{CounterStore, RateLimitRule, StoreReply, WindowOp};
use tollgate::StoreError;

const COUNT_SCRIPT: &str = include_str!("count.lua");
const WEIGHT_SCRIPT: &str = include_str!("weight.lua");

/// [`CounterStore`] backed by Redis sorted sets.
///
/// Cloning is cheap; clones share one multiplexed, auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    count_script: Script,
    weight_script: Script,
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Open a managed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client).await.map_err(map_redis_error)?;
        tracing::info!(url = %redact(url), "connected redis counter store");
        Ok(Self::new(conn))
    }

    pub fn new(conn: ConnectionManager) -> Self {
        Self {
            conn,
            count_script: Script::new(COUNT_SCRIPT),
            weight_script: Script::new(WEIGHT_SCRIPT),
        }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn try_admit(
        &self,
        key: &str,
        op: WindowOp,
        now_secs: u64,
        nonce: u32,
        rules: &[RateLimitRule],
    ) -> Result<StoreReply, StoreError> {
        let member = op.member(now_secs, nonce);
        let mut invocation = match op {
            WindowOp::Count => {
                let mut inv = self.count_script.prepare_invoke();
                inv.key(key).arg(now_secs).arg(member);
                inv
            }
            WindowOp::Weight(weight) => {
                let mut inv = self.weight_script.prepare_invoke();
                inv.key(key).arg(now_secs).arg(weight).arg(member);
                inv
            }
        };
        for rule in rules {
            invocation.arg(rule.window_secs()).arg(rule.threshold());
        }

        let mut conn = self.conn.clone();
        let value: Value = invocation.invoke_async(&mut conn).await.map_err(|err| {
            tracing::debug!(key, error = %err, "redis admission script failed");
            map_redis_error(err)
        })?;
        Ok(reply_from_value(value))
    }
}

fn reply_from_value(value: Value) -> StoreReply {
    match value {
        Value::BulkString(bytes) => match String::from_utf8(bytes) {
            Ok(text) => StoreReply::Text(text),
            Err(err) => StoreReply::Unexpected(format!("non-utf8 bulk string: {err}")),
        },
        Value::SimpleString(text) => StoreReply::Text(text),
        other => StoreReply::Unexpected(format!("{other:?}")),
    }
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        StoreError::Unavailable(err.to_string())
    } else {
        StoreError::Backend(err.to_string())
    }
}

// drop credentials before logging a connection url
fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme), Some(at)) if at > scheme => format!("{}://***{}", &url[..scheme], &url[at..]),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_replies_pass_through() {
        assert_eq!(
            reply_from_value(Value::BulkString(b"true:".to_vec())),
            StoreReply::Text("true:".into())
        );
        assert_eq!(
            reply_from_value(Value::SimpleString("false:10:full".into())),
            StoreReply::Text("false:10:full".into())
        );
    }

    #[test]
    fn other_shapes_are_unexpected() {
        assert!(matches!(reply_from_value(Value::Int(1)), StoreReply::Unexpected(_)));
        assert!(matches!(reply_from_value(Value::Nil), StoreReply::Unexpected(_)));
        assert!(matches!(
            reply_from_value(Value::BulkString(vec![0xff, 0xfe])),
            StoreReply::Unexpected(_)
        ));
    }

    #[test]
    fn bad_url_is_a_backend_error() {
        let err = redis::Client::open("not a url").map_err(map_redis_error).unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[test]
    fn redacts_credentials() {
        assert_eq!(redact("redis://user:pw@host:6379/0"), "redis://***@host:6379/0");
        assert_eq!(redact("redis://host:6379"), "redis://host:6379");
    }

    #[test]
    fn scripts_share_the_reply_format() {
        for script in [COUNT_SCRIPT, WEIGHT_SCRIPT] {
            assert!(script.contains("return 'true:'"));
            assert!(script.contains("'false:' .. window .. ':"));
            assert!(script.contains("'ZREMRANGEBYSCORE', key, '-inf', '(' .. (now - widest)"));
        }
    }
}
