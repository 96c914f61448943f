//! Per-call cancellation and deadline carried into the store round-trip.

use crate::error::AdmissionError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Caller-supplied cancellation signal and optional deadline for one check.
///
/// Cancellation and timeout are failures: the check is denied, never assumed
/// to have succeeded.
#[derive(Debug, Clone, Default)]
pub struct CheckContext {
    cancel: CancellationToken,
    timeout: Option<Duration>,
}

impl CheckContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tie this check to an existing cancellation token.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bound the store round-trip. Zero disables the deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = (timeout > Duration::ZERO).then_some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fill in a deadline when the caller did not set one.
    pub(crate) fn or_timeout(&self, fallback: Option<Duration>) -> Self {
        let mut ctx = self.clone();
        if ctx.timeout.is_none() {
            ctx.timeout = fallback;
        }
        ctx
    }

    /// Drive `fut` unless the caller cancels or the deadline passes first.
    pub async fn run<T, F>(&self, fut: F) -> Result<T, AdmissionError>
    where
        F: Future<Output = Result<T, AdmissionError>>,
    {
        if self.cancel.is_cancelled() {
            return Err(AdmissionError::Cancelled);
        }
        let guarded = async {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(AdmissionError::Cancelled),
                res = fut => res,
            }
        };
        match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(res) => res,
                Err(_) => Err(AdmissionError::Timeout(limit)),
            },
            None => guarded.await,
        }
    }
}
