use crate::context::CheckContext;
use crate::error::AdmissionError;
use crate::manager::AdmissionManager;
use crate::rate_limit::Decision;
use crate::request::RequestDescriptor;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// Requests that can describe themselves to the admission manager.
pub trait Admissible {
    fn descriptor(&self) -> RequestDescriptor;

    /// Cancellation and deadline for this request's admission check.
    fn check_context(&self) -> CheckContext {
        CheckContext::default()
    }
}

impl Admissible for RequestDescriptor {
    fn descriptor(&self) -> RequestDescriptor {
        self.clone()
    }
}

/// Error returned by [`AdmissionService`].
#[derive(Debug, thiserror::Error)]
pub enum AdmissionServiceError<E> {
    /// The manager denied the call; the inner service was not called.
    #[error("request denied: {} (retry after {:?})", .0.reason, .0.retry_after)]
    Denied(Decision),
    /// The admission check itself failed; the inner service was not called.
    #[error(transparent)]
    Admission(AdmissionError),
    /// The inner service failed.
    #[error("{0}")]
    Inner(#[source] E),
}

impl<E> AdmissionServiceError<E> {
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied(_))
    }

    /// How long to back off before retrying, when the call was denied.
    pub fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::Denied(decision) => Some(decision.retry_after),
            _ => None,
        }
    }

    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}

/// A layer that runs every request through an [`AdmissionManager`] first.
#[derive(Clone, Debug)]
pub struct AdmissionLayer {
    manager: AdmissionManager,
}

impl AdmissionLayer {
    /// Create a new admission layer.
    pub fn new(manager: AdmissionManager) -> Self {
        Self { manager }
    }
}

impl<S> Layer<S> for AdmissionLayer {
    type Service = AdmissionService<S>;

    fn layer(&self, service: S) -> Self::Service {
        AdmissionService { inner: service, manager: self.manager.clone() }
    }
}

/// Middleware service that only forwards admitted requests.
#[derive(Clone, Debug)]
pub struct AdmissionService<S> {
    inner: S,
    manager: AdmissionManager,
}

impl<S, Req> Service<Req> for AdmissionService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    Req: Admissible + Send + 'static,
{
    type Response = S::Response;
    type Error = AdmissionServiceError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(AdmissionServiceError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let manager = self.manager.clone();
        // take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let descriptor = req.descriptor();
            let ctx = req.check_context();
            match manager.pre_check(&ctx, &descriptor).await {
                Ok(decision) if decision.allowed => {
                    inner.call(req).await.map_err(AdmissionServiceError::Inner)
                }
                Ok(decision) => Err(AdmissionServiceError::Denied(decision)),
                Err(err) => Err(AdmissionServiceError::Admission(err)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{AdmissionConfig, VenueRules};
    use crate::rate_limit::rules::{RateLimitRule, RuleTable, WeightTable};
    use crate::rate_limit::store::InMemoryCounterStore;
    use crate::request::{Exchange, MarketType};
    use futures::future::{ready, Ready};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Clone)]
    struct Counting {
        calls: Arc<AtomicUsize>,
    }

    impl Service<RequestDescriptor> for Counting {
        type Response = &'static str;
        type Error = std::io::Error;
        type Future = Ready<Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: RequestDescriptor) -> Self::Future {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ready(Ok("sent"))
        }
    }

    fn manager() -> AdmissionManager {
        let rules = VenueRules {
            rules: RuleTable::new()
                .with_rule("binance:spot:request:1m", RateLimitRule::from_parts(60, 2)),
            weights: WeightTable::new().with_weight("binance:spot:request:weight", 1),
        };
        AdmissionManager::builder(AdmissionConfig::empty().with_venue(Exchange::Binance, rules))
            .store(Arc::new(InMemoryCounterStore::new()))
            .clock(Arc::new(ManualClock::new(50)))
            .build()
    }

    #[tokio::test]
    async fn forwards_until_denied() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut svc = AdmissionLayer::new(manager()).layer(Counting { calls: calls.clone() });
        let req = RequestDescriptor::normal(Exchange::Binance, MarketType::Spot).with_ip("ip");

        assert_eq!(svc.call(req.clone()).await.unwrap(), "sent");
        assert_eq!(svc.call(req.clone()).await.unwrap(), "sent");
        let err = svc.call(req).await.unwrap_err();
        assert!(err.is_denied());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(60)));
        assert!(err.to_string().starts_with("request denied: Weight limit exceeded"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn admission_errors_skip_inner_service() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut svc = AdmissionLayer::new(manager()).layer(Counting { calls: calls.clone() });
        let req = RequestDescriptor::order(Exchange::Okx, MarketType::Spot, "a");

        let err = svc.call(req).await.unwrap_err();
        assert!(matches!(err, AdmissionServiceError::Admission(AdmissionError::UnsupportedExchange(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
