//! Compile-time prelude coverage test.
use std::sync::Arc;
use tollgate::prelude::*;
use tower_layer::Layer;
use tower_service::Service;

#[derive(Clone)]
struct Echo;

impl Service<RequestDescriptor> for Echo {
    type Response = Exchange;
    type Error = std::io::Error;
    type Future = futures::future::Ready<Result<Exchange, std::io::Error>>;

    fn poll_ready(&mut self, _cx: &mut std::task::Context<'_>) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: RequestDescriptor) -> Self::Future {
        futures::future::ready(Ok(req.exchange))
    }
}

#[tokio::test]
async fn prelude_reexports_core_types() {
    let store: Arc<dyn CounterStore> = Arc::new(InMemoryCounterStore::new());
    let manager = AdmissionManager::builder(AdmissionConfig::default()).store(store).build();

    let mut svc = AdmissionLayer::new(manager).layer(Echo);
    let req = RequestDescriptor::normal(Exchange::Binance, MarketType::Spot).with_ip("127.0.0.1");
    assert_eq!(svc.call(req).await.expect("service call failed"), Exchange::Binance);
}
