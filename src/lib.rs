#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # tollgate
//!
//! Distributed admission control for rate-limited exchange APIs. Before every
//! outbound call, ask the [`AdmissionManager`] whether it may proceed; if it
//! says yes, the call has already been counted.
//!
//! ## Features
//!
//! - **Sliding-window counting** per account (order caps)
//! - **Sliding-window weighted budgets** per IP (request weight caps)
//! - **Rule resolution** by exact key, then by hierarchical prefix, so one bucket
//!   can carry several windows
//! - **Atomic checks** evaluated inside the shared store, safe across processes
//! - **Fail-open** on missing configuration, **fail-closed** on store failure
//! - **Tower middleware** that refuses denied calls before they leave the process
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use tollgate::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let manager = AdmissionManager::builder(AdmissionConfig::default())
//!     .store(Arc::new(InMemoryCounterStore::new()))
//!     .build();
//!
//! let request = RequestDescriptor::normal(Exchange::Binance, MarketType::Spot).with_ip("10.0.0.1");
//! let decision = manager.decide(&CheckContext::new(), &request).await;
//! if decision.allowed {
//!     // issue the call
//! } else {
//!     // wait at least decision.retry_after
//! }
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod prelude;
pub mod rate_limit;
pub mod request;
pub mod venues;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AdmissionConfig, VenueRules};
pub use context::CheckContext;
pub use error::{AdmissionError, ConfigError, StoreError};
pub use manager::{AdmissionManager, AdmissionManagerBuilder};
pub use rate_limit::{Decision, RateLimitRule};
pub use request::{Exchange, MarketType, RequestDescriptor, RequestType};
pub use tokio_util::sync::CancellationToken;
