//! REST backend for slipway.
//!
//! [`RestClient`] implements the `slipway-core` API traits against an
//! Azure-DevOps-style source-control/work-tracking service. Every call is
//! wrapped in the bounded exponential-backoff policy from [`retry`].

pub mod client;
pub mod config;
pub mod retry;

pub use client::RestClient;
pub use config::RemoteConfig;
pub use retry::{with_backoff, RetryPolicy};
