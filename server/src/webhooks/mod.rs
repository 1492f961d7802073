//! Webhooks
//!
//! Concurrent fan-out delivery of normalized events to the configured
//! destinations, with optional HMAC signing.

pub mod dispatch;
pub mod signing;

pub use dispatch::{
    DeliveryOutcome, DispatchError, DispatchReport, WebhookDispatcher, DEFAULT_DELIVERY_TIMEOUT,
};
