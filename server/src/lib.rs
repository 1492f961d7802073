//! Hookline Server
//!
//! Turns messaging-protocol events into normalized webhook deliveries:
//! identities resolved to phone form, poll votes decrypted, own read
//! receipts debounced, and every event fanned out to all destinations.

pub mod api;
pub mod config;
pub mod identity;
pub mod payload;
pub mod pipeline;
pub mod polls;
pub mod protocol;
pub mod receipts;
pub mod router;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
