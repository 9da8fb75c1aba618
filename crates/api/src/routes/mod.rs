//! HTTP route handlers.

pub mod health;
pub mod jsonrpc;
pub mod metrics;
