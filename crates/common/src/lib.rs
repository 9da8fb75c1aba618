//! Shared value types for the retail orchestrator workspace.
//!
//! These types cross crate boundaries: the RPC proxies serialize them onto the
//! wire and the sagas carry them through a run.

pub mod catalog;
pub mod types;

pub use catalog::{CartLine, Product, StockDelta, StockDirection};
pub use types::{ORIGIN_ORCHESTRATOR, ORIGIN_SUPPLIERS, RunId};
