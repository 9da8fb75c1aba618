//! Static configuration for the sagas and their collaborator calls.

use std::time::Duration;

/// Stock level at or below which a product is replenished.
pub const DEFAULT_LOW_STOCK_THRESHOLD: i64 = 5;

/// Stock level a replenishment aims to reach.
pub const DEFAULT_TARGET_STOCK_LEVEL: i64 = 20;

/// Business thresholds and the cart-capture wait bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaConfig {
    pub low_stock_threshold: i64,
    pub target_stock_level: i64,
    /// Maximum time to wait for the customer's cart. `None` waits forever.
    pub cart_capture_max_wait: Option<Duration>,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: DEFAULT_LOW_STOCK_THRESHOLD,
            target_stock_level: DEFAULT_TARGET_STOCK_LEVEL,
            cart_capture_max_wait: Some(Duration::from_secs(600)),
        }
    }
}

/// Per-call timeout budgets used by the RPC proxies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeouts {
    /// Budget for any call without a specific entry below.
    pub default: Duration,
    pub invoice_generation: Duration,
    /// Catalog read issued by replenishment to find low-stock products.
    pub low_stock_query: Duration,
    /// Catalog read issued by the sale flow. `None` waits forever.
    pub catalog_load: Option<Duration>,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(5),
            invoice_generation: Duration::from_secs(15),
            low_stock_query: Duration::from_secs(10),
            catalog_load: None,
        }
    }
}

/// Base URLs of the collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub inventory: String,
    pub storefront: String,
    pub ledger: String,
    pub billing: String,
    pub supplier: String,
    pub transport: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            inventory: "http://127.0.0.1:5001".to_string(),
            storefront: "http://127.0.0.1:5002".to_string(),
            ledger: "http://127.0.0.1:5003".to_string(),
            billing: "http://127.0.0.1:5004".to_string(),
            supplier: "http://127.0.0.1:5005".to_string(),
            transport: "http://127.0.0.1:5006".to_string(),
        }
    }
}
