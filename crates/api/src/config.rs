//! Application configuration loaded from environment variables.

use std::time::Duration;

use saga::{CallTimeouts, Endpoints, SagaConfig};

/// Server and orchestrator configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `5010`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `INVENTORY_URL`, `STOREFRONT_URL`, `LEDGER_URL`, `BILLING_URL`,
///   `SUPPLIER_URL`, `TRANSPORT_URL`: collaborator base URLs
///   (default: `http://127.0.0.1:5001` through `:5006`)
/// - `LOW_STOCK_THRESHOLD` (default: `5`), `TARGET_STOCK_LEVEL` (default: `20`)
/// - `RPC_TIMEOUT_SECS` (default: `5`), `INVOICE_TIMEOUT_SECS` (default: `15`),
///   `LOW_STOCK_QUERY_TIMEOUT_SECS` (default: `10`); a call timeout of `0`
///   keeps the default
/// - `CART_CAPTURE_MAX_WAIT_SECS` (default: `600`; `0` waits indefinitely)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub endpoints: Endpoints,
    pub saga: SagaConfig,
    pub timeouts: CallTimeouts,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let string = |key: &str, default: String| lookup(key).unwrap_or(default);
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());
        let number = |key: &str| lookup(key).and_then(|v| v.trim().parse::<i64>().ok());
        // A zero call timeout would fail every call immediately.
        let secs = |key: &str, default: Duration| {
            parsed(key)
                .filter(|&n| n > 0)
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let endpoints = Endpoints {
            inventory: string("INVENTORY_URL", defaults.endpoints.inventory),
            storefront: string("STOREFRONT_URL", defaults.endpoints.storefront),
            ledger: string("LEDGER_URL", defaults.endpoints.ledger),
            billing: string("BILLING_URL", defaults.endpoints.billing),
            supplier: string("SUPPLIER_URL", defaults.endpoints.supplier),
            transport: string("TRANSPORT_URL", defaults.endpoints.transport),
        };

        let cart_capture_max_wait = match parsed("CART_CAPTURE_MAX_WAIT_SECS") {
            Some(0) => None,
            Some(n) => Some(Duration::from_secs(n)),
            None => defaults.saga.cart_capture_max_wait,
        };
        let saga = SagaConfig {
            low_stock_threshold: number("LOW_STOCK_THRESHOLD")
                .unwrap_or(defaults.saga.low_stock_threshold),
            target_stock_level: number("TARGET_STOCK_LEVEL")
                .unwrap_or(defaults.saga.target_stock_level),
            cart_capture_max_wait,
        };

        let timeouts = CallTimeouts {
            default: secs("RPC_TIMEOUT_SECS", defaults.timeouts.default),
            invoice_generation: secs("INVOICE_TIMEOUT_SECS", defaults.timeouts.invoice_generation),
            low_stock_query: secs(
                "LOW_STOCK_QUERY_TIMEOUT_SECS",
                defaults.timeouts.low_stock_query,
            ),
            catalog_load: defaults.timeouts.catalog_load,
        };

        Self {
            host: string("HOST", defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: string("RUST_LOG", defaults.log_level),
            endpoints,
            saga,
            timeouts,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5010,
            log_level: "info".to_string(),
            endpoints: Endpoints::default(),
            saga: SagaConfig::default(),
            timeouts: CallTimeouts::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5010);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.saga.low_stock_threshold, 5);
        assert_eq!(config.saga.target_stock_level, 20);
        assert_eq!(config.endpoints.inventory, "http://127.0.0.1:5001");
        assert_eq!(config.timeouts.invoice_generation, Duration::from_secs(15));
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.port, 5010);
        assert_eq!(
            config.saga.cart_capture_max_wait,
            Some(Duration::from_secs(600))
        );
        assert_eq!(config.endpoints, Endpoints::default());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("INVENTORY_URL", "http://inventory:9000"),
            ("LOW_STOCK_THRESHOLD", "2"),
            ("TARGET_STOCK_LEVEL", "50"),
            ("RPC_TIMEOUT_SECS", "1"),
            ("CART_CAPTURE_MAX_WAIT_SECS", "30"),
        ]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.endpoints.inventory, "http://inventory:9000");
        assert_eq!(config.endpoints.ledger, "http://127.0.0.1:5003");
        assert_eq!(config.saga.low_stock_threshold, 2);
        assert_eq!(config.saga.target_stock_level, 50);
        assert_eq!(config.timeouts.default, Duration::from_secs(1));
        assert_eq!(
            config.saga.cart_capture_max_wait,
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_zero_cart_wait_is_unbounded() {
        let config = from_pairs(&[("CART_CAPTURE_MAX_WAIT_SECS", "0")]);
        assert_eq!(config.saga.cart_capture_max_wait, None);
    }

    #[test]
    fn test_zero_call_timeouts_keep_defaults() {
        let config = from_pairs(&[
            ("RPC_TIMEOUT_SECS", "0"),
            ("INVOICE_TIMEOUT_SECS", "0"),
            ("LOW_STOCK_QUERY_TIMEOUT_SECS", "0"),
            ("CART_CAPTURE_MAX_WAIT_SECS", "0"),
        ]);
        assert_eq!(config.timeouts, CallTimeouts::default());
        assert_eq!(config.saga.cart_capture_max_wait, None);
    }

    #[test]
    fn test_garbage_falls_back() {
        let config = from_pairs(&[("PORT", "not-a-port"), ("LOW_STOCK_THRESHOLD", "many")]);
        assert_eq!(config.port, 5010);
        assert_eq!(config.saga.low_stock_threshold, 5);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
