//! Inventory service trait, RPC proxy and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CartLine, Product, StockDirection};
use rpc::RpcClient;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::CallTimeouts;
use crate::error::SagaError;

/// A product the inventory cannot cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    pub name: String,
    #[serde(rename = "stock_actual")]
    pub in_stock: i64,
    #[serde(rename = "cantidad_solicitada")]
    pub requested: i64,
}

/// Verdict of a stock validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockValidation {
    pub available: bool,
    #[serde(rename = "mensaje", default)]
    pub message: String,
    #[serde(default, alias = "productos_sin_stock")]
    pub shortages: Vec<Shortage>,
}

/// Inventory's confirmation of an applied stock change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockUpdate {
    #[serde(rename = "mensaje", default)]
    pub message: String,
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Deserialize)]
struct Catalog {
    products: Vec<Product>,
}

/// Line sent to `validate_stock`: only the product and the requested quantity.
#[derive(Serialize)]
struct StockCheckLine {
    id: i64,
    quantity: i64,
}

/// Trait for inventory operations.
///
/// Validation and stock arithmetic happen on the inventory side; callers only
/// forward lines and trust the returned confirmation.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Reads the full catalog.
    async fn load_catalog(&self, origin: &str) -> Result<Vec<Product>, SagaError>;

    /// Reads the catalog to look for low-stock products.
    ///
    /// Same call as [`load_catalog`](Self::load_catalog); the RPC proxy gives
    /// it a bounded timeout.
    async fn load_catalog_for_restock(&self, origin: &str) -> Result<Vec<Product>, SagaError> {
        self.load_catalog(origin).await
    }

    /// Checks whether every line can be served from current stock.
    async fn validate_stock(&self, cart: &[CartLine]) -> Result<StockValidation, SagaError>;

    /// Subtracts (sale) or adds (purchase) each line's quantity.
    async fn apply_stock_delta(
        &self,
        lines: &[CartLine],
        direction: StockDirection,
    ) -> Result<StockUpdate, SagaError>;
}

/// Inventory proxy over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcInventoryService {
    client: RpcClient,
    timeouts: CallTimeouts,
}

impl RpcInventoryService {
    pub fn new(client: RpcClient, timeouts: CallTimeouts) -> Self {
        Self { client, timeouts }
    }
}

#[async_trait]
impl InventoryService for RpcInventoryService {
    async fn load_catalog(&self, origin: &str) -> Result<Vec<Product>, SagaError> {
        let catalog: Catalog = self
            .client
            .call("load_catalog", &json!({ "origin": origin }), self.timeouts.catalog_load)
            .await?;
        Ok(catalog.products)
    }

    async fn load_catalog_for_restock(&self, origin: &str) -> Result<Vec<Product>, SagaError> {
        let catalog: Catalog = self
            .client
            .call(
                "load_catalog",
                &json!({ "origin": origin }),
                Some(self.timeouts.low_stock_query),
            )
            .await?;
        Ok(catalog.products)
    }

    async fn validate_stock(&self, cart: &[CartLine]) -> Result<StockValidation, SagaError> {
        let lines: Vec<StockCheckLine> = cart
            .iter()
            .map(|line| StockCheckLine {
                id: line.product_id,
                quantity: line.quantity,
            })
            .collect();
        let validation = self
            .client
            .call(
                "validate_stock",
                &json!({ "cart": lines }),
                Some(self.timeouts.default),
            )
            .await?;
        Ok(validation)
    }

    async fn apply_stock_delta(
        &self,
        lines: &[CartLine],
        direction: StockDirection,
    ) -> Result<StockUpdate, SagaError> {
        let update = self
            .client
            .call(
                "apply_stock_delta",
                &json!({ "cart": lines, "direction": direction }),
                Some(self.timeouts.default),
            )
            .await?;
        Ok(update)
    }
}

/// A stock change as the in-memory inventory received it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDelta {
    pub direction: StockDirection,
    /// `(product_id, quantity)` per line, in request order.
    pub lines: Vec<(i64, i64)>,
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    products: Vec<Product>,
    catalog_loads: usize,
    validations: usize,
    applied: Vec<AppliedDelta>,
    fail_on_load: bool,
    fail_on_validate: bool,
    fail_on_apply: bool,
}

/// In-memory inventory service for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    /// Creates an inventory with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an inventory holding the given products.
    pub fn with_products(products: Vec<Product>) -> Self {
        let service = Self::default();
        service.state.write().unwrap().products = products;
        service
    }

    /// Creates an inventory seeded with the showroom furniture catalog.
    pub fn with_showroom_catalog() -> Self {
        let rows = [
            (1, "Sectional Sofa", "Living Room", 1200.0, 5),
            (2, "Dining Table", "Dining Room", 800.0, 10),
            (3, "Office Chair", "Office", 150.0, 20),
            (4, "Queen Bed", "Bedroom", 1000.0, 7),
            (5, "Bookshelf", "Storage", 200.0, 15),
            (6, "Coffee Table", "Living Room", 250.0, 12),
            (7, "Dining Chair", "Dining Room", 120.0, 30),
            (8, "Desk", "Office", 350.0, 8),
            (9, "Wardrobe", "Bedroom", 600.0, 4),
            (10, "Bar Stool", "Bar", 90.0, 25),
        ];
        Self::with_products(
            rows.into_iter()
                .map(|(id, name, category, unit_price, stock)| Product {
                    id,
                    name: name.to_string(),
                    category: category.to_string(),
                    unit_price,
                    stock,
                })
                .collect(),
        )
    }

    pub fn set_fail_on_load(&self, fail: bool) {
        self.state.write().unwrap().fail_on_load = fail;
    }

    pub fn set_fail_on_validate(&self, fail: bool) {
        self.state.write().unwrap().fail_on_validate = fail;
    }

    pub fn set_fail_on_apply(&self, fail: bool) {
        self.state.write().unwrap().fail_on_apply = fail;
    }

    /// Returns the current stock of a product.
    pub fn stock_of(&self, product_id: i64) -> Option<i64> {
        self.state
            .read()
            .unwrap()
            .products
            .iter()
            .find(|p| p.id == product_id)
            .map(|p| p.stock)
    }

    pub fn catalog_load_count(&self) -> usize {
        self.state.read().unwrap().catalog_loads
    }

    pub fn validation_count(&self) -> usize {
        self.state.read().unwrap().validations
    }

    /// Returns every stock change applied so far.
    pub fn applied_deltas(&self) -> Vec<AppliedDelta> {
        self.state.read().unwrap().applied.clone()
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn load_catalog(&self, _origin: &str) -> Result<Vec<Product>, SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_load {
            return Err(SagaError::InventoryService(
                "Catalog unavailable".to_string(),
            ));
        }
        state.catalog_loads += 1;
        Ok(state.products.clone())
    }

    async fn validate_stock(&self, cart: &[CartLine]) -> Result<StockValidation, SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_validate {
            return Err(SagaError::InventoryService(
                "Validation unavailable".to_string(),
            ));
        }
        state.validations += 1;

        let shortages: Vec<Shortage> = cart
            .iter()
            .filter_map(|line| {
                match state.products.iter().find(|p| p.id == line.product_id) {
                    Some(product) if product.stock >= line.quantity => None,
                    Some(product) => Some(Shortage {
                        name: product.name.clone(),
                        in_stock: product.stock,
                        requested: line.quantity,
                    }),
                    None => Some(Shortage {
                        name: line.name.clone(),
                        in_stock: 0,
                        requested: line.quantity,
                    }),
                }
            })
            .collect();

        Ok(if shortages.is_empty() {
            StockValidation {
                available: true,
                message: "Stock available for all products".to_string(),
                shortages,
            }
        } else {
            StockValidation {
                available: false,
                message: "Insufficient stock for some products".to_string(),
                shortages,
            }
        })
    }

    async fn apply_stock_delta(
        &self,
        lines: &[CartLine],
        direction: StockDirection,
    ) -> Result<StockUpdate, SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_apply {
            return Err(SagaError::InventoryService(
                "Stock update rejected".to_string(),
            ));
        }

        for line in lines {
            let delta = line.delta(direction);
            if let Some(product) = state.products.iter_mut().find(|p| p.id == delta.product_id) {
                product.apply(&delta);
            }
        }
        state.applied.push(AppliedDelta {
            direction,
            lines: lines.iter().map(|l| (l.product_id, l.quantity)).collect(),
        });

        Ok(StockUpdate {
            message: "Inventory updated".to_string(),
            products: state.products.clone(),
        })
    }
}
