//! Catalog, cart and stock-change types exchanged with the collaborators.

use serde::{Deserialize, Serialize};

/// A product as reported by the inventory service.
///
/// The orchestrator only ever holds transient copies; inventory owns the
/// authoritative stock figure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "categoria", default)]
    pub category: String,
    #[serde(alias = "precio", default)]
    pub unit_price: f64,
    pub stock: i64,
}

impl Product {
    /// Returns true if the product is at or below the given stock level.
    pub fn is_low_stock(&self, threshold: i64) -> bool {
        self.stock <= threshold
    }

    /// Builds a cart line for this product with the stock it was read at.
    pub fn to_cart_line(&self, quantity: i64) -> CartLine {
        CartLine {
            product_id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            unit_price: self.unit_price,
            stock_at_read: self.stock,
            quantity,
        }
    }

    /// Applies a stock delta in place, returning the stock before the change.
    pub fn apply(&mut self, delta: &StockDelta) -> i64 {
        let before = self.stock;
        match delta.direction {
            StockDirection::Sale => self.stock -= delta.quantity,
            StockDirection::Purchase => self.stock += delta.quantity,
        }
        before
    }
}

/// One line of a cart or replenishment batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
    #[serde(rename = "id")]
    pub product_id: i64,
    #[serde(alias = "nombre")]
    pub name: String,
    #[serde(alias = "categoria", default)]
    pub category: String,
    #[serde(alias = "precio", default)]
    pub unit_price: f64,
    #[serde(rename = "stock", default)]
    pub stock_at_read: i64,
    #[serde(alias = "comprar", default)]
    pub quantity: i64,
}

impl CartLine {
    /// Returns the line total (unit price times quantity).
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }

    /// Returns the stock change this line represents in the given direction.
    pub fn delta(&self, direction: StockDirection) -> StockDelta {
        StockDelta {
            product_id: self.product_id,
            quantity: self.quantity,
            direction,
        }
    }
}

/// Whether a stock change subtracts (sale) or adds (purchase).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockDirection {
    #[serde(rename = "venta")]
    Sale,
    #[serde(rename = "compra")]
    Purchase,
}

impl StockDirection {
    /// Returns the wire name of the direction.
    pub fn as_str(&self) -> &'static str {
        match self {
            StockDirection::Sale => "venta",
            StockDirection::Purchase => "compra",
        }
    }
}

impl std::fmt::Display for StockDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The unit of change sent to inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDelta {
    pub product_id: i64,
    pub quantity: i64,
    pub direction: StockDirection,
}
