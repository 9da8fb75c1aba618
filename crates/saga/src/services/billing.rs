//! Billing service trait, RPC proxy and in-memory implementation.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{CartLine, StockDirection};
use rpc::RpcClient;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::config::CallTimeouts;
use crate::error::SagaError;

/// An invoice produced by billing.
///
/// Opaque to the orchestrator: it is forwarded verbatim to transport and to
/// the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Invoice(pub Value);

impl Invoice {
    /// Interprets a `fetch_latest_invoice` result. Null, empty objects and
    /// empty arrays mean no invoice is available.
    pub fn from_fetch_result(result: Value) -> Option<Invoice> {
        let payload = match result {
            Value::Object(mut map) if map.contains_key("invoice") => {
                map.remove("invoice").unwrap_or(Value::Null)
            }
            other => other,
        };
        match &payload {
            Value::Null => None,
            Value::Object(map) if map.is_empty() => None,
            Value::Array(items) if items.is_empty() => None,
            _ => Some(Invoice(payload)),
        }
    }
}

/// Trait for billing operations.
#[async_trait]
pub trait BillingService: Send + Sync {
    /// Asks billing to issue an invoice for the lines.
    async fn generate_invoice(
        &self,
        lines: &[CartLine],
        origin: &str,
        kind: StockDirection,
    ) -> Result<Value, SagaError>;

    /// Fetches the most recent invoice, if billing has one.
    async fn fetch_latest_invoice(&self, origin: &str) -> Result<Option<Invoice>, SagaError>;
}

/// Billing proxy over JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcBillingService {
    client: RpcClient,
    timeouts: CallTimeouts,
}

impl RpcBillingService {
    pub fn new(client: RpcClient, timeouts: CallTimeouts) -> Self {
        Self { client, timeouts }
    }
}

#[async_trait]
impl BillingService for RpcBillingService {
    async fn generate_invoice(
        &self,
        lines: &[CartLine],
        origin: &str,
        kind: StockDirection,
    ) -> Result<Value, SagaError> {
        let ack = self
            .client
            .call(
                "generate_invoice",
                &json!({ "cart": lines, "origin": origin, "kind": kind }),
                Some(self.timeouts.invoice_generation),
            )
            .await?;
        Ok(ack)
    }

    async fn fetch_latest_invoice(&self, origin: &str) -> Result<Option<Invoice>, SagaError> {
        let result: Value = self
            .client
            .call(
                "fetch_latest_invoice",
                &json!({ "origin": origin }),
                Some(self.timeouts.default),
            )
            .await?;
        Ok(Invoice::from_fetch_result(result))
    }
}

/// Sales tax applied by the in-memory billing.
const VAT_RATE: f64 = 0.19;
const EXTRA_TAX_RATE: f64 = 0.04;

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[derive(Debug, Default)]
struct InMemoryBillingState {
    invoices: Vec<Invoice>,
    fail_on_generate: bool,
    fail_on_fetch: bool,
}

/// In-memory billing for testing and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBillingService {
    state: Arc<RwLock<InMemoryBillingState>>,
}

impl InMemoryBillingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_on_generate(&self, fail: bool) {
        self.state.write().unwrap().fail_on_generate = fail;
    }

    pub fn set_fail_on_fetch(&self, fail: bool) {
        self.state.write().unwrap().fail_on_fetch = fail;
    }

    pub fn invoice_count(&self) -> usize {
        self.state.read().unwrap().invoices.len()
    }

    pub fn invoices(&self) -> Vec<Invoice> {
        self.state.read().unwrap().invoices.clone()
    }
}

#[async_trait]
impl BillingService for InMemoryBillingService {
    async fn generate_invoice(
        &self,
        lines: &[CartLine],
        origin: &str,
        kind: StockDirection,
    ) -> Result<Value, SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_generate {
            return Err(SagaError::BillingService(
                "Billing unavailable".to_string(),
            ));
        }

        let subtotal: f64 = lines.iter().map(CartLine::line_total).sum();
        let vat = round_cents(subtotal * VAT_RATE);
        let extra_tax = round_cents(subtotal * EXTRA_TAX_RATE);
        let number = state.invoices.len() + 1;
        state.invoices.push(Invoice(json!({
            "number": format!("INV-{number:04}"),
            "origin": origin,
            "kind": kind,
            "products": lines,
            "subtotal": subtotal,
            "vat": vat,
            "extra_tax": extra_tax,
            "total": round_cents(subtotal + vat + extra_tax),
        })));

        Ok(json!({ "message": "Invoice generated" }))
    }

    async fn fetch_latest_invoice(&self, _origin: &str) -> Result<Option<Invoice>, SagaError> {
        let state = self.state.read().unwrap();
        if state.fail_on_fetch {
            return Err(SagaError::BillingService(
                "Billing unavailable".to_string(),
            ));
        }
        Ok(state.invoices.last().cloned())
    }
}
