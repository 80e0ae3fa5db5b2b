//! Sale Recorder
//!
//! The only writer of `SALE` entries. A sale is validated in full before the
//! store is touched, then committed as one batch so a failure can never leave
//! half a sale behind.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{EntryKind, Product, Receipt, Sale, SaleLine};
use crate::domain::events::{DomainEvent, SaleEvent, StockEvent};
use crate::store::DataStore;
use crate::{KardexError, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: Uuid,
    pub unit_price: Decimal,
    pub quantity: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct SaleOutcome {
    pub receipt: Receipt,
    /// Affected products with their updated on-hand units.
    pub products: Vec<Product>,
}

impl SaleOutcome {
    pub fn events(&self) -> Vec<DomainEvent> {
        let mut events = vec![DomainEvent::Sale(SaleEvent::Recorded {
            reference: self.receipt.reference.clone(),
            customer_name: self.receipt.customer_name.clone(),
            lines: self.receipt.lines.len(),
            total: self.receipt.grand_total.amount(),
        })];
        for line in &self.receipt.lines {
            if let Some(p) = self.products.iter().find(|p| p.id() == line.product_ref) {
                events.push(DomainEvent::Stock(StockEvent::Moved {
                    product_id: p.id(), kind: EntryKind::Sale, quantity: line.quantity.value(), on_hand: p.on_hand_units().value(),
                }));
            }
        }
        events
    }
}

pub struct SaleRecorder {
    store: Arc<dyn DataStore>,
    currency: String,
}

impl SaleRecorder {
    pub fn new(store: Arc<dyn DataStore>, currency: impl Into<String>) -> Self {
        Self { store, currency: currency.into() }
    }

    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn record_sale(&self, customer_name: &str, lines: &[SaleLineRequest]) -> Result<SaleOutcome> {
        Sale::check_header(customer_name, lines.len())?;

        let mut sale_lines = Vec::with_capacity(lines.len());
        for line in lines {
            let product = self.store.get_product(line.product_id).await?
                .ok_or(KardexError::ProductNotFound(line.product_id))?;
            sale_lines.push(SaleLine::for_product(&product, line.unit_price, line.quantity));
        }
        let sale = Sale::new(customer_name, sale_lines)?;

        let committed = self.store.commit_movements(sale.movements()).await.map_err(|e| {
            tracing::error!(error = %e, "sale was not recorded");
            e
        })?;
        let issued_at = committed.entries.first().map(|e| e.timestamp()).unwrap_or_else(Utc::now);
        let receipt = sale.receipt(issued_at, &self.currency);

        tracing::info!(reference = %receipt.reference, total = %receipt.grand_total.amount(), "sale recorded");
        Ok(SaleOutcome { receipt, products: committed.products })
    }
}
