//! Stock entries, adjustments and the low-stock read policy.

use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::aggregates::{AdjustmentDirection, LedgerEntry, Product, StockMovement, StockStatus, MIN_SALE_QUANTITY};
use crate::domain::events::{DomainEvent, StockEvent};
use crate::domain::value_objects::{Money, Quantity};
use crate::store::DataStore;
use crate::{KardexError, Result};

#[derive(Clone, Debug, Serialize)]
pub struct StockOutcome {
    pub entry: LedgerEntry,
    pub product: Product,
}

impl StockOutcome {
    pub fn event(&self) -> DomainEvent {
        DomainEvent::Stock(StockEvent::Moved {
            product_id: self.product.id(), kind: self.entry.kind(),
            quantity: self.entry.quantity().value(), on_hand: self.product.on_hand_units().value(),
        })
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct StockAlert {
    pub product: Product,
    pub status: StockStatus,
}

/// Products that are out of stock or at/below `threshold`, emptiest first.
pub fn low_stock_alerts(products: &[Product], threshold: Decimal) -> Vec<StockAlert> {
    let mut alerts: Vec<StockAlert> = products.iter()
        .filter_map(|p| match p.stock_status(threshold) {
            StockStatus::InStock => None,
            status => Some(StockAlert { product: p.clone(), status }),
        })
        .collect();
    alerts.sort_by(|a, b| a.product.on_hand_units().cmp(&b.product.on_hand_units()).then_with(|| a.product.name().cmp(b.product.name())));
    alerts
}

pub struct StockService {
    store: Arc<dyn DataStore>,
}

impl StockService {
    pub fn new(store: Arc<dyn DataStore>) -> Self { Self { store } }

    #[tracing::instrument(skip(self, note))]
    pub async fn record_stock_in(&self, product_id: Uuid, quantity: Decimal, total_cost: Decimal, note: &str) -> Result<StockOutcome> {
        let quantity = Quantity::new(quantity)?;
        if quantity.value() < MIN_SALE_QUANTITY {
            return Err(KardexError::Validation(format!("Stock entry quantity must be at least {}", MIN_SALE_QUANTITY)));
        }
        if total_cost.is_sign_negative() {
            return Err(KardexError::Validation("Stock entry cost cannot be negative".into()));
        }
        let total_cost = Money::check_amount(total_cost)?;
        self.commit_one(StockMovement::stock_in(product_id, quantity, total_cost, note.trim())).await
    }

    #[tracing::instrument(skip(self, reason))]
    pub async fn record_adjustment(&self, product_id: Uuid, quantity: Decimal, direction: AdjustmentDirection, reason: &str) -> Result<StockOutcome> {
        let quantity = Quantity::new(quantity)?;
        if quantity.is_zero() {
            return Err(KardexError::Validation("Adjustment quantity must be greater than zero".into()));
        }
        if reason.trim().is_empty() {
            return Err(KardexError::Validation("Adjustment reason is required".into()));
        }
        self.commit_one(StockMovement::adjustment(product_id, quantity, direction, reason.trim())).await
    }

    pub async fn low_stock_alerts(&self, threshold: Decimal) -> Result<Vec<StockAlert>> {
        Ok(low_stock_alerts(&self.store.list_products().await?, threshold))
    }

    async fn commit_one(&self, movement: StockMovement) -> Result<StockOutcome> {
        let product_id = movement.product_ref;
        let mut committed = self.store.commit_movements(vec![movement]).await?;
        let entry = committed.entries.pop().ok_or_else(|| KardexError::StorageError("store returned no entry".into()))?;
        let product = committed.products.pop().ok_or(KardexError::ProductNotFound(product_id))?;
        tracing::info!(product = %product.code(), kind = %entry.kind(), on_hand = %product.on_hand_units(), "stock moved");
        Ok(StockOutcome { entry, product })
    }
}
