//! Product Aggregate
//!
//! Only the parts of the catalog product the ledger needs: identity, the
//! labels printed on receipts, and the on-hand projection.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Money, MoneyError, ProductCode, Quantity, QuantityError};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: Uuid,
    code: ProductCode,
    name: String,
    unit_price: Decimal,
    on_hand_units: Quantity,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockStatus { OutOfStock, LowStock, InStock }

impl StockStatus {
    /// Read-side policy over the projection: zero is out of stock, anything
    /// up to and including the threshold is low.
    pub fn classify(on_hand: Quantity, threshold: Decimal) -> Self {
        if on_hand.is_zero() { Self::OutOfStock }
        else if on_hand.value() <= threshold { Self::LowStock }
        else { Self::InStock }
    }
}

impl Product {
    pub fn create(code: ProductCode, name: impl Into<String>, unit_price: Decimal, on_hand_units: Quantity) -> Result<Self, ProductError> {
        let name = name.into().trim().to_string();
        if name.is_empty() { return Err(ProductError::MissingName); }
        if unit_price.is_sign_negative() { return Err(ProductError::NegativePrice); }
        let unit_price = Money::check_amount(unit_price).map_err(ProductError::Price)?;
        let now = Utc::now();
        Ok(Self { id: Uuid::now_v7(), code, name, unit_price, on_hand_units, created_at: now, updated_at: now })
    }

    /// Rebuilds a product from a stored row.
    pub fn restore(id: Uuid, code: ProductCode, name: String, unit_price: Decimal, on_hand_units: Quantity, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, code, name, unit_price, on_hand_units, created_at, updated_at }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn code(&self) -> &ProductCode { &self.code }
    pub fn name(&self) -> &str { &self.name }
    pub fn unit_price(&self) -> Decimal { self.unit_price }
    pub fn on_hand_units(&self) -> Quantity { self.on_hand_units }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn stock_status(&self, threshold: Decimal) -> StockStatus { StockStatus::classify(self.on_hand_units, threshold) }

    /// Moves the projection by `delta`, clamping at zero.
    pub fn apply_delta(&mut self, delta: Decimal) -> Result<(), QuantityError> {
        self.on_hand_units = self.on_hand_units.apply_delta(delta)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum ProductError { MissingName, NegativePrice, Price(MoneyError) }
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Missing name"),
            Self::NegativePrice => write!(f, "Price cannot be negative"),
            Self::Price(e) => write!(f, "Invalid price: {}", e),
        }
    }
}
