//! Sale Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::{Product, StockMovement};
use crate::domain::value_objects::{Money, Quantity, MAX_AMOUNT};

/// Smallest sellable quantity: half a bulk unit.
pub const MIN_SALE_QUANTITY: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

#[derive(Clone, Debug)]
pub struct SaleLine {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_code: String,
    pub unit_price: Decimal,
    pub quantity: Decimal,
}

impl SaleLine {
    pub fn for_product(product: &Product, unit_price: Decimal, quantity: Decimal) -> Self {
        Self {
            product_id: product.id(), product_name: product.name().to_string(), product_code: product.code().to_string(),
            unit_price, quantity,
        }
    }
}

/// A validated wholesale sale, ready to be turned into ledger movements.
#[derive(Clone, Debug)]
pub struct Sale {
    customer_name: String,
    lines: Vec<ValidLine>,
    total: Decimal,
}

#[derive(Clone, Debug)]
struct ValidLine { line: SaleLine, quantity: Quantity, subtotal: Decimal }

impl ValidLine {
    /// Checks one line; `Err` hands it back as offending.
    fn check(line: SaleLine) -> Result<Self, SaleLine> {
        let Ok(quantity) = Quantity::new(line.quantity) else { return Err(line) };
        let Ok(price) = Money::check_amount(line.unit_price) else { return Err(line) };
        if price <= Decimal::ZERO || quantity.value() < MIN_SALE_QUANTITY { return Err(line); }
        let Some(subtotal) = price.checked_mul(quantity.value()) else { return Err(line) };
        let subtotal = subtotal.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if subtotal > MAX_AMOUNT { return Err(line); }
        Ok(Self { line: SaleLine { unit_price: price, ..line }, quantity, subtotal })
    }
}

impl Sale {
    /// Cheap checks that need no product lookup.
    pub fn check_header(customer_name: &str, line_count: usize) -> Result<(), SaleError> {
        if customer_name.trim().is_empty() { return Err(SaleError::MissingCustomer); }
        if line_count == 0 { return Err(SaleError::NoLines); }
        Ok(())
    }

    pub fn new(customer_name: &str, lines: Vec<SaleLine>) -> Result<Self, SaleError> {
        Self::check_header(customer_name, lines.len())?;
        let mut offending = Vec::new();
        let mut valid = Vec::with_capacity(lines.len());
        for line in lines {
            match ValidLine::check(line) {
                Ok(line) => valid.push(line),
                Err(line) => offending.push(line.product_name),
            }
        }
        if !offending.is_empty() { return Err(SaleError::InvalidLines(offending)); }
        let total = valid.iter().try_fold(Decimal::ZERO, |acc, l| acc.checked_add(l.subtotal)).ok_or(SaleError::TotalTooLarge)?;
        Ok(Self { customer_name: customer_name.trim().to_string(), lines: valid, total })
    }

    pub fn customer_name(&self) -> &str { &self.customer_name }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn total(&self) -> Decimal { self.total }

    pub fn note(&self) -> String { format!("Sale - Customer: {}", self.customer_name) }

    /// One `SALE` movement per line, in line order.
    pub fn movements(&self) -> Vec<StockMovement> {
        let note = self.note();
        self.lines.iter().map(|l| StockMovement::sale(l.line.product_id, l.quantity, l.subtotal, note.clone())).collect()
    }

    pub fn receipt(&self, issued_at: DateTime<Utc>, currency: &str) -> Receipt {
        let lines = self.lines.iter().map(|l| ReceiptLine {
            product_ref: l.line.product_id, product_name: l.line.product_name.clone(), product_code: l.line.product_code.clone(),
            quantity: l.quantity, unit_price: Money::new(l.line.unit_price, currency), subtotal: Money::new(l.subtotal, currency),
        }).collect();
        Receipt {
            reference: format!("V-{}", issued_at.timestamp_millis()), issued_at,
            customer_name: self.customer_name.clone(), lines, grand_total: Money::new(self.total, currency),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Receipt {
    pub reference: String,
    pub issued_at: DateTime<Utc>,
    pub customer_name: String,
    pub lines: Vec<ReceiptLine>,
    pub grand_total: Money,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReceiptLine {
    pub product_ref: Uuid,
    pub product_name: String,
    pub product_code: String,
    pub quantity: Quantity,
    pub unit_price: Money,
    pub subtotal: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum SaleError { MissingCustomer, NoLines, InvalidLines(Vec<String>), TotalTooLarge }
impl std::error::Error for SaleError {}
impl std::fmt::Display for SaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingCustomer => write!(f, "Customer name is required"),
            Self::NoLines => write!(f, "A sale needs at least one line item"),
            Self::InvalidLines(names) => write!(f, "Invalid price or quantity for: {}", names.join(", ")),
            Self::TotalTooLarge => write!(f, "Sale total is too large"),
        }
    }
}
