//! Ledger (kardex) entries
//!
//! A `LedgerEntry` is written exactly once when a movement is confirmed and is
//! never edited afterwards. Entries only come into existence through a
//! `StockMovement`, which also carries the signed delta the store applies to
//! the product's on-hand projection in the same commit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use uuid::Uuid;
use crate::domain::value_objects::Quantity;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind { Sale, StockIn, Adjustment }

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Sale => "SALE", Self::StockIn => "STOCK_IN", Self::Adjustment => "ADJUSTMENT" }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for EntryKind {
    type Err = UnknownEntryKind;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SALE" => Ok(Self::Sale),
            "STOCK_IN" => Ok(Self::StockIn),
            "ADJUSTMENT" => Ok(Self::Adjustment),
            other => Err(UnknownEntryKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub struct UnknownEntryKind(pub String);
impl std::error::Error for UnknownEntryKind {}
impl fmt::Display for UnknownEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "unknown entry kind '{}'", self.0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AdjustmentDirection { Increase, Decrease }

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    id: Uuid,
    product_ref: Uuid,
    kind: EntryKind,
    quantity: Quantity,
    total_amount: Option<Decimal>,
    note: String,
    timestamp: DateTime<Utc>,
}

impl LedgerEntry {
    /// Rebuilds an entry from a stored row.
    pub fn restore(id: Uuid, product_ref: Uuid, kind: EntryKind, quantity: Quantity, total_amount: Option<Decimal>, note: String, timestamp: DateTime<Utc>) -> Self {
        Self { id, product_ref, kind, quantity, total_amount, note, timestamp }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn product_ref(&self) -> Uuid { self.product_ref }
    pub fn kind(&self) -> EntryKind { self.kind }
    pub fn quantity(&self) -> Quantity { self.quantity }
    pub fn total_amount(&self) -> Option<Decimal> { self.total_amount }
    pub fn note(&self) -> &str { &self.note }
    pub fn timestamp(&self) -> DateTime<Utc> { self.timestamp }
}

/// A confirmed but not yet committed movement of one product.
#[derive(Clone, Debug, PartialEq)]
pub struct StockMovement {
    pub product_ref: Uuid,
    pub kind: EntryKind,
    pub quantity: Quantity,
    pub total_amount: Option<Decimal>,
    pub note: String,
    delta: Decimal,
}

impl StockMovement {
    pub fn sale(product_ref: Uuid, quantity: Quantity, total: Decimal, note: impl Into<String>) -> Self {
        Self { product_ref, kind: EntryKind::Sale, quantity, total_amount: Some(total), note: note.into(), delta: -quantity.value() }
    }

    pub fn stock_in(product_ref: Uuid, quantity: Quantity, cost: Decimal, note: impl Into<String>) -> Self {
        Self { product_ref, kind: EntryKind::StockIn, quantity, total_amount: Some(cost), note: note.into(), delta: quantity.value() }
    }

    pub fn adjustment(product_ref: Uuid, quantity: Quantity, direction: AdjustmentDirection, note: impl Into<String>) -> Self {
        let delta = match direction { AdjustmentDirection::Increase => quantity.value(), AdjustmentDirection::Decrease => -quantity.value() };
        Self { product_ref, kind: EntryKind::Adjustment, quantity, total_amount: None, note: note.into(), delta }
    }

    /// Signed change to apply to the on-hand projection.
    pub fn delta(&self) -> Decimal { self.delta }

    pub fn into_entry(self, timestamp: DateTime<Utc>) -> LedgerEntry {
        LedgerEntry {
            id: Uuid::now_v7(), product_ref: self.product_ref, kind: self.kind, quantity: self.quantity,
            total_amount: self.total_amount, note: self.note, timestamp,
        }
    }
}
