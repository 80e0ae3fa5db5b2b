//! OpenSASE Kardex
//!
//! Wholesale sales recorder and stock ledger for a footwear importer.
//!
//! ## Features
//! - Sale recording with printable receipts
//! - Write-once ledger (kardex) of sales, stock entries and adjustments
//! - On-hand stock projection with low-stock alerts
//! - Period and monthly sales/purchase reports

pub mod auth;
pub mod config;
pub mod document;
pub mod domain;
pub mod http;
pub mod services;
pub mod store;

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::aggregates::{ProductError, SaleError};
use crate::domain::value_objects::{MoneyError, ProductCodeError, QuantityError};

// =============================================================================
// Constants
// =============================================================================

/// Products at or below this many bulk units are reported as low stock.
pub const DEFAULT_LOW_STOCK_THRESHOLD: Decimal = Decimal::from_parts(3, 0, 0, false, 0);

/// Label shown for ledger entries whose product no longer exists.
pub const DELETED_PRODUCT_LABEL: &str = "Deleted product";

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum KardexError {
    #[error("{0}")]
    Validation(String),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Storage error: {0}")]
    StorageError(String),
}

impl From<SaleError> for KardexError {
    fn from(e: SaleError) -> Self { Self::Validation(e.to_string()) }
}

impl From<ProductError> for KardexError {
    fn from(e: ProductError) -> Self { Self::Validation(e.to_string()) }
}

impl From<ProductCodeError> for KardexError {
    fn from(e: ProductCodeError) -> Self { Self::Validation(e.to_string()) }
}

impl From<QuantityError> for KardexError {
    fn from(e: QuantityError) -> Self { Self::Validation(e.to_string()) }
}

impl From<MoneyError> for KardexError {
    fn from(e: MoneyError) -> Self { Self::Validation(e.to_string()) }
}

impl From<sqlx::Error> for KardexError {
    fn from(e: sqlx::Error) -> Self { Self::StorageError(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, KardexError>;
