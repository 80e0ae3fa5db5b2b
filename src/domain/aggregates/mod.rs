//! Aggregates module
pub mod product;
pub mod ledger_entry;
pub mod sale;

pub use product::{Product, ProductError, StockStatus};
pub use ledger_entry::{AdjustmentDirection, EntryKind, LedgerEntry, StockMovement, UnknownEntryKind};
pub use sale::{Receipt, ReceiptLine, Sale, SaleError, SaleLine, MIN_SALE_QUANTITY};
