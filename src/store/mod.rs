//! Data Store contract shared by the sale recorder and the report aggregator.
//!
//! The ledger is append-only: the trait has no way to update or delete an
//! entry. Projection changes only happen through `commit_movements`, which
//! writes every entry and every clamped delta of a batch atomically.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::aggregates::{LedgerEntry, Product, StockMovement};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Result of a committed batch.
#[derive(Clone, Debug)]
pub struct Committed {
    pub entries: Vec<LedgerEntry>,
    /// Products touched by the batch, after the update, in first-touch order.
    pub products: Vec<Product>,
}

#[async_trait]
pub trait DataStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>>;

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>>;

    async fn insert_product(&self, product: &Product) -> Result<()>;

    /// Removes a catalog product. Ledger entries that mention it are kept.
    async fn delete_product(&self, id: Uuid) -> Result<bool>;

    /// Appends one ledger entry per movement and applies each movement's delta
    /// to its product as `max(0, on_hand + delta)`. All or nothing: an unknown
    /// product anywhere in the batch fails it with `ProductNotFound`.
    async fn commit_movements(&self, movements: Vec<StockMovement>) -> Result<Committed>;

    /// Entries with `from <= timestamp <= to`, newest first.
    async fn entries_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<LedgerEntry>>;
}
