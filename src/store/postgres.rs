//! PostgreSQL store backed by a `sqlx` pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use uuid::Uuid;

use super::{Committed, DataStore};
use crate::domain::aggregates::{LedgerEntry, Product, StockMovement};
use crate::domain::value_objects::{ProductCode, Quantity};
use crate::{KardexError, Result};

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    code: String,
    name: String,
    unit_price: Decimal,
    on_hand_units: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = KardexError;
    fn try_from(r: ProductRow) -> Result<Self> {
        Ok(Product::restore(r.id, ProductCode::new(r.code)?, r.name, r.unit_price, Quantity::new(r.on_hand_units)?, r.created_at, r.updated_at))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EntryRow {
    id: Uuid,
    product_ref: Uuid,
    kind: String,
    quantity: Decimal,
    total_amount: Option<Decimal>,
    note: String,
    timestamp: DateTime<Utc>,
}

impl TryFrom<EntryRow> for LedgerEntry {
    type Error = KardexError;
    fn try_from(r: EntryRow) -> Result<Self> {
        let kind = r.kind.parse().map_err(|e: crate::domain::aggregates::UnknownEntryKind| KardexError::StorageError(e.to_string()))?;
        Ok(LedgerEntry::restore(r.id, r.product_ref, kind, Quantity::new(r.quantity)?, r.total_amount, r.note, r.timestamp))
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        tracing::info!(max_connections, "PostgreSQL connection pool established");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await.map_err(|e| KardexError::StorageError(format!("Migration failed: {}", e)))?;
        tracing::info!("Database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products ORDER BY name")
            .fetch_all(&self.pool).await?
            .into_iter().map(Product::try_from).collect()
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        sqlx::query_as::<_, ProductRow>("SELECT * FROM products WHERE id = $1")
            .bind(id).fetch_optional(&self.pool).await?
            .map(Product::try_from).transpose()
    }

    async fn insert_product(&self, p: &Product) -> Result<()> {
        sqlx::query("INSERT INTO products (id, code, name, unit_price, on_hand_units, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
            .bind(p.id()).bind(p.code().as_str()).bind(p.name()).bind(p.unit_price()).bind(p.on_hand_units().value()).bind(p.created_at()).bind(p.updated_at())
            .execute(&self.pool).await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => KardexError::Validation(format!("Product code {} already exists", p.code())),
                other => other.into(),
            })?;
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM products WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(done.rows_affected() > 0)
    }

    async fn commit_movements(&self, movements: Vec<StockMovement>) -> Result<Committed> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();
        let mut touched: Vec<Uuid> = Vec::new();
        let mut latest: HashMap<Uuid, Product> = HashMap::new();
        let mut entries = Vec::with_capacity(movements.len());

        for movement in movements {
            // Clamped delta in one statement: concurrent sales cannot overwrite each other.
            let row = sqlx::query_as::<_, ProductRow>(
                "UPDATE products SET on_hand_units = GREATEST(0, on_hand_units + $2), updated_at = NOW() WHERE id = $1 RETURNING *",
            )
            .bind(movement.product_ref).bind(movement.delta())
            .fetch_optional(&mut *tx).await
            .map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_check_violation() => KardexError::Validation(format!("On-hand units of {} would exceed the limit", movement.product_ref)),
                other => other.into(),
            })?
            .ok_or(KardexError::ProductNotFound(movement.product_ref))?;

            let entry = movement.into_entry(now);
            sqlx::query(r#"INSERT INTO ledger_entries (id, product_ref, kind, quantity, total_amount, note, "timestamp") VALUES ($1, $2, $3, $4, $5, $6, $7)"#)
                .bind(entry.id()).bind(entry.product_ref()).bind(entry.kind().as_str()).bind(entry.quantity().value())
                .bind(entry.total_amount()).bind(entry.note()).bind(entry.timestamp())
                .execute(&mut *tx).await?;

            if !touched.contains(&entry.product_ref()) { touched.push(entry.product_ref()); }
            latest.insert(row.id, Product::try_from(row)?);
            entries.push(entry);
        }

        tx.commit().await?;
        let products = touched.iter().filter_map(|id| latest.remove(id)).collect();
        Ok(Committed { entries, products })
    }

    async fn entries_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
        sqlx::query_as::<_, EntryRow>(r#"SELECT * FROM ledger_entries WHERE "timestamp" BETWEEN $1 AND $2 ORDER BY "timestamp" DESC"#)
            .bind(from).bind(to)
            .fetch_all(&self.pool).await?
            .into_iter().map(LedgerEntry::try_from).collect()
    }
}
