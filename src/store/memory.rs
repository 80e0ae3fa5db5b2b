//! In-process store used when no database is configured, and by tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Committed, DataStore};
use crate::domain::aggregates::{LedgerEntry, Product, StockMovement};
use crate::{KardexError, Result};

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Default)]
struct State {
    products: HashMap<Uuid, Product>,
    entries: Vec<LedgerEntry>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let state = State { products: products.into_iter().map(|p| (p.id(), p)).collect(), entries: vec![] };
        Self { state: RwLock::new(state) }
    }

    /// Every entry ever written, oldest first.
    pub async fn all_entries(&self) -> Vec<LedgerEntry> {
        self.state.read().await.entries.clone()
    }

    /// Seeds historical entries directly, bypassing the projection.
    pub async fn import_entries(&self, entries: impl IntoIterator<Item = LedgerEntry>) {
        self.state.write().await.entries.extend(entries);
    }
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>> {
        let mut products: Vec<Product> = self.state.read().await.products.values().cloned().collect();
        products.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(products)
    }

    async fn get_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn insert_product(&self, product: &Product) -> Result<()> {
        let mut state = self.state.write().await;
        if state.products.values().any(|p| p.code() == product.code()) {
            return Err(KardexError::Validation(format!("Product code {} already exists", product.code())));
        }
        state.products.insert(product.id(), product.clone());
        Ok(())
    }

    async fn delete_product(&self, id: Uuid) -> Result<bool> {
        Ok(self.state.write().await.products.remove(&id).is_some())
    }

    async fn commit_movements(&self, movements: Vec<StockMovement>) -> Result<Committed> {
        let mut state = self.state.write().await;

        // Stage every delta on copies so a rejected movement leaves nothing applied.
        let mut staged: Vec<Product> = Vec::new();
        for movement in &movements {
            let idx = match staged.iter().position(|p| p.id() == movement.product_ref) {
                Some(idx) => idx,
                None => {
                    let product = state.products.get(&movement.product_ref).cloned().ok_or(KardexError::ProductNotFound(movement.product_ref))?;
                    staged.push(product);
                    staged.len() - 1
                }
            };
            staged[idx].apply_delta(movement.delta())?;
        }

        let now = Utc::now();
        let entries: Vec<LedgerEntry> = movements.into_iter().map(|m| m.into_entry(now)).collect();
        for product in &staged { state.products.insert(product.id(), product.clone()); }
        state.entries.extend(entries.iter().cloned());
        Ok(Committed { entries, products: staged })
    }

    async fn entries_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
        let state = self.state.read().await;
        let mut entries: Vec<LedgerEntry> = state.entries.iter().rev()
            .filter(|e| e.timestamp() >= from && e.timestamp() <= to)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
        Ok(entries)
    }
}
