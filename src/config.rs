//! Environment configuration. `main` loads `.env` first via `dotenvy`.

use anyhow::{anyhow, Context};
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::DEFAULT_LOW_STOCK_THRESHOLD;

#[derive(Clone, Debug)]
pub struct Config {
    /// `None` runs on the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    pub nats_url: Option<String>,
    pub admin_token: String,
    pub low_stock_threshold: Decimal,
    pub currency: String,
    pub report_rows_per_page: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let admin_token = get("KARDEX_ADMIN_TOKEN").ok_or_else(|| anyhow!("KARDEX_ADMIN_TOKEN must be set"))?;
        Ok(Self {
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(get("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
            port: parse_or(get("PORT"), "PORT", 8083)?,
            nats_url: get("NATS_URL"),
            admin_token,
            low_stock_threshold: parse_or(get("LOW_STOCK_THRESHOLD"), "LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD)?,
            currency: get("KARDEX_CURRENCY").map(|c| c.to_uppercase()).unwrap_or_else(|| "USD".to_string()),
            report_rows_per_page: parse_or(get("REPORT_ROWS_PER_PAGE"), "REPORT_ROWS_PER_PAGE", 40)?,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v.parse().with_context(|| format!("invalid {}: {:?}", key, v)),
        None => Ok(default),
    }
}
