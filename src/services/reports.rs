//! Report Aggregator
//!
//! Read-only over the ledger. Every statistic is recomputed from the fetched
//! entries on each call; nothing is persisted. The last good load of each
//! range is remembered so a failed refresh can still show something.

use chrono::{DateTime, Datelike, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::domain::aggregates::{EntryKind, LedgerEntry, Product};
use crate::store::DataStore;
use crate::{KardexError, Result, DELETED_PRODUCT_LABEL};

/// Months covered by the rolling trend, current month included.
pub const TREND_MONTHS: u32 = 6;

/// Ranges whose last good load is kept for the stale fallback.
pub const LAST_GOOD_RANGES: usize = 8;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EntryFilter {
    pub kind: Option<EntryKind>,
    pub search: Option<String>,
}

impl EntryFilter {
    fn matches(&self, view: &EntryView) -> bool {
        if self.kind.is_some_and(|k| k != view.entry.kind()) { return false; }
        let Some(needle) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) else { return true };
        let needle = needle.to_lowercase();
        view.entry.note().to_lowercase().contains(&needle)
            || view.product_name.to_lowercase().contains(&needle)
            || view.product_code.as_deref().is_some_and(|c| c.to_lowercase().contains(&needle))
    }
}

/// A ledger entry joined with its product, if the product still exists.
#[derive(Clone, Debug, Serialize)]
pub struct EntryView {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub product_name: String,
    pub product_code: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct PeriodStats {
    pub sales_units_today: Decimal,
    pub sales_revenue_today: Decimal,
    pub sales_units_period: Decimal,
    pub sales_revenue_period: Decimal,
    pub stock_in_units_period: Decimal,
    pub stock_in_cost_period: Decimal,
    /// Period sales revenue minus period purchase cost. Not cost of goods sold.
    pub gross_margin_period: Decimal,
}

#[derive(Clone, Debug, Serialize)]
pub struct PeriodReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub stats: PeriodStats,
    pub entries: Vec<EntryView>,
    /// Set when a refresh failed and this is the last good load.
    pub stale: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonthBucket {
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub sales_total: Decimal,
    pub stock_in_total: Decimal,
}

/// Single pass over `entries`. "Today" is the local calendar date `today`.
pub fn summarize(entries: &[LedgerEntry], today: NaiveDate) -> PeriodStats {
    let mut stats = PeriodStats::default();
    for entry in entries {
        let qty = entry.quantity().value();
        let amount = entry.total_amount().unwrap_or(Decimal::ZERO);
        match entry.kind() {
            EntryKind::Sale => {
                stats.sales_units_period = stats.sales_units_period.saturating_add(qty);
                stats.sales_revenue_period = stats.sales_revenue_period.saturating_add(amount);
                if entry.timestamp().with_timezone(&Local).date_naive() == today {
                    stats.sales_units_today = stats.sales_units_today.saturating_add(qty);
                    stats.sales_revenue_today = stats.sales_revenue_today.saturating_add(amount);
                }
            }
            EntryKind::StockIn => {
                stats.stock_in_units_period = stats.stock_in_units_period.saturating_add(qty);
                stats.stock_in_cost_period = stats.stock_in_cost_period.saturating_add(amount);
            }
            EntryKind::Adjustment => {}
        }
    }
    stats.gross_margin_period = stats.sales_revenue_period.saturating_sub(stats.stock_in_cost_period);
    stats
}

/// `start` at 00:00:00.000 and `end` at 23:59:59.999 local time, as UTC instants.
pub fn local_day_bounds(start: NaiveDate, end: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    if start > end {
        return Err(KardexError::Validation(format!("Start date {} is after end date {}", start, end)));
    }
    let end_of_day = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or_default();
    Ok((local_to_utc(start.and_time(NaiveTime::default())), local_to_utc(end.and_time(end_of_day))))
}

fn local_to_utc(naive: NaiveDateTime) -> DateTime<Utc> {
    // A wall-clock time skipped by a DST change has no local mapping; read it as UTC.
    Local.from_local_datetime(&naive).earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Empty buckets for the month of `now` and the preceding months, oldest first.
pub fn month_buckets(now: DateTime<Local>) -> Vec<MonthBucket> {
    let first = now.date_naive().with_day(1).unwrap_or(now.date_naive());
    (0..TREND_MONTHS).rev()
        .filter_map(|back| first.checked_sub_months(Months::new(back)))
        .map(|d| MonthBucket { label: d.format("%b %Y").to_string(), year: d.year(), month: d.month(), sales_total: Decimal::ZERO, stock_in_total: Decimal::ZERO })
        .collect()
}

#[derive(Clone)]
struct Snapshot {
    stats: PeriodStats,
    entries: Vec<EntryView>,
}

pub struct ReportAggregator {
    store: Arc<dyn DataStore>,
    /// Most recently loaded range last.
    last_good: Mutex<VecDeque<((NaiveDate, NaiveDate), Snapshot)>>,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store, last_good: Mutex::new(VecDeque::with_capacity(LAST_GOOD_RANGES)) }
    }

    pub async fn load_period(&self, start: NaiveDate, end: NaiveDate, filter: &EntryFilter) -> Result<PeriodReport> {
        self.load_period_at(start, end, filter, Local::now().date_naive()).await
    }

    /// Like `load_period`, but on a store failure falls back to the last good
    /// load of the same range, flagged as stale.
    pub async fn load_period_or_stale(&self, start: NaiveDate, end: NaiveDate, filter: &EntryFilter) -> Result<PeriodReport> {
        match self.load_period(start, end, filter).await {
            Err(KardexError::StorageError(msg)) => {
                let cached = self.cached(start, end).ok_or_else(|| KardexError::StorageError(msg.clone()))?;
                tracing::warn!(%start, %end, error = %msg, "report refresh failed, serving last good data");
                Ok(Self::assemble(start, end, cached, filter, true))
            }
            other => other,
        }
    }

    #[tracing::instrument(skip(self, filter))]
    pub async fn load_period_at(&self, start: NaiveDate, end: NaiveDate, filter: &EntryFilter, today: NaiveDate) -> Result<PeriodReport> {
        let (from, to) = local_day_bounds(start, end)?;
        let entries = self.store.entries_between(from, to).await?;
        let products: HashMap<_, Product> = self.store.list_products().await?.into_iter().map(|p| (p.id(), p)).collect();

        let stats = summarize(&entries, today);
        let views = entries.into_iter().map(|entry| {
            let product = products.get(&entry.product_ref());
            EntryView {
                product_name: product.map_or_else(|| DELETED_PRODUCT_LABEL.to_string(), |p| p.name().to_string()),
                product_code: product.map(|p| p.code().to_string()),
                entry,
            }
        }).collect();

        let snapshot = Snapshot { stats, entries: views };
        self.remember((start, end), snapshot.clone());
        tracing::debug!(entries = snapshot.entries.len(), "period loaded");
        Ok(Self::assemble(start, end, snapshot, filter, false))
    }

    pub async fn monthly_trend(&self) -> Result<Vec<MonthBucket>> {
        self.monthly_trend_at(Local::now()).await
    }

    pub async fn monthly_trend_at(&self, now: DateTime<Local>) -> Result<Vec<MonthBucket>> {
        let since = now.checked_sub_months(Months::new(TREND_MONTHS)).unwrap_or(now);
        let entries = self.store.entries_between(since.with_timezone(&Utc), now.with_timezone(&Utc)).await?;
        let mut buckets = month_buckets(now);
        for entry in &entries {
            let local = entry.timestamp().with_timezone(&Local);
            let Some(bucket) = buckets.iter_mut().find(|b| b.year == local.year() && b.month == local.month()) else { continue };
            let amount = entry.total_amount().unwrap_or(Decimal::ZERO);
            match entry.kind() {
                EntryKind::Sale => bucket.sales_total = bucket.sales_total.saturating_add(amount),
                EntryKind::StockIn => bucket.stock_in_total = bucket.stock_in_total.saturating_add(amount),
                EntryKind::Adjustment => {}
            }
        }
        Ok(buckets)
    }

    fn remember(&self, range: (NaiveDate, NaiveDate), snapshot: Snapshot) {
        let mut last_good = self.last_good.lock().unwrap_or_else(|e| e.into_inner());
        last_good.retain(|(r, _)| *r != range);
        if last_good.len() >= LAST_GOOD_RANGES { last_good.pop_front(); }
        last_good.push_back((range, snapshot));
    }

    fn cached(&self, start: NaiveDate, end: NaiveDate) -> Option<Snapshot> {
        let last_good = self.last_good.lock().unwrap_or_else(|e| e.into_inner());
        last_good.iter().find(|(r, _)| *r == (start, end)).map(|(_, s)| s.clone())
    }

    fn assemble(start: NaiveDate, end: NaiveDate, snapshot: Snapshot, filter: &EntryFilter, stale: bool) -> PeriodReport {
        let entries = snapshot.entries.into_iter().filter(|v| filter.matches(v)).collect();
        PeriodReport { start, end, stats: snapshot.stats, entries, stale }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::StockMovement;
    use crate::domain::value_objects::{ProductCode, Quantity};
    use crate::store::{Committed, MemoryStore};
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    fn qty(n: i64) -> Quantity { Quantity::new(Decimal::new(n, 0)).unwrap() }

    fn product(code: &str, name: &str) -> Product {
        Product::create(ProductCode::new(code).unwrap(), name, Decimal::TEN, qty(50)).unwrap()
    }

    fn today() -> NaiveDate { Local::now().date_naive() }

    #[test]
    fn test_period_aggregation() {
        let id = Uuid::new_v4();
        let now = Utc::now();
        let entries = vec![
            StockMovement::sale(id, qty(2), Decimal::new(20, 0), "").into_entry(now),
            StockMovement::stock_in(id, qty(5), Decimal::new(15, 0), "").into_entry(now),
            StockMovement::sale(id, qty(1), Decimal::new(8, 0), "").into_entry(now),
        ];
        let stats = summarize(&entries, now.with_timezone(&Local).date_naive());
        assert_eq!(stats.sales_units_period, Decimal::new(3, 0));
        assert_eq!(stats.sales_revenue_period, Decimal::new(28, 0));
        assert_eq!(stats.stock_in_units_period, Decimal::new(5, 0));
        assert_eq!(stats.stock_in_cost_period, Decimal::new(15, 0));
        assert_eq!(stats.gross_margin_period, Decimal::new(13, 0));
        assert_eq!(stats.sales_units_today, Decimal::new(3, 0));
    }

    #[test]
    fn test_sales_outside_today_only_count_for_period() {
        let id = Uuid::new_v4();
        let old = Utc::now() - Duration::days(3);
        let entries = vec![StockMovement::sale(id, qty(4), Decimal::new(40, 0), "").into_entry(old)];
        let stats = summarize(&entries, Local::now().date_naive());
        assert_eq!(stats.sales_units_period, Decimal::new(4, 0));
        assert_eq!(stats.sales_units_today, Decimal::ZERO);
        assert_eq!(stats.sales_revenue_today, Decimal::ZERO);
    }

    #[test]
    fn test_day_bounds() {
        let d = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let (from, to) = local_day_bounds(d, d).unwrap();
        assert_eq!(to - from, Duration::days(1) - Duration::milliseconds(1));
        assert!(local_day_bounds(d, d.pred_opt().unwrap()).is_err());
    }

    #[test]
    fn test_month_buckets_are_seeded() {
        let now = Local.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap();
        let buckets = month_buckets(now);
        assert_eq!(buckets.len(), 6);
        assert_eq!((buckets[0].year, buckets[0].month), (2023, 9));
        assert_eq!((buckets[5].year, buckets[5].month), (2024, 2));
        assert_eq!(buckets[5].label, "Feb 2024");
        assert!(buckets.iter().all(|b| b.sales_total.is_zero() && b.stock_in_total.is_zero()));
    }

    #[tokio::test]
    async fn test_report_is_idempotent_and_filters() {
        let botin = product("BOT-01", "Botin cuero");
        let sandalia = product("SAN-02", "Sandalia playa");
        let store = Arc::new(MemoryStore::with_products([botin.clone(), sandalia.clone()]));
        store.commit_movements(vec![
            StockMovement::sale(botin.id(), qty(2), Decimal::new(20, 0), "Sale - Customer: Ana"),
            StockMovement::stock_in(sandalia.id(), qty(5), Decimal::new(15, 0), "Supplier: Norte"),
            StockMovement::sale(sandalia.id(), qty(1), Decimal::new(8, 0), "Sale - Customer: Luis"),
        ]).await.unwrap();
        let reports = ReportAggregator::new(store.clone());

        let all = reports.load_period(today(), today(), &EntryFilter::default()).await.unwrap();
        let again = reports.load_period(today(), today(), &EntryFilter::default()).await.unwrap();
        assert_eq!(all.stats, again.stats);
        assert_eq!(all.entries.len(), 3);
        assert_eq!(all.stats.gross_margin_period, Decimal::new(13, 0));

        let sales = reports.load_period(today(), today(), &EntryFilter { kind: Some(EntryKind::Sale), search: None }).await.unwrap();
        assert_eq!(sales.entries.len(), 2);
        assert_eq!(sales.stats, all.stats);

        let by_code = reports.load_period(today(), today(), &EntryFilter { kind: None, search: Some("bot-0".into()) }).await.unwrap();
        assert_eq!(by_code.entries.len(), 1);
        let by_note = reports.load_period(today(), today(), &EntryFilter { kind: None, search: Some("LUIS".into()) }).await.unwrap();
        assert_eq!(by_note.entries[0].product_name, "Sandalia playa");
    }

    #[tokio::test]
    async fn test_deleted_product_gets_placeholder() {
        let p = product("MOC-03", "Mocasin");
        let store = Arc::new(MemoryStore::with_products([p.clone()]));
        store.commit_movements(vec![StockMovement::sale(p.id(), qty(1), Decimal::TEN, "")]).await.unwrap();
        store.delete_product(p.id()).await.unwrap();

        let report = ReportAggregator::new(store).load_period(today(), today(), &EntryFilter::default()).await.unwrap();
        assert_eq!(report.entries[0].product_name, DELETED_PRODUCT_LABEL);
        assert_eq!(report.entries[0].product_code, None);
        assert_eq!(report.stats.sales_units_period, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_monthly_trend_sums_by_month() {
        let p = product("A", "A");
        let store = Arc::new(MemoryStore::with_products([p.clone()]));
        let now = Local::now();
        let at = now.with_timezone(&Utc);
        store.import_entries([
            StockMovement::sale(p.id(), qty(1), Decimal::new(30, 0), "").into_entry(at),
            StockMovement::stock_in(p.id(), qty(1), Decimal::new(12, 0), "").into_entry(at),
            StockMovement::sale(p.id(), qty(1), Decimal::new(99, 0), "").into_entry(at - Duration::days(400)),
        ]).await;
        let buckets = ReportAggregator::new(store).monthly_trend_at(now).await.unwrap();
        assert_eq!(buckets.len(), 6);
        let current = buckets.last().unwrap();
        assert_eq!(current.sales_total, Decimal::new(30, 0));
        assert_eq!(current.stock_in_total, Decimal::new(12, 0));
        let total: Decimal = buckets.iter().map(|b| b.sales_total).sum();
        assert_eq!(total, Decimal::new(30, 0));
    }

    /// Reads fail once `broken` is set.
    struct FlakyStore { inner: MemoryStore, broken: AtomicBool }

    #[async_trait]
    impl DataStore for FlakyStore {
        async fn list_products(&self) -> Result<Vec<Product>> { self.inner.list_products().await }
        async fn get_product(&self, id: Uuid) -> Result<Option<Product>> { self.inner.get_product(id).await }
        async fn insert_product(&self, p: &Product) -> Result<()> { self.inner.insert_product(p).await }
        async fn delete_product(&self, id: Uuid) -> Result<bool> { self.inner.delete_product(id).await }
        async fn commit_movements(&self, m: Vec<StockMovement>) -> Result<Committed> { self.inner.commit_movements(m).await }
        async fn entries_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
            if self.broken.load(Ordering::SeqCst) { return Err(KardexError::StorageError("connection reset".into())); }
            self.inner.entries_between(from, to).await
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_serves_last_good() {
        let p = product("A", "A");
        let store = Arc::new(FlakyStore { inner: MemoryStore::with_products([p.clone()]), broken: AtomicBool::new(false) });
        store.commit_movements(vec![StockMovement::sale(p.id(), qty(2), Decimal::TEN, "")]).await.unwrap();
        let reports = ReportAggregator::new(store.clone());

        let yesterday = today().pred_opt().unwrap();
        store.broken.store(true, Ordering::SeqCst);
        assert!(reports.load_period_or_stale(yesterday, today(), &EntryFilter::default()).await.is_err());

        store.broken.store(false, Ordering::SeqCst);
        let fresh = reports.load_period_or_stale(today(), today(), &EntryFilter::default()).await.unwrap();
        assert!(!fresh.stale);

        store.broken.store(true, Ordering::SeqCst);
        let stale = reports.load_period_or_stale(today(), today(), &EntryFilter::default()).await.unwrap();
        assert!(stale.stale);
        assert_eq!(stale.stats, fresh.stats);
        assert!(reports.load_period(today(), today(), &EntryFilter::default()).await.is_err());
    }

    #[tokio::test]
    async fn test_last_good_cache_is_bounded() {
        let p = product("A", "A");
        let store = Arc::new(FlakyStore { inner: MemoryStore::with_products([p.clone()]), broken: AtomicBool::new(false) });
        let reports = ReportAggregator::new(store.clone());

        let oldest = today() - Duration::days(LAST_GOOD_RANGES as i64);
        for back in 0..=LAST_GOOD_RANGES as i64 {
            let start = today() - Duration::days(LAST_GOOD_RANGES as i64 - back);
            reports.load_period(start, today(), &EntryFilter::default()).await.unwrap();
        }
        assert_eq!(reports.last_good.lock().unwrap().len(), LAST_GOOD_RANGES);

        store.broken.store(true, Ordering::SeqCst);
        assert!(reports.load_period_or_stale(oldest, today(), &EntryFilter::default()).await.is_err());
        assert!(reports.load_period_or_stale(today(), today(), &EntryFilter::default()).await.unwrap().stale);
    }
}
