//! Application services over the data store.
pub mod reports;
pub mod sale_recorder;
pub mod stock;

pub use reports::{EntryFilter, PeriodReport, PeriodStats, ReportAggregator};
pub use sale_recorder::{SaleLineRequest, SaleOutcome, SaleRecorder};
pub use stock::{low_stock_alerts, StockAlert, StockOutcome, StockService};
