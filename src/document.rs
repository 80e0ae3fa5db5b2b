//! Printable documents (receipts, period exports).
//!
//! Producers flatten what they want printed into a `Document`; a
//! `DocumentRenderer` turns it into bytes. The bundled renderer paginates to
//! fixed-width plain text.

use crate::domain::aggregates::Receipt;
use crate::services::reports::PeriodReport;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Document {
    pub title: String,
    pub metadata: Vec<(String, String)>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub footer: Vec<String>,
}

pub trait DocumentRenderer: Send + Sync {
    fn content_type(&self) -> &'static str;
    fn render(&self, document: &Document) -> Vec<u8>;
}

impl From<&Receipt> for Document {
    fn from(r: &Receipt) -> Self {
        Document {
            title: format!("Receipt {}", r.reference),
            metadata: vec![
                ("Customer".into(), r.customer_name.clone()),
                ("Date".into(), r.issued_at.format("%Y-%m-%d %H:%M").to_string()),
            ],
            columns: ["Code", "Product", "Qty", "Unit price", "Subtotal"].map(String::from).to_vec(),
            rows: r.lines.iter().map(|l| vec![
                l.product_code.clone(), l.product_name.clone(), l.quantity.to_string(),
                format!("{:.2}", l.unit_price.amount()), format!("{:.2}", l.subtotal.amount()),
            ]).collect(),
            footer: vec![format!("TOTAL {}", r.grand_total)],
        }
    }
}

impl From<&PeriodReport> for Document {
    fn from(r: &PeriodReport) -> Self {
        let s = &r.stats;
        Document {
            title: "Kardex report".into(),
            metadata: vec![("From".into(), r.start.to_string()), ("To".into(), r.end.to_string())],
            columns: ["Date", "Kind", "Code", "Product", "Qty", "Amount", "Note"].map(String::from).to_vec(),
            rows: r.entries.iter().map(|v| vec![
                v.entry.timestamp().format("%Y-%m-%d %H:%M").to_string(),
                v.entry.kind().to_string(),
                v.product_code.clone().unwrap_or_default(),
                v.product_name.clone(),
                v.entry.quantity().to_string(),
                v.entry.total_amount().map(|a| format!("{:.2}", a)).unwrap_or_else(|| "-".into()),
                v.entry.note().to_string(),
            ]).collect(),
            footer: vec![
                format!("Sales: {} units, {:.2}", s.sales_units_period, s.sales_revenue_period),
                format!("Purchases: {} units, {:.2}", s.stock_in_units_period, s.stock_in_cost_period),
                format!("Gross margin: {:.2}", s.gross_margin_period),
            ],
        }
    }
}

pub struct TextRenderer {
    rows_per_page: usize,
}

impl TextRenderer {
    pub fn new(rows_per_page: usize) -> Self { Self { rows_per_page: rows_per_page.max(1) } }

    fn widths(document: &Document) -> Vec<usize> {
        let mut widths: Vec<usize> = document.columns.iter().map(|c| c.chars().count()).collect();
        for row in &document.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(w) = widths.get_mut(i) { *w = (*w).max(cell.chars().count()); }
            }
        }
        widths
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        cells.iter().zip(widths).map(|(c, w)| format!("{:<width$}", c, width = *w)).collect::<Vec<_>>().join("  ").trim_end().to_string()
    }
}

impl Default for TextRenderer {
    fn default() -> Self { Self::new(40) }
}

impl DocumentRenderer for TextRenderer {
    fn content_type(&self) -> &'static str { "text/plain; charset=utf-8" }

    fn render(&self, document: &Document) -> Vec<u8> {
        let widths = Self::widths(document);
        let header = Self::line(&document.columns, &widths);
        let rule = "-".repeat(header.chars().count());
        let pages: Vec<&[Vec<String>]> = if document.rows.is_empty() { vec![&document.rows[..0]] } else { document.rows.chunks(self.rows_per_page).collect() };

        let mut out = String::new();
        for (i, rows) in pages.iter().enumerate() {
            if i > 0 { out.push('\u{c}'); }
            out.push_str(&document.title);
            out.push('\n');
            for (key, value) in &document.metadata { out.push_str(&format!("{}: {}\n", key, value)); }
            out.push('\n');
            out.push_str(&header);
            out.push('\n');
            out.push_str(&rule);
            out.push('\n');
            for row in rows.iter() {
                out.push_str(&Self::line(row, &widths));
                out.push('\n');
            }
            if i + 1 == pages.len() {
                out.push_str(&rule);
                out.push('\n');
                for line in &document.footer { out.push_str(line); out.push('\n'); }
            }
            out.push_str(&format!("\nPage {}/{}\n", i + 1, pages.len()));
        }
        out.into_bytes()
    }
}
