//! HTTP API

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{require_session, AuthProvider};
use crate::document::{Document, DocumentRenderer};
use crate::domain::aggregates::{AdjustmentDirection, EntryKind, Product, StockStatus};
use crate::domain::events::{self, DomainEvent};
use crate::domain::value_objects::{ProductCode, Quantity};
use crate::services::reports::{EntryFilter, MonthBucket, PeriodReport, ReportAggregator};
use crate::services::sale_recorder::{SaleLineRequest, SaleOutcome, SaleRecorder};
use crate::services::stock::{StockAlert, StockOutcome, StockService};
use crate::store::DataStore;
use crate::KardexError;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DataStore>,
    pub sales: Arc<SaleRecorder>,
    pub stock: Arc<StockService>,
    pub reports: Arc<ReportAggregator>,
    pub auth: Arc<dyn AuthProvider>,
    pub renderer: Arc<dyn DocumentRenderer>,
    pub nats: Option<async_nats::Client>,
    pub low_stock_threshold: Decimal,
}

impl AppState {
    pub fn new(store: Arc<dyn DataStore>, auth: Arc<dyn AuthProvider>, renderer: Arc<dyn DocumentRenderer>, currency: &str, low_stock_threshold: Decimal) -> Self {
        Self {
            sales: Arc::new(SaleRecorder::new(store.clone(), currency)),
            stock: Arc::new(StockService::new(store.clone())),
            reports: Arc::new(ReportAggregator::new(store.clone())),
            store, auth, renderer, nats: None, low_stock_threshold,
        }
    }

    pub fn with_nats(mut self, nats: Option<async_nats::Client>) -> Self { self.nats = nats; self }

    fn publish(&self, events: Vec<DomainEvent>) {
        if let Some(client) = self.nats.clone() {
            tokio::spawn(async move { events::publish(Some(&client), events).await });
        }
    }
}

impl IntoResponse for KardexError {
    fn into_response(self) -> Response {
        let status = match &self {
            KardexError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            KardexError::ProductNotFound(_) => StatusCode::NOT_FOUND,
            KardexError::Unauthorized => StatusCode::UNAUTHORIZED,
            KardexError::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, KardexError>;

fn validate(r: &impl Validate) -> ApiResult<()> {
    r.validate().map_err(|e| KardexError::Validation(e.to_string()))
}

pub fn router(state: AppState) -> Router {
    let gated = Router::new()
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/alerts", get(stock_alerts))
        .route("/api/v1/products/:id", get(get_product).delete(delete_product))
        .route("/api/v1/sales", post(record_sale))
        .route("/api/v1/stock/entries", post(record_stock_in))
        .route("/api/v1/stock/adjustments", post(record_adjustment))
        .route("/api/v1/reports/period", get(period_report))
        .route("/api/v1/reports/period/export", get(export_period_report))
        .route("/api/v1/reports/monthly", get(monthly_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-kardex"})) }))
        .merge(gated)
        .with_state(state)
}

// -----------------------------------------------------------------------------
// Products
// -----------------------------------------------------------------------------

#[derive(Debug, Serialize)] pub struct ProductView { #[serde(flatten)] pub product: Product, pub stock_status: StockStatus }

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 50))] pub code: String,
    #[validate(length(min = 1, max = 200))] pub name: String,
    pub unit_price: Decimal,
    pub on_hand_units: Option<Decimal>,
}

async fn list_products(State(s): State<AppState>) -> ApiResult<Json<Vec<ProductView>>> {
    let products = s.store.list_products().await?;
    Ok(Json(products.into_iter().map(|p| ProductView { stock_status: p.stock_status(s.low_stock_threshold), product: p }).collect()))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<ProductView>> {
    let product = s.store.get_product(id).await?.ok_or(KardexError::ProductNotFound(id))?;
    Ok(Json(ProductView { stock_status: product.stock_status(s.low_stock_threshold), product }))
}

async fn create_product(State(s): State<AppState>, Json(r): Json<CreateProductRequest>) -> ApiResult<(StatusCode, Json<Product>)> {
    validate(&r)?;
    let on_hand = Quantity::new(r.on_hand_units.unwrap_or(Decimal::ZERO))?;
    let product = Product::create(ProductCode::new(r.code)?, r.name, r.unit_price, on_hand)?;
    s.store.insert_product(&product).await?;
    tracing::info!(product = %product.code(), "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

async fn delete_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<StatusCode> {
    if !s.store.delete_product(id).await? { return Err(KardexError::ProductNotFound(id)); }
    Ok(StatusCode::NO_CONTENT)
}

async fn stock_alerts(State(s): State<AppState>) -> ApiResult<Json<Vec<StockAlert>>> {
    Ok(Json(s.stock.low_stock_alerts(s.low_stock_threshold).await?))
}

// -----------------------------------------------------------------------------
// Sales and stock movements
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct RecordSaleRequest {
    #[validate(length(max = 200))] pub customer_name: String,
    #[validate(length(max = 200))] pub items: Vec<SaleLineRequest>,
}

/// Answers with the printable receipt when the client accepts plain text.
async fn record_sale(State(s): State<AppState>, headers: HeaderMap, Json(r): Json<RecordSaleRequest>) -> ApiResult<Response> {
    validate(&r)?;
    let outcome: SaleOutcome = s.sales.record_sale(&r.customer_name, &r.items).await?;
    s.publish(outcome.events());
    if wants_text(&headers) {
        let body = s.renderer.render(&Document::from(&outcome.receipt));
        return Ok((StatusCode::CREATED, [(header::CONTENT_TYPE, s.renderer.content_type())], body).into_response());
    }
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

fn wants_text(headers: &HeaderMap) -> bool {
    headers.get(header::ACCEPT).and_then(|v| v.to_str().ok()).is_some_and(|accept| accept.contains("text/plain"))
}

#[derive(Debug, Deserialize, Validate)]
pub struct StockInRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub total_cost: Decimal,
    #[validate(length(max = 500))] pub note: Option<String>,
}

async fn record_stock_in(State(s): State<AppState>, Json(r): Json<StockInRequest>) -> ApiResult<(StatusCode, Json<StockOutcome>)> {
    validate(&r)?;
    let outcome = s.stock.record_stock_in(r.product_id, r.quantity, r.total_cost, r.note.as_deref().unwrap_or_default()).await?;
    s.publish(vec![outcome.event()]);
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdjustmentRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub direction: AdjustmentDirection,
    #[validate(length(min = 1, max = 500))] pub reason: String,
}

async fn record_adjustment(State(s): State<AppState>, Json(r): Json<AdjustmentRequest>) -> ApiResult<(StatusCode, Json<StockOutcome>)> {
    validate(&r)?;
    let outcome = s.stock.record_adjustment(r.product_id, r.quantity, r.direction, &r.reason).await?;
    s.publish(vec![outcome.event()]);
    Ok((StatusCode::CREATED, Json(outcome)))
}

// -----------------------------------------------------------------------------
// Reports
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct PeriodQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: Option<EntryKind>,
    #[validate(length(max = 100))] pub search: Option<String>,
}

impl PeriodQuery {
    fn filter(&self) -> EntryFilter { EntryFilter { kind: self.kind, search: self.search.clone() } }
}

async fn period_report(State(s): State<AppState>, Query(q): Query<PeriodQuery>) -> ApiResult<Json<PeriodReport>> {
    validate(&q)?;
    Ok(Json(s.reports.load_period_or_stale(q.start, q.end, &q.filter()).await?))
}

async fn export_period_report(State(s): State<AppState>, Query(q): Query<PeriodQuery>) -> ApiResult<Response> {
    validate(&q)?;
    let report = s.reports.load_period_or_stale(q.start, q.end, &q.filter()).await?;
    let body = s.renderer.render(&Document::from(&report));
    Ok(([(header::CONTENT_TYPE, s.renderer.content_type())], body).into_response())
}

async fn monthly_report(State(s): State<AppState>) -> ApiResult<Json<Vec<MonthBucket>>> {
    Ok(Json(s.reports.monthly_trend().await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenAuth;
    use crate::document::TextRenderer;
    use crate::store::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Local;
    use tower::ServiceExt;

    const TOKEN: &str = "test-token";

    fn app(products: Vec<Product>) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_products(products));
        let state = AppState::new(store.clone(), Arc::new(StaticTokenAuth::new(TOKEN, "admin")), Arc::new(TextRenderer::default()), "USD", Decimal::new(3, 0));
        (router(state), store)
    }

    fn product(code: &str, on_hand: i64) -> Product {
        Product::create(ProductCode::new(code).unwrap(), code, Decimal::new(80, 0), Quantity::new(Decimal::new(on_hand, 0)).unwrap()).unwrap()
    }

    fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri).header(header::AUTHORIZATION, format!("Bearer {}", TOKEN));
        match body {
            Some(json) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(json.to_string())).unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn json(resp: Response) -> serde_json::Value {
        serde_json::from_slice(&to_bytes(resp.into_body(), usize::MAX).await.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_open() {
        let (app, _) = app(vec![]);
        let resp = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_gated_routes_need_session() {
        let (app, _) = app(vec![]);
        let resp = app.clone().oneshot(Request::builder().uri("/api/v1/products").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        let resp = app.oneshot(Request::builder().uri("/api/v1/products").header(header::AUTHORIZATION, "Bearer wrong").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sale_then_report() {
        let p = product("BOT-01", 4);
        let (app, store) = app(vec![p.clone()]);

        let sale = serde_json::json!({ "customer_name": "Ana", "items": [{ "product_id": p.id(), "unit_price": "100", "quantity": "1.5" }] });
        let resp = app.clone().oneshot(request("POST", "/api/v1/sales", Some(sale))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = json(resp).await;
        let total: Decimal = serde_json::from_value(body["receipt"]["grand_total"]["amount"].clone()).unwrap();
        assert_eq!(total, Decimal::new(150, 0));
        assert_eq!(store.get_product(p.id()).await.unwrap().unwrap().on_hand_units().value(), Decimal::new(25, 1));

        let today = Local::now().date_naive();
        let resp = app.clone().oneshot(request("GET", &format!("/api/v1/reports/period?start={}&end={}&kind=SALE", today, today), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let report = json(resp).await;
        assert_eq!(report["entries"].as_array().unwrap().len(), 1);
        assert_eq!(report["stale"], false);

        let resp = app.oneshot(request("GET", "/api/v1/products/alerts", None)).await.unwrap();
        let alerts = json(resp).await;
        assert_eq!(alerts[0]["status"], "LOW_STOCK");
    }

    #[tokio::test]
    async fn test_sale_prints_receipt_for_text_clients() {
        let p = product("BOT-01", 4);
        let (app, store) = app(vec![p.clone()]);
        let sale = serde_json::json!({ "customer_name": "Ana", "items": [{ "product_id": p.id(), "unit_price": "100", "quantity": "2" }] });
        let req = Request::builder().method("POST").uri("/api/v1/sales")
            .header(header::AUTHORIZATION, format!("Bearer {}", TOKEN))
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "text/plain")
            .body(Body::from(sale.to_string())).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(resp.headers()[header::CONTENT_TYPE].to_str().unwrap().starts_with("text/plain"));
        let text = String::from_utf8(to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
        assert!(text.starts_with("Receipt V-"));
        assert!(text.contains("Customer: Ana"));
        assert!(text.contains("TOTAL USD 200.00"));
        assert_eq!(store.all_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_oversized_sale_is_unprocessable() {
        let p = product("BOT-01", 4);
        let (app, store) = app(vec![p.clone()]);
        let sale = serde_json::json!({ "customer_name": "Ana", "items": [{ "product_id": p.id(), "unit_price": "1000000000000000", "quantity": "1000000000000000" }] });
        let resp = app.oneshot(request("POST", "/api/v1/sales", Some(sale))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(store.all_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_sale_is_unprocessable() {
        let p = product("BOT-01", 4);
        let (app, store) = app(vec![p.clone()]);
        let sale = serde_json::json!({ "customer_name": "", "items": [{ "product_id": p.id(), "unit_price": "100", "quantity": "1" }] });
        let resp = app.oneshot(request("POST", "/api/v1/sales", Some(sale))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(store.all_entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_adjustment_and_export() {
        let p = product("SAN-02", 2);
        let (app, _) = app(vec![p.clone()]);
        let adj = serde_json::json!({ "product_id": p.id(), "quantity": "2", "direction": "DECREASE", "reason": "damaged in transit" });
        let resp = app.clone().oneshot(request("POST", "/api/v1/stock/adjustments", Some(adj))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let today = Local::now().date_naive();
        let resp = app.oneshot(request("GET", &format!("/api/v1/reports/period/export?start={}&end={}", today, today), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let text = String::from_utf8(to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
        assert!(text.contains("ADJUSTMENT"));
        assert!(text.contains("damaged in transit"));
    }

    #[tokio::test]
    async fn test_unknown_product_is_not_found() {
        let (app, _) = app(vec![]);
        let resp = app.oneshot(request("GET", &format!("/api/v1/products/{}", Uuid::new_v4()), None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
