//! OpenSASE Kardex - wholesale sales and stock ledger service

use anyhow::Result;
use opensase_kardex::{auth::StaticTokenAuth, config::Config, document::TextRenderer, http::{router, AppState}, store::{DataStore, MemoryStore, PgStore}};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = Config::from_env()?;

    let store: Arc<dyn DataStore> = match &config.database_url {
        Some(url) => {
            let pg = PgStore::connect(url, config.database_max_connections).await?;
            pg.migrate().await?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store; data is lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => { tracing::warn!(error = %e, "NATS unavailable, domain events disabled"); None }
        },
        None => None,
    };

    let state = AppState::new(
        store,
        Arc::new(StaticTokenAuth::new(config.admin_token.clone(), "admin")),
        Arc::new(TextRenderer::new(config.report_rows_per_page)),
        &config.currency,
        config.low_stock_threshold,
    ).with_nats(nats);

    let app = router(state).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    tracing::info!("🚀 OpenSASE Kardex listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
