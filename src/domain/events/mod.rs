//! Domain events
use crate::domain::aggregates::EntryKind;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Sale(SaleEvent),
    Stock(StockEvent),
}

#[derive(Clone, Debug, Serialize)]
pub enum SaleEvent {
    Recorded { reference: String, customer_name: String, lines: usize, total: Decimal },
}

#[derive(Clone, Debug, Serialize)]
pub enum StockEvent {
    Moved { product_id: Uuid, kind: EntryKind, quantity: Decimal, on_hand: Decimal },
}

impl DomainEvent {
    /// NATS subject the event is published on.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Sale(SaleEvent::Recorded { .. }) => "kardex.sale.recorded",
            Self::Stock(StockEvent::Moved { .. }) => "kardex.stock.moved",
        }
    }
}

/// Publishes events to NATS when a client is configured. Failures are logged
/// and swallowed; the movement they describe is already committed.
pub async fn publish(nats: Option<&async_nats::Client>, events: Vec<DomainEvent>) {
    let Some(client) = nats else { return };
    for event in events {
        let payload = match serde_json::to_vec(&event) {
            Ok(p) => p,
            Err(e) => { tracing::warn!(error = %e, "could not encode domain event"); continue; }
        };
        if let Err(e) = client.publish(event.subject().to_string(), payload.into()).await {
            tracing::warn!(subject = event.subject(), error = %e, "failed to publish domain event");
        }
    }
}
