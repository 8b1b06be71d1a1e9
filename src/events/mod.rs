use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::Role;
use crate::entities::order::OrderStatus;
use crate::services::registry::RegistryKind;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is closed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "event dropped");
        }
    }
}

/// Domain events published after the owning transaction commits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderPlaced {
        order_id: Uuid,
        guardian_id: Uuid,
        school_id: Uuid,
        total: Decimal,
        commission: Decimal,
        item_count: usize,
    },
    OrderStatusChanged {
        order_id: Uuid,
        supplier_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    StockSet {
        variant_id: Uuid,
        quantity: i32,
    },
    VariantAdded {
        product_id: Uuid,
        variant_id: Uuid,
        merged: bool,
    },
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    StatementsGenerated {
        reference_month: NaiveDate,
        statement_count: usize,
    },
    PaymentRegistered {
        statement_id: Uuid,
        amount_paid: Decimal,
    },
    SupplierHomologated {
        school_id: Uuid,
        supplier_id: Uuid,
    },
    HomologationRevoked {
        school_id: Uuid,
        supplier_id: Uuid,
    },
    AccessCodeIssued {
        email: String,
        role: Role,
    },
    RegistryEntryCreated {
        kind: RegistryKind,
        id: Uuid,
    },
    RegistryActivationChanged {
        kind: RegistryKind,
        id: Uuid,
        active: bool,
    },
}

/// Consumes the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");
    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderPlaced {
                order_id,
                total,
                item_count,
                ..
            } => {
                info!(%order_id, %total, item_count, "order placed");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
                ..
            } => {
                info!(%order_id, %old_status, %new_status, "order status changed");
            }
            Event::StatementsGenerated {
                reference_month,
                statement_count,
            } => {
                info!(%reference_month, statement_count, "commission statements generated");
            }
            other => info!(event = ?other, "event received"),
        }
    }
    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender.send(Event::ProductCreated(Uuid::nil())).await.unwrap();

        match rx.recv().await {
            Some(Event::ProductCreated(id)) => assert_eq!(id, Uuid::nil()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender.send(Event::ProductUpdated(Uuid::nil())).await.is_err());
        sender.send_or_log(Event::ProductUpdated(Uuid::nil())).await;
    }
}
