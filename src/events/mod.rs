use crate::errors::ServiceError;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }

    /// Publishes without waiting, logging instead of failing when the channel
    /// is full or closed. Used after a commit, when the mutation has already
    /// succeeded.
    pub async fn send_or_log(&self, event: Event) {
        let name = event.name();
        if let Err(e) = self.sender.try_send(event) {
            counter!("flexvolt_events_dropped_total", 1, "event" => name);
            warn!(event = name, error = %e, "dropping domain event");
        }
    }
}

/// Domain events published after a successful commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    InventoryAdjusted {
        warehouse_id: Uuid,
        product_id: String,
        old_quantity: i32,
        new_quantity: i32,
        adjustment_type: String,
        movement_id: Uuid,
    },
    InventoryAlertRaised {
        alert_id: Uuid,
        warehouse_id: Uuid,
        product_id: String,
        alert_type: String,
    },
    TransferRequested {
        transfer_id: Uuid,
        from_warehouse_id: Uuid,
        to_warehouse_id: Uuid,
        quantity: i32,
    },
    TransferCompleted(Uuid),
    TransferCancelled(Uuid),
    WarehouseCreated(Uuid),
    WarehouseStatusChanged {
        warehouse_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),
    SupplierRegistered(Uuid),
    SupplierLoggedIn {
        supplier_id: Uuid,
        session_id: Uuid,
    },
    SupplierLocked {
        supplier_id: Uuid,
        until: DateTime<Utc>,
    },
    ComplianceChecked {
        check_id: Uuid,
        warehouse_id: Uuid,
        compliant: bool,
        risk_level: String,
    },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::InventoryAdjusted { .. } => "inventory_adjusted",
            Event::InventoryAlertRaised { .. } => "inventory_alert_raised",
            Event::TransferRequested { .. } => "transfer_requested",
            Event::TransferCompleted(_) => "transfer_completed",
            Event::TransferCancelled(_) => "transfer_cancelled",
            Event::WarehouseCreated(_) => "warehouse_created",
            Event::WarehouseStatusChanged { .. } => "warehouse_status_changed",
            Event::OrderCreated(_) => "order_created",
            Event::OrderStatusChanged { .. } => "order_status_changed",
            Event::OrderCancelled(_) => "order_cancelled",
            Event::SupplierRegistered(_) => "supplier_registered",
            Event::SupplierLoggedIn { .. } => "supplier_logged_in",
            Event::SupplierLocked { .. } => "supplier_locked",
            Event::ComplianceChecked { .. } => "compliance_checked",
        }
    }
}

/// Drain the event channel until every sender is dropped.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    info!("Event processing loop started");

    while let Some(event) = receiver.recv().await {
        counter!("flexvolt_events_processed_total", 1, "event" => event.name());

        match &event {
            Event::InventoryAdjusted {
                warehouse_id,
                product_id,
                old_quantity,
                new_quantity,
                adjustment_type,
                ..
            } => {
                info!(
                    %warehouse_id,
                    %product_id,
                    old_quantity,
                    new_quantity,
                    %adjustment_type,
                    "inventory adjusted"
                );
            }
            Event::InventoryAlertRaised {
                warehouse_id,
                product_id,
                alert_type,
                ..
            } => {
                warn!(%warehouse_id, %product_id, %alert_type, "inventory alert raised");
            }
            Event::SupplierLocked { supplier_id, until } => {
                warn!(%supplier_id, %until, "supplier account locked");
            }
            Event::ComplianceChecked {
                check_id,
                compliant,
                risk_level,
                ..
            } if !compliant => {
                warn!(%check_id, %risk_level, "compliance check failed");
            }
            other => {
                info!(event = other.name(), "domain event");
            }
        }
    }

    warn!("Event processing loop has ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sender_delivers_events_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();
        sender.send(Event::OrderCreated(id)).await.unwrap();
        sender.send(Event::OrderCancelled(id)).await.unwrap();

        assert!(matches!(rx.recv().await, Some(Event::OrderCreated(got)) if got == id));
        assert!(matches!(rx.recv().await, Some(Event::OrderCancelled(got)) if got == id));
    }

    #[tokio::test]
    async fn send_fails_once_receiver_is_gone() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        let err = sender.send(Event::TransferCompleted(Uuid::new_v4())).await;
        assert!(matches!(err, Err(ServiceError::EventError(_))));
        // must not panic
        sender.send_or_log(Event::TransferCancelled(Uuid::new_v4())).await;
    }
}
