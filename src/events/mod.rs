use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::errors::ServiceError;

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
    pub async fn send(&self, event: Event) -> Result<(), ServiceError> {
        self.sender
            .send(event)
            .await
            .map_err(|e| ServiceError::EventError(format!("Failed to send event: {}", e)))
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

// Domain events raised by the lot return flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    ReturnWizardOpened {
        picking_id: Uuid,
        lines: usize,
        lot_lines: usize,
    },
    LotReturnCreated {
        picking_id: Uuid,
        return_picking_id: Uuid,
        quantity: Decimal,
        lots_assigned: usize,
    },
    ReturnValidated(Uuid),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::ReturnWizardOpened { .. } => "return_wizard_opened",
            Event::LotReturnCreated { .. } => "lot_return_created",
            Event::ReturnValidated(_) => "return_validated",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::ReturnWizardOpened {
                picking_id,
                lines,
                lot_lines,
            } => {
                info!(event = event.name(), %picking_id, lines, lot_lines, "Return wizard opened");
            }
            Event::LotReturnCreated {
                picking_id,
                return_picking_id,
                quantity,
                lots_assigned,
            } => {
                info!(
                    event = event.name(),
                    %picking_id,
                    %return_picking_id,
                    %quantity,
                    lots_assigned,
                    "Lot return created"
                );
            }
            Event::ReturnValidated(picking_id) => {
                info!(event = event.name(), %picking_id, "Return picking validated");
            }
        }
    }

    info!("Event processing loop stopped");
}
