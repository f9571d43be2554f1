use crate::{
    commands::{transaction_error, Command},
    db::DbPool,
    entities::stock_picking,
    errors::ServiceError,
    events::{Event, EventSender},
    services::return_picking::DbReturnPickingHost,
};
use async_trait::async_trait;
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

/// Marks a return picking done so later sessions count it as returned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ValidateReturnCommand {
    pub picking_id: Uuid,
}

#[async_trait]
impl Command for ValidateReturnCommand {
    type Result = stock_picking::Model;

    #[tracing::instrument(skip(self, db_pool, event_sender), fields(picking_id = %self.picking_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let picking_id = self.picking_id;
        let picking = db_pool
            .transaction::<_, stock_picking::Model, ServiceError>(move |txn| {
                Box::pin(async move { DbReturnPickingHost::new(txn).complete_picking(picking_id).await })
            })
            .await
            .map_err(transaction_error)?;

        if let Err(e) = event_sender.send(Event::ReturnValidated(picking.id)).await {
            warn!("Picking validated but event was not delivered: {}", e);
        }
        Ok(picking)
    }
}
