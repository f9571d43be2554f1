use crate::{
    commands::{transaction_error, Command},
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::ReturnWizard,
    repositories::DbStockLedger,
    services::{
        lot_reconciler::{commit_return, validate_selection, CommitOutcome},
        return_picking::DbReturnPickingHost,
    },
};
use async_trait::async_trait;
use metrics::counter;
use rust_decimal::Decimal;
use sea_orm::TransactionTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Creates the return picking for a finished return session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLotReturnCommand {
    pub wizard: ReturnWizard,
}

/// Result returned after creating a return
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLotReturnResult {
    /// Return picking created by the standard routine, if any
    pub return_picking_id: Option<Uuid>,
    /// Quantity the session sent back
    pub quantity: Decimal,
    /// Move lines written with a specific lot
    pub lots_assigned: usize,
}

impl CreateLotReturnCommand {
    pub fn new(wizard: ReturnWizard) -> Self {
        Self { wizard }
    }
}

#[async_trait]
impl Command for CreateLotReturnCommand {
    type Result = CreateLotReturnResult;

    #[tracing::instrument(skip(self, db_pool, event_sender), fields(picking_id = %self.wizard.picking_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        tracing::debug!("Executing CreateLotReturnCommand");

        if let Err(e) = validate_selection(&self.wizard) {
            counter!("lot_returns.validation_rejected", 1);
            return Err(e);
        }

        let wizard = self.wizard.clone();
        let outcome: CommitOutcome = db_pool
            .transaction::<_, CommitOutcome, ServiceError>(move |txn| {
                Box::pin(async move {
                    let ledger = DbStockLedger::new(txn);
                    let host = DbReturnPickingHost::new(txn);
                    commit_return(&ledger, &host, &wizard).await
                })
            })
            .await
            .map_err(|e| {
                let e = transaction_error(e);
                error!("Failed to create lot return: {}", e);
                e
            })?;

        let result = CreateLotReturnResult {
            return_picking_id: outcome.return_picking_id,
            quantity: self.wizard.total_to_return(),
            lots_assigned: outcome.lot_lines_created,
        };

        counter!("lot_returns.created", 1);
        counter!("lot_returns.lots_assigned", result.lots_assigned as u64);

        if let Some(return_picking_id) = result.return_picking_id {
            info!(%return_picking_id, lots_assigned = result.lots_assigned, "Lot return created");
            if let Err(e) = event_sender
                .send(Event::LotReturnCreated {
                    picking_id: self.wizard.picking_id,
                    return_picking_id,
                    quantity: result.quantity,
                    lots_assigned: result.lots_assigned,
                })
                .await
            {
                warn!("Return committed but event was not delivered: {}", e);
            }
        }

        Ok(result)
    }
}
