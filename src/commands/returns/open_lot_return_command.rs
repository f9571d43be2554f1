use crate::{
    commands::Command,
    config::ReturnSettings,
    db::DbPool,
    errors::ServiceError,
    events::{Event, EventSender},
    models::ReturnWizard,
    repositories::DbStockLedger,
    services::{
        lot_reconciler::expand_return_lines,
        return_picking::{DbReturnPickingHost, ReturnPickingHost},
    },
};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Opens a return session for a delivery, proposing one line per delivered
/// move with lot detail for tracked products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenLotReturnCommand {
    /// Delivery picking being returned
    pub picking_id: Uuid,
    #[serde(default)]
    pub settings: ReturnSettings,
}

impl OpenLotReturnCommand {
    pub fn new(picking_id: Uuid, settings: ReturnSettings) -> Self {
        Self {
            picking_id,
            settings,
        }
    }
}

#[async_trait]
impl Command for OpenLotReturnCommand {
    type Result = ReturnWizard;

    #[tracing::instrument(skip(self, db_pool, event_sender), fields(picking_id = %self.picking_id))]
    async fn execute(
        &self,
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
    ) -> Result<Self::Result, ServiceError> {
        let db = db_pool.as_ref();
        let host = DbReturnPickingHost::new(db);
        let ledger = DbStockLedger::new(db);

        let defaults = host
            .default_return_lines(self.picking_id, self.settings.precision)
            .await?;
        let lines = expand_return_lines(&ledger, self.picking_id, defaults, self.settings).await?;
        let wizard = ReturnWizard::new(self.picking_id, self.settings.precision, lines);

        let lot_lines = wizard.lines.iter().filter(|l| l.is_lot_managed()).count();
        counter!("lot_returns.wizard.opened", 1);
        info!(lines = wizard.lines.len(), lot_lines, "Return wizard opened");

        if let Err(e) = event_sender
            .send(Event::ReturnWizardOpened {
                picking_id: self.picking_id,
                lines: wizard.lines.len(),
                lot_lines,
            })
            .await
        {
            warn!("Return wizard opened but event was not delivered: {}", e);
        }

        Ok(wizard)
    }
}
