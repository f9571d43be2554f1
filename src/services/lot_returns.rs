use crate::{
    commands::{
        returns::{
            CreateLotReturnCommand, CreateLotReturnResult, OpenLotReturnCommand,
            ValidateReturnCommand,
        },
        Command,
    },
    config::{AppConfig, ReturnSettings},
    db::DbPool,
    entities::stock_picking,
    errors::ServiceError,
    events::EventSender,
    models::ReturnWizard,
};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Service for returning lot-tracked goods from completed deliveries
#[derive(Clone)]
pub struct LotReturnService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    settings: ReturnSettings,
}

impl LotReturnService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        settings: ReturnSettings,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            settings,
        }
    }

    pub fn from_config(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        Self::new(db_pool, event_sender, config.return_settings())
    }

    pub fn settings(&self) -> ReturnSettings {
        self.settings
    }

    /// Opens a return session for a delivery.
    #[instrument(skip(self))]
    pub async fn open_wizard(&self, picking_id: Uuid) -> Result<ReturnWizard, ServiceError> {
        OpenLotReturnCommand::new(picking_id, self.settings)
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Creates the return picking for a finished session. Nothing is written
    /// when the session returns nothing or when any step fails.
    #[instrument(skip(self, wizard), fields(picking_id = %wizard.picking_id))]
    pub async fn create_returns(
        &self,
        wizard: ReturnWizard,
    ) -> Result<CreateLotReturnResult, ServiceError> {
        CreateLotReturnCommand::new(wizard)
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }

    /// Completes a return picking.
    #[instrument(skip(self))]
    pub async fn validate_return(
        &self,
        picking_id: Uuid,
    ) -> Result<stock_picking::Model, ServiceError> {
        ValidateReturnCommand { picking_id }
            .execute(self.db_pool.clone(), self.event_sender.clone())
            .await
    }
}
