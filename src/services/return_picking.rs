use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, Set,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    entities::{
        stock_move::{self, Entity as StockMove, MoveState},
        stock_move_line::{self, Entity as StockMoveLine},
        stock_picking::{self, Entity as StockPicking, PickingState, PickingType},
    },
    errors::ServiceError,
    models::{QtyPrecision, ReturnLine, ReturnWizard},
    repositories::{DbStockLedger, NewMoveLine, StockLedger},
};

/// The standard return flow of the host: proposes one line per delivered
/// move and turns a finished wizard into a return picking.
#[async_trait]
pub trait ReturnPickingHost: Send + Sync {
    /// Default lines for returning `picking_id`, without lot detail.
    async fn default_return_lines(
        &self,
        picking_id: Uuid,
        precision: QtyPrecision,
    ) -> Result<Vec<ReturnLine>, ServiceError>;

    /// Creates the return picking with one lot-less move per positive line.
    /// Returns the new picking id, if one was produced.
    async fn create_returns(&self, wizard: &ReturnWizard) -> Result<Option<Uuid>, ServiceError>;
}

/// [`ReturnPickingHost`] writing through sea-orm.
#[derive(Debug)]
pub struct DbReturnPickingHost<'a, C> {
    conn: &'a C,
}

impl<'a, C> DbReturnPickingHost<'a, C>
where
    C: ConnectionTrait + Send + Sync,
{
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    fn ledger(&self) -> DbStockLedger<'a, C> {
        DbStockLedger::new(self.conn)
    }

    async fn returned_qty(&self, move_id: Uuid) -> Result<Decimal, ServiceError> {
        let returned = self.ledger().returned_moves(move_id).await?;
        Ok(returned.iter().map(|m| m.quantity).sum())
    }

    async fn next_return_name(&self, origin: &stock_picking::Model) -> Result<String, ServiceError> {
        let previous = StockPicking::find()
            .filter(stock_picking::Column::ReturnOfId.eq(origin.id))
            .count(self.conn)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(format!("{}/RET/{:03}", origin.name, previous + 1))
    }

    /// Marks a return picking and everything under it as done. Pickings that
    /// are not returns are refused.
    #[instrument(skip(self))]
    pub async fn complete_picking(
        &self,
        picking_id: Uuid,
    ) -> Result<stock_picking::Model, ServiceError> {
        let picking = StockPicking::find_by_id(picking_id)
            .one(self.conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Picking {} not found", picking_id)))?;

        if picking.return_of_id.is_none() || picking.picking_type != PickingType::Incoming {
            return Err(ServiceError::InvalidOperation(format!(
                "Picking {} is not a return",
                picking.name
            )));
        }
        if picking.state == PickingState::Done || picking.state == PickingState::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "Picking {} is already {:?}",
                picking.name, picking.state
            )));
        }

        StockMove::update_many()
            .col_expr(stock_move::Column::State, Expr::value(MoveState::Done))
            .filter(stock_move::Column::PickingId.eq(picking_id))
            .filter(stock_move::Column::State.ne(MoveState::Cancelled))
            .exec(self.conn)
            .await
            .map_err(ServiceError::db_error)?;

        StockMoveLine::update_many()
            .col_expr(stock_move_line::Column::State, Expr::value(MoveState::Done))
            .filter(stock_move_line::Column::PickingId.eq(picking_id))
            .filter(stock_move_line::Column::State.ne(MoveState::Cancelled))
            .exec(self.conn)
            .await
            .map_err(ServiceError::db_error)?;

        let mut active: stock_picking::ActiveModel = picking.into();
        active.state = Set(PickingState::Done);
        active.date_done = Set(Some(Utc::now()));
        let done = active.update(self.conn).await.map_err(ServiceError::db_error)?;

        info!(picking = %done.name, "Picking validated");
        Ok(done)
    }
}

#[async_trait]
impl<'a, C> ReturnPickingHost for DbReturnPickingHost<'a, C>
where
    C: ConnectionTrait + Send + Sync,
{
    #[instrument(skip(self))]
    async fn default_return_lines(
        &self,
        picking_id: Uuid,
        precision: QtyPrecision,
    ) -> Result<Vec<ReturnLine>, ServiceError> {
        let ledger = self.ledger();
        ledger
            .find_picking(picking_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Picking {} not found", picking_id)))?;

        let mut lines = Vec::new();
        for mv in ledger.moves_of_picking(picking_id).await? {
            if mv.state == MoveState::Cancelled {
                continue;
            }
            let returnable = mv.quantity - self.returned_qty(mv.id).await?;
            let quantity = if precision.is_positive(returnable) {
                precision.truncate(returnable)
            } else {
                Decimal::ZERO
            };
            lines.push(ReturnLine::new(
                Some(mv.id),
                mv.product_id,
                mv.product_uom.clone(),
                quantity,
            ));
        }

        debug!(lines = lines.len(), "Default return lines proposed");
        Ok(lines)
    }

    #[instrument(skip(self, wizard), fields(picking_id = %wizard.picking_id))]
    async fn create_returns(&self, wizard: &ReturnWizard) -> Result<Option<Uuid>, ServiceError> {
        let precision = wizard.precision;
        let lines: Vec<&ReturnLine> = wizard
            .lines
            .iter()
            .filter(|line| line.move_id.is_some() && precision.is_positive(line.quantity))
            .collect();

        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "Please specify at least one non-zero quantity.".to_string(),
            ));
        }

        let ledger = self.ledger();
        let origin = ledger.find_picking(wizard.picking_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Picking {} not found", wizard.picking_id))
        })?;

        let now = Utc::now();
        let return_picking = stock_picking::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(self.next_return_name(&origin).await?),
            picking_type: Set(PickingType::Incoming),
            state: Set(PickingState::Assigned),
            location_id: Set(origin.location_dest_id),
            location_dest_id: Set(origin.location_id),
            company_id: Set(origin.company_id),
            return_of_id: Set(Some(origin.id)),
            created_at: Set(now),
            date_done: Set(None),
        }
        .insert(self.conn)
        .await
        .map_err(ServiceError::db_error)?;

        for line in lines {
            let Some(origin_move_id) = line.move_id else {
                continue;
            };
            let origin_move = ledger.find_move(origin_move_id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("Move {} not found", origin_move_id))
            })?;

            let return_move = stock_move::ActiveModel {
                id: Set(Uuid::new_v4()),
                picking_id: Set(return_picking.id),
                product_id: Set(origin_move.product_id),
                product_uom: Set(origin_move.product_uom.clone()),
                quantity: Set(line.quantity),
                state: Set(MoveState::Assigned),
                location_id: Set(origin_move.location_dest_id),
                location_dest_id: Set(origin_move.location_id),
                company_id: Set(origin_move.company_id),
                origin_returned_move_id: Set(Some(origin_move.id)),
                created_at: Set(now),
            }
            .insert(self.conn)
            .await
            .map_err(ServiceError::db_error)?;

            ledger
                .create_move_line(NewMoveLine::for_move(&return_move, line.quantity))
                .await?;
        }

        info!(return_picking = %return_picking.name, "Return picking created");
        Ok(Some(return_picking.id))
    }
}
