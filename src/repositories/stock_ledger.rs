use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::{
    product::{self, Entity as Product, Tracking},
    stock_lot::{self, Entity as StockLot},
    stock_move::{self, Entity as StockMove, MoveState},
    stock_move_line::{self, Entity as StockMoveLine},
    stock_picking::{self, Entity as StockPicking},
};
use crate::errors::ServiceError;
use crate::repositories::Repository;

/// Values for a move line written onto a return move.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMoveLine {
    pub move_id: Uuid,
    pub picking_id: Uuid,
    pub product_id: Uuid,
    pub product_uom: String,
    pub lot_id: Option<Uuid>,
    pub quantity: Decimal,
    pub location_id: Uuid,
    pub location_dest_id: Uuid,
    pub company_id: Uuid,
}

impl NewMoveLine {
    /// A lot-less line that copies product, unit, locations and company from
    /// its parent move.
    pub fn for_move(parent: &stock_move::Model, quantity: Decimal) -> Self {
        Self {
            move_id: parent.id,
            picking_id: parent.picking_id,
            product_id: parent.product_id,
            product_uom: parent.product_uom.clone(),
            lot_id: None,
            quantity,
            location_id: parent.location_id,
            location_dest_id: parent.location_dest_id,
            company_id: parent.company_id,
        }
    }

    pub fn for_lot(parent: &stock_move::Model, lot_id: Uuid, quantity: Decimal) -> Self {
        Self {
            lot_id: Some(lot_id),
            ..Self::for_move(parent, quantity)
        }
    }
}

/// Reads and writes on host stock records used by lot returns.
#[async_trait]
pub trait StockLedger: Send + Sync {
    async fn find_picking(&self, id: Uuid) -> Result<Option<stock_picking::Model>, ServiceError>;

    async fn find_move(&self, id: Uuid) -> Result<Option<stock_move::Model>, ServiceError>;

    async fn product_tracking(&self, product_id: Uuid) -> Result<Tracking, ServiceError>;

    async fn moves_of_picking(
        &self,
        picking_id: Uuid,
    ) -> Result<Vec<stock_move::Model>, ServiceError>;

    /// Completed lines of a move.
    async fn done_move_lines(
        &self,
        move_id: Uuid,
    ) -> Result<Vec<stock_move_line::Model>, ServiceError>;

    /// Completed return moves whose origin is `origin_move_id`.
    async fn returned_moves(
        &self,
        origin_move_id: Uuid,
    ) -> Result<Vec<stock_move::Model>, ServiceError>;

    async fn lots(&self, ids: &[Uuid]) -> Result<Vec<stock_lot::Model>, ServiceError>;

    /// Removes every line of a move, returning how many went.
    async fn delete_move_lines(&self, move_id: Uuid) -> Result<u64, ServiceError>;

    async fn create_move_line(
        &self,
        line: NewMoveLine,
    ) -> Result<stock_move_line::Model, ServiceError>;
}

/// [`StockLedger`] over a sea-orm connection or an open transaction.
#[derive(Debug)]
pub struct DbStockLedger<'a, C> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> DbStockLedger<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

impl<C: ConnectionTrait> Repository for DbStockLedger<'_, C> {
    type Conn = C;

    fn get_db(&self) -> &C {
        self.conn
    }
}

#[async_trait]
impl<'a, C> StockLedger for DbStockLedger<'a, C>
where
    C: ConnectionTrait + Send + Sync,
{
    async fn find_picking(&self, id: Uuid) -> Result<Option<stock_picking::Model>, ServiceError> {
        StockPicking::find_by_id(id)
            .one(self.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn find_move(&self, id: Uuid) -> Result<Option<stock_move::Model>, ServiceError> {
        StockMove::find_by_id(id)
            .one(self.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn product_tracking(&self, product_id: Uuid) -> Result<Tracking, ServiceError> {
        Product::find_by_id(product_id)
            .one(self.get_db())
            .await
            .map_err(ServiceError::db_error)?
            .map(|p: product::Model| p.tracking)
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn moves_of_picking(
        &self,
        picking_id: Uuid,
    ) -> Result<Vec<stock_move::Model>, ServiceError> {
        StockMove::find()
            .filter(stock_move::Column::PickingId.eq(picking_id))
            .order_by_asc(stock_move::Column::CreatedAt)
            .order_by_asc(stock_move::Column::Id)
            .all(self.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn done_move_lines(
        &self,
        move_id: Uuid,
    ) -> Result<Vec<stock_move_line::Model>, ServiceError> {
        StockMoveLine::find()
            .filter(stock_move_line::Column::MoveId.eq(move_id))
            .filter(stock_move_line::Column::State.eq(MoveState::Done))
            .all(self.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn returned_moves(
        &self,
        origin_move_id: Uuid,
    ) -> Result<Vec<stock_move::Model>, ServiceError> {
        StockMove::find()
            .filter(stock_move::Column::OriginReturnedMoveId.eq(origin_move_id))
            .filter(stock_move::Column::State.eq(MoveState::Done))
            .all(self.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn lots(&self, ids: &[Uuid]) -> Result<Vec<stock_lot::Model>, ServiceError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        StockLot::find()
            .filter(stock_lot::Column::Id.is_in(ids.iter().copied()))
            .all(self.get_db())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn delete_move_lines(&self, move_id: Uuid) -> Result<u64, ServiceError> {
        let res = StockMoveLine::delete_many()
            .filter(stock_move_line::Column::MoveId.eq(move_id))
            .exec(self.get_db())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(res.rows_affected)
    }

    async fn create_move_line(
        &self,
        line: NewMoveLine,
    ) -> Result<stock_move_line::Model, ServiceError> {
        stock_move_line::ActiveModel {
            id: Set(Uuid::new_v4()),
            move_id: Set(line.move_id),
            picking_id: Set(line.picking_id),
            product_id: Set(line.product_id),
            product_uom: Set(line.product_uom),
            lot_id: Set(line.lot_id),
            quantity: Set(line.quantity),
            state: Set(MoveState::Assigned),
            location_id: Set(line.location_id),
            location_dest_id: Set(line.location_dest_id),
            company_id: Set(line.company_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.get_db())
        .await
        .map_err(ServiceError::db_error)
    }
}
