use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub use super::stock_move::MoveState;

/// The executed part of a move. Tracked products get one line per lot.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_move_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub move_id: Uuid,
    pub picking_id: Uuid,
    pub product_id: Uuid,
    pub product_uom: String,
    pub lot_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    pub state: MoveState,
    pub location_id: Uuid,
    pub location_dest_id: Uuid,
    pub company_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_move::Entity",
        from = "Column::MoveId",
        to = "super::stock_move::Column::Id",
        on_delete = "Cascade"
    )]
    StockMove,
    #[sea_orm(
        belongs_to = "super::stock_lot::Entity",
        from = "Column::LotId",
        to = "super::stock_lot::Column::Id"
    )]
    StockLot,
}

impl Related<super::stock_move::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMove.def()
    }
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLot.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
