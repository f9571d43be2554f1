use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Execution state shared by moves and move lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// One product line of a picking.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_moves")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub picking_id: Uuid,
    pub product_id: Uuid,
    pub product_uom: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub quantity: Decimal,
    pub state: MoveState,
    pub location_id: Uuid,
    pub location_dest_id: Uuid,
    pub company_id: Uuid,
    /// For return moves, the delivery move they send back.
    pub origin_returned_move_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::stock_picking::Entity",
        from = "Column::PickingId",
        to = "super::stock_picking::Column::Id",
        on_delete = "Cascade"
    )]
    StockPicking,
    #[sea_orm(has_many = "super::stock_move_line::Entity")]
    StockMoveLines,
}

impl Related<super::stock_picking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockPicking.def()
    }
}

impl Related<super::stock_move_line::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMoveLines.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
