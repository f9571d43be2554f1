use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PickingType {
    #[sea_orm(string_value = "outgoing")]
    Outgoing,
    #[sea_orm(string_value = "incoming")]
    Incoming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum PickingState {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "done")]
    Done,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// A transfer of goods: a delivery, or a return created from one.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_pickings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub picking_type: PickingType,
    pub state: PickingState,
    pub location_id: Uuid,
    pub location_dest_id: Uuid,
    pub company_id: Uuid,
    /// Set on return pickings; points at the delivery being returned.
    pub return_of_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub date_done: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_move::Entity")]
    StockMoves,
}

impl Related<super::stock_move::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMoves.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_done(&self) -> bool {
        self.state == PickingState::Done
    }
}
