use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How units of a product are traced through stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum Tracking {
    #[sea_orm(string_value = "none")]
    Untracked,
    #[sea_orm(string_value = "lot")]
    Lot,
    #[sea_orm(string_value = "serial")]
    Serial,
}

impl Tracking {
    /// Lot and serial tracked products both move with a lot reference.
    pub fn is_lot_tracked(self) -> bool {
        matches!(self, Tracking::Lot | Tracking::Serial)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub uom: String,
    pub tracking: Tracking,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::stock_lot::Entity")]
    StockLots,
}

impl Related<super::stock_lot::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLots.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
