use sea_orm::ConnectionTrait;

pub mod stock_ledger;

pub use stock_ledger::{DbStockLedger, NewMoveLine, StockLedger};

/// Repository trait for common database operations
pub trait Repository {
    type Conn: ConnectionTrait;

    fn get_db(&self) -> &Self::Conn;
}
