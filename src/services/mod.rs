pub mod lot_reconciler;
pub mod lot_returns;
pub mod return_picking;

pub use lot_returns::LotReturnService;
pub use return_picking::{DbReturnPickingHost, ReturnPickingHost};
