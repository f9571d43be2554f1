// Host-owned stock records read and adjusted during lot returns.
pub mod product;
pub mod stock_lot;
pub mod stock_move;
pub mod stock_move_line;
pub mod stock_picking;
