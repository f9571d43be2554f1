pub mod create_lot_return_command;
pub mod open_lot_return_command;
pub mod validate_return_command;

pub use create_lot_return_command::{CreateLotReturnCommand, CreateLotReturnResult};
pub use open_lot_return_command::OpenLotReturnCommand;
pub use validate_return_command::ValidateReturnCommand;
