pub mod quantity;
pub mod return_wizard;

pub use quantity::QtyPrecision;
pub use return_wizard::{
    LotAssignment, LotAttributes, LotOption, LotTracking, ReturnLine, ReturnWizard,
};
