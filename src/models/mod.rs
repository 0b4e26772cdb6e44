pub mod outcome;
pub mod unit;

pub use outcome::{EmptyUnitPolicy, UnitOutcome};
pub use unit::TransferUnit;
