pub mod catalog;
pub mod chain;
pub mod framework;
pub mod ledger;
pub mod nested_bounds;

pub use framework::{Binding, Mutator};
pub use ledger::{Ledger, MutationRecord, Operand, OperandKind};
