//! Executes the evaluation graph.
pub mod engine;
pub mod kernel;
pub mod ledger;

pub use engine::Engine;
pub use ledger::{EvalError, Ledger};
