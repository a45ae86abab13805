//! Incremental evaluation of scalar formula graphs.
//!
//! A graph is a DAG of constants, input variables, named expressions and
//! unary/binary operators, stored in an arena (`store`) and evaluated with a
//! per-node cache and pull-based staleness (`compute`). `EvaluationContext`
//! ties the two together and is the entry point for callers.

pub mod analysis;
pub mod builder;
pub mod compute;
pub mod context;
pub mod display;
pub mod scenario;
pub mod snapshot;
pub mod store;

#[cfg(feature = "python")]
pub mod bindings;

pub use compute::EvalError;
pub use context::{ContextError, EvaluationContext};
pub use store::{BinaryOp, NodeId, NodeKind, UnaryOp};
