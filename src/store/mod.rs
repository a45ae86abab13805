//! Node storage: the handle type, the node variants and the arena that owns them.
pub mod registry;
pub mod types;

pub use registry::{Registry, RegistryError};
pub use types::{BinaryOp, CatalogError, NodeId, NodeKind, UnaryOp};
