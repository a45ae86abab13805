use super::types::*;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Node {child} referenced by {parent} does not precede it in the arena")]
    InvalidHandle { parent: NodeId, child: NodeId },
}

/// Arena of every node in the graph, addressed by `NodeId`.
///
/// Nodes are append-only. A composite node can only be created from handles
/// that already exist, so every child index is strictly lower than its
/// parent's and the arena is acyclic by construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    pub kinds: Vec<NodeKind>,
}

impl Registry {
    pub fn new() -> Self { Self::default() }
    pub fn count(&self) -> usize { self.kinds.len() }

    pub fn add_constant(&mut self, value: f64) -> NodeId {
        self.push_unchecked(NodeKind::Constant(value))
    }

    pub fn add_variable(&mut self, name: impl Into<String>) -> NodeId {
        self.push_unchecked(NodeKind::Variable { name: name.into() })
    }

    pub fn add_expression(&mut self, name: impl Into<String>, child: NodeId) -> Result<NodeId, RegistryError> {
        self.push_node(NodeKind::Expression { name: name.into(), child })
    }

    pub fn add_unary(&mut self, op: UnaryOp, child: NodeId) -> Result<NodeId, RegistryError> {
        self.push_node(NodeKind::Unary { op, child })
    }

    pub fn add_binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> Result<NodeId, RegistryError> {
        self.push_node(NodeKind::Binary { op, left, right })
    }

    fn push_node(&mut self, kind: NodeKind) -> Result<NodeId, RegistryError> {
        let id = NodeId::new(self.kinds.len());
        Self::check_children(id, &kind)?;
        Ok(self.push_unchecked(kind))
    }

    fn push_unchecked(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::new(self.kinds.len());
        self.kinds.push(kind);
        id
    }

    fn check_children(id: NodeId, kind: &NodeKind) -> Result<(), RegistryError> {
        for child in children_of(kind) {
            if child >= id {
                return Err(RegistryError::InvalidHandle { parent: id, child });
            }
        }
        Ok(())
    }

    /// Re-checks the arena invariant on data that did not come through `add_*`
    /// (e.g. a deserialized snapshot).
    pub fn validate(&self) -> Result<(), RegistryError> {
        for (i, kind) in self.kinds.iter().enumerate() {
            Self::check_children(NodeId::new(i), kind)?;
        }
        Ok(())
    }

    /// # Panics
    /// If `id` does not belong to this registry; use `get` for foreign handles.
    #[inline(always)]
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.kinds[id.index()]
    }

    pub fn get(&self, id: NodeId) -> Option<&NodeKind> {
        self.kinds.get(id.index())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.kinds.len()
    }

    /// Direct inputs of a node, left to right. Empty for a foreign handle.
    pub fn children(&self, id: NodeId) -> SmallVec<[NodeId; 2]> {
        self.get(id).map(children_of).unwrap_or_default()
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(NodeKind::name)
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.kinds.len()).map(NodeId::new)
    }
}

fn children_of(kind: &NodeKind) -> SmallVec<[NodeId; 2]> {
    match kind {
        NodeKind::Constant(_) | NodeKind::Variable { .. } => SmallVec::new(),
        NodeKind::Expression { child, .. } | NodeKind::Unary { child, .. } => smallvec![*child],
        NodeKind::Binary { left, right, .. } => smallvec![*left, *right],
    }
}
