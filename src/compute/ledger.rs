//! Evaluation state kept beside the arena: memo cells, variable inputs and counters.

use crate::store::NodeId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("Variable not set: '{name}'")]
    UnsetVariable { name: String },
    #[error("Not found: '{name}'")]
    NotFound { name: String },
}

/// Cached result of one node.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MemoCell {
    pub value: Option<f64>,
    /// Pass during which `value` was produced, 0 if never.
    pub stamp: u64,
    pub recomputes: u64,
}

/// Externally supplied value of a variable node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariableInput {
    pub value: Option<f64>,
    pub dirty: bool,
}

impl Default for VariableInput {
    fn default() -> Self {
        Self { value: None, dirty: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    // Dense storage, indexed by NodeId
    cells: Vec<MemoCell>,
    inputs: Vec<VariableInput>,

    passes: u64,
    active_pass: Option<u64>,
    cache_hits: u64,
    pass_hits: u64,
    pass_recomputes: u64,
}

impl Ledger {
    pub fn new() -> Self { Self::default() }

    pub fn ensure_capacity(&mut self, size: usize) {
        if self.cells.len() < size {
            self.cells.resize(size, MemoCell::default());
            self.inputs.resize(size, VariableInput::default());
        }
    }

    #[inline(always)]
    pub fn cell(&self, node_id: NodeId) -> MemoCell {
        self.cells.get(node_id.index()).copied().unwrap_or_default()
    }

    pub fn cached(&self, node_id: NodeId) -> Option<f64> {
        self.cell(node_id).value
    }

    pub fn store(&mut self, node_id: NodeId, value: f64) {
        self.ensure_capacity(node_id.index() + 1);
        let stamp = self.active_pass.unwrap_or(0);
        let cell = &mut self.cells[node_id.index()];
        cell.value = Some(value);
        cell.stamp = stamp;
        cell.recomputes += 1;
        self.pass_recomputes += 1;
    }

    pub fn record_hit(&mut self) {
        self.cache_hits += 1;
        self.pass_hits += 1;
    }

    /// True when the cell was refreshed earlier in the pass that is still running.
    #[inline(always)]
    pub fn is_fresh(&self, node_id: NodeId) -> bool {
        let cell = self.cell(node_id);
        cell.value.is_some() && matches!(self.active_pass, Some(p) if cell.stamp == p)
    }

    // --- Variable inputs ---

    pub fn input(&self, node_id: NodeId) -> VariableInput {
        self.inputs.get(node_id.index()).copied().unwrap_or_default()
    }

    pub fn set_input(&mut self, node_id: NodeId, value: f64) {
        self.ensure_capacity(node_id.index() + 1);
        self.inputs[node_id.index()] = VariableInput { value: Some(value), dirty: true };
    }

    pub fn mark_clean(&mut self, node_id: NodeId) {
        if let Some(input) = self.inputs.get_mut(node_id.index()) {
            input.dirty = false;
        }
    }

    // --- Passes ---

    pub fn begin_pass(&mut self) -> u64 {
        self.passes += 1;
        self.active_pass = Some(self.passes);
        self.pass_hits = 0;
        self.pass_recomputes = 0;
        self.passes
    }

    pub fn end_pass(&mut self) {
        self.active_pass = None;
    }

    pub fn passes(&self) -> u64 { self.passes }
    pub fn cache_hits(&self) -> u64 { self.cache_hits }

    /// (recomputations, cache hits) since the last `begin_pass`.
    pub fn last_pass_counts(&self) -> (u64, u64) {
        (self.pass_recomputes, self.pass_hits)
    }

    pub fn recomputes(&self, node_id: NodeId) -> u64 {
        self.cell(node_id).recomputes
    }

    pub fn total_recomputes(&self) -> u64 {
        self.cells.iter().map(|c| c.recomputes).sum()
    }
}
