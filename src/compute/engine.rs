//! A synchronous, single-threaded, memoizing evaluator over the node arena.
use crate::compute::kernel;
use crate::compute::ledger::{EvalError, Ledger};
use crate::store::{NodeId, NodeKind, Registry};
use tracing::trace;

/// Pending work of `Engine::compute`.
enum Step {
    /// Serve the node from its cache, or schedule its recomputation.
    Visit(NodeId),
    /// Operands are on the value stack; apply the node and store it.
    Combine(NodeId),
}

pub struct Engine<'a> {
    registry: &'a Registry,
    ledger: &'a mut Ledger,
    // Staleness of every node, swept once from the dirty flags. Nothing the
    // engine does changes a dirty flag, so it holds for the engine's lifetime.
    stale: Vec<bool>,
}

impl<'a> Engine<'a> {
    pub fn new(registry: &'a Registry, ledger: &'a mut Ledger) -> Self {
        ledger.ensure_capacity(registry.count());
        let stale = sweep_staleness(registry, ledger);
        Self { registry, ledger, stale }
    }

    /// The single caching policy shared by every variant: serve the cached value
    /// unless it is absent or stale, otherwise evaluate and store.
    ///
    /// A cell already refreshed in the running pass counts as valid even though the
    /// variables below it are still dirty, so a shared node is evaluated at most once
    /// per pass however many parents reach it.
    ///
    /// Runs on an explicit work stack, so the depth of the graph is not bounded by
    /// the thread's stack. Operands are visited left to right. On failure, nodes that
    /// were already refreshed keep their new values and the failing node and its
    /// ancestors keep their previous cells.
    ///
    /// # Panics
    /// If `id` (or a node below it) is not in the registry.
    pub fn compute(&mut self, id: NodeId) -> Result<f64, EvalError> {
        let registry = self.registry;
        let mut pending = vec![Step::Visit(id)];
        let mut values: Vec<f64> = Vec::new();

        while let Some(step) = pending.pop() {
            match step {
                Step::Visit(node) => {
                    if let Some(value) = self.valid_cache(node) {
                        trace!(node = %node, value, "using cache");
                        self.ledger.record_hit();
                        values.push(value);
                        continue;
                    }
                    match registry.kind(node) {
                        NodeKind::Constant(_) | NodeKind::Variable { .. } => {
                            let value = self.evaluate(node)?;
                            self.finish(node, value);
                            values.push(value);
                        }
                        NodeKind::Expression { child, .. } | NodeKind::Unary { child, .. } => {
                            pending.push(Step::Combine(node));
                            pending.push(Step::Visit(*child));
                        }
                        NodeKind::Binary { left, right, .. } => {
                            pending.push(Step::Combine(node));
                            // Left operand first.
                            pending.push(Step::Visit(*right));
                            pending.push(Step::Visit(*left));
                        }
                    }
                }
                Step::Combine(node) => {
                    let value = match registry.kind(node) {
                        NodeKind::Binary { op, .. } => {
                            let r = pop_operand(&mut values);
                            let l = pop_operand(&mut values);
                            kernel::apply_binary(*op, l, r)
                        }
                        NodeKind::Unary { op, .. } => kernel::apply_unary(*op, pop_operand(&mut values)),
                        _ => pop_operand(&mut values),
                    };
                    self.finish(node, value);
                    values.push(value);
                }
            }
        }
        Ok(pop_operand(&mut values))
    }

    /// Whether a fresh `evaluate` is required. Pure: reads flags, never writes.
    pub fn is_stale(&self, id: NodeId) -> bool {
        self.stale.get(id.index()).copied().unwrap_or(false)
    }

    /// Recomputes one node from its inputs, pulling children through `compute`.
    ///
    /// # Panics
    /// If `id` (or a node below it) is not in the registry.
    pub fn evaluate(&mut self, id: NodeId) -> Result<f64, EvalError> {
        let registry = self.registry;
        match registry.kind(id) {
            NodeKind::Constant(value) => Ok(*value),
            NodeKind::Variable { name } => self
                .ledger
                .input(id)
                .value
                .ok_or_else(|| EvalError::UnsetVariable { name: name.clone() }),
            NodeKind::Expression { child, .. } => self.compute(*child),
            NodeKind::Unary { op, child } => {
                let x = self.compute(*child)?;
                Ok(kernel::apply_unary(*op, x))
            }
            NodeKind::Binary { op, left, right } => {
                // Left operand first.
                let l = self.compute(*left)?;
                let r = self.compute(*right)?;
                Ok(kernel::apply_binary(*op, l, r))
            }
        }
    }

    fn valid_cache(&self, id: NodeId) -> Option<f64> {
        let value = self.ledger.cached(id)?;
        (self.ledger.is_fresh(id) || !self.is_stale(id)).then_some(value)
    }

    fn finish(&mut self, id: NodeId, value: f64) {
        trace!(node = %id, value, "recomputed");
        self.ledger.store(id, value);
    }
}

// Every operand is pushed before the step that consumes it runs.
fn pop_operand(values: &mut Vec<f64>) -> f64 {
    values.pop().unwrap_or(f64::NAN)
}

/// One forward sweep: children precede parents, so each flag is final when read.
fn sweep_staleness(registry: &Registry, ledger: &Ledger) -> Vec<bool> {
    let mut stale: Vec<bool> = Vec::with_capacity(registry.count());
    for (i, kind) in registry.kinds.iter().enumerate() {
        let at = |stale: &[bool], id: &NodeId| stale.get(id.index()).copied().unwrap_or(false);
        let flag = match kind {
            NodeKind::Constant(_) => false,
            NodeKind::Variable { .. } => ledger.input(NodeId::new(i)).dirty,
            NodeKind::Expression { child, .. } | NodeKind::Unary { child, .. } => at(&stale, child),
            NodeKind::Binary { left, right, .. } => at(&stale, left) || at(&stale, right),
        };
        stale.push(flag);
    }
    stale
}
