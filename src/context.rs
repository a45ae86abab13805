//! The evaluation context: owns the node arena, the named roots and the
//! evaluation state, and drives full recomputation passes.
use crate::analysis::telemetry::TelemetryReport;
use crate::compute::{Engine, EvalError, Ledger};
use crate::store::{BinaryOp, NodeId, NodeKind, Registry, RegistryError, UnaryOp};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Expression '{0}' is already registered")]
    DuplicateExpression(String),
    #[error("Variable '{0}' is already registered")]
    DuplicateVariable(String),
    #[error("'{0}' already names a node of the other kind")]
    NameConflict(String),
    #[error("Node {id} registered as '{name}' is not a variable node")]
    NotAVariable { name: String, id: NodeId },
    #[error("Node {id} registered as '{name}' is not an expression node with that name")]
    NotAnExpression { name: String, id: NodeId },
    #[error(transparent)]
    InvalidHandle(#[from] RegistryError),
}

#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    registry: Registry,
    ledger: Ledger,
    expressions: HashMap<String, NodeId>,
    variables: BTreeMap<String, NodeId>,
    // Registration order is the recomputation order of a pass.
    order: Vec<NodeId>,
}

impl EvaluationContext {
    pub fn new() -> Self { Self::default() }

    // --- Graph construction ---

    pub fn add_constant(&mut self, value: f64) -> NodeId {
        self.registry.add_constant(value)
    }

    pub fn add_unary(&mut self, op: UnaryOp, child: NodeId) -> Result<NodeId, ContextError> {
        Ok(self.registry.add_unary(op, child)?)
    }

    pub fn add_binary(&mut self, op: BinaryOp, left: NodeId, right: NodeId) -> Result<NodeId, ContextError> {
        Ok(self.registry.add_binary(op, left, right)?)
    }

    /// Creates a variable node and registers it under its name.
    pub fn declare_variable(&mut self, name: &str) -> Result<NodeId, ContextError> {
        self.check_variable_name(name)?;
        let id = self.registry.add_variable(name);
        self.register_variable(name, id)?;
        Ok(id)
    }

    /// Creates an expression node over `body` and registers it under `name`.
    pub fn define_expression(&mut self, name: &str, body: NodeId) -> Result<NodeId, ContextError> {
        self.check_expression_name(name)?;
        let id = self.registry.add_expression(name, body)?;
        self.register_expression(name, id)?;
        Ok(id)
    }

    /// Registers an existing expression node; it joins the end of the recomputation order.
    pub fn register_expression(&mut self, name: &str, id: NodeId) -> Result<(), ContextError> {
        match self.registry.get(id) {
            Some(NodeKind::Expression { name: own, .. }) if own == name => {}
            _ => return Err(ContextError::NotAnExpression { name: name.to_string(), id }),
        }
        self.check_expression_name(name)?;
        debug!(name, node = %id, "expression registered");
        self.expressions.insert(name.to_string(), id);
        self.order.push(id);
        Ok(())
    }

    pub fn register_variable(&mut self, name: &str, id: NodeId) -> Result<(), ContextError> {
        if !matches!(self.registry.get(id), Some(NodeKind::Variable { .. })) {
            return Err(ContextError::NotAVariable { name: name.to_string(), id });
        }
        self.check_variable_name(name)?;
        debug!(name, node = %id, "variable registered");
        self.variables.insert(name.to_string(), id);
        Ok(())
    }

    fn check_expression_name(&self, name: &str) -> Result<(), ContextError> {
        if self.expressions.contains_key(name) {
            return Err(ContextError::DuplicateExpression(name.to_string()));
        }
        if self.variables.contains_key(name) {
            return Err(ContextError::NameConflict(name.to_string()));
        }
        Ok(())
    }

    fn check_variable_name(&self, name: &str) -> Result<(), ContextError> {
        if self.variables.contains_key(name) {
            return Err(ContextError::DuplicateVariable(name.to_string()));
        }
        if self.expressions.contains_key(name) {
            return Err(ContextError::NameConflict(name.to_string()));
        }
        Ok(())
    }

    // --- Queries ---

    pub fn has_expression(&self, name: &str) -> bool {
        self.expressions.contains_key(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn lookup_expression(&self, name: &str) -> Option<NodeId> {
        self.expressions.get(name).copied()
    }

    pub fn lookup_variable(&self, name: &str) -> Option<NodeId> {
        self.variables.get(name).copied()
    }

    /// Expression names in registration order.
    pub fn expression_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.order.iter().filter_map(|&id| self.registry.name(id))
    }

    /// Variable names in lexical order.
    pub fn variable_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.variables.keys().map(String::as_str)
    }

    pub fn variable_value(&self, name: &str) -> Option<f64> {
        self.lookup_variable(name).and_then(|id| self.ledger.input(id).value)
    }

    /// Last computed value of a node, without triggering a pass.
    pub fn cached_value(&self, id: NodeId) -> Option<f64> {
        self.ledger.cached(id)
    }

    pub fn registry(&self) -> &Registry { &self.registry }
    pub fn ledger(&self) -> &Ledger { &self.ledger }
    pub fn node_count(&self) -> usize { self.registry.count() }

    pub(crate) fn registration_order(&self) -> &[NodeId] { &self.order }

    // --- Evaluation ---

    /// Stores a new input value and marks the variable dirty. Unknown names are
    /// ignored with a warning: callers may set inputs a given graph does not use.
    pub fn set_variable(&mut self, name: &str, value: f64) {
        match self.variables.get(name) {
            Some(&id) => {
                debug!(name, value, "variable set");
                self.ledger.set_input(id, value);
            }
            None => warn!(name, "Trying to set an unknown variable"),
        }
    }

    /// Runs a recomputation pass over every registered expression, then marks
    /// all variables clean, then answers `name` from the refreshed cache.
    ///
    /// Any failure aborts the pass before the dirty flags are cleared, so the
    /// next call retries everything that was stale.
    pub fn evaluate(&mut self, name: &str) -> Result<f64, EvalError> {
        // 1. Refresh every registered expression, in registration order.
        let pass = self.ledger.begin_pass();
        let refreshed = self.refresh_all();
        self.ledger.end_pass();
        let (recomputed, hits) = self.ledger.last_pass_counts();
        debug!(pass, recomputed, hits, ok = refreshed.is_ok(), "recomputation pass");
        refreshed?;

        // 2. Only now may the dirty flags observed by the pass be cleared.
        for &id in self.variables.values() {
            self.ledger.mark_clean(id);
        }

        // 3. Answer from the cache.
        let id = self
            .lookup_expression(name)
            .ok_or_else(|| EvalError::NotFound { name: name.to_string() })?;
        Engine::new(&self.registry, &mut self.ledger).compute(id)
    }

    fn refresh_all(&mut self) -> Result<(), EvalError> {
        let mut engine = Engine::new(&self.registry, &mut self.ledger);
        for &id in &self.order {
            engine.compute(id)?;
        }
        Ok(())
    }

    /// Evaluates every registered expression in registration order.
    pub fn evaluate_all(&mut self) -> Result<Vec<(String, f64)>, EvalError> {
        let names: Vec<String> = self.expression_names().map(str::to_string).collect();
        names
            .into_iter()
            .map(|name| self.evaluate(&name).map(|v| (name, v)))
            .collect()
    }

    // --- Telemetry ---

    pub fn recompute_count(&self, id: NodeId) -> u64 {
        self.ledger.recomputes(id)
    }

    pub fn passes(&self) -> u64 {
        self.ledger.passes()
    }

    pub fn telemetry(&self) -> TelemetryReport {
        TelemetryReport::analyze(&self.registry, &self.ledger)
    }

    /// Rebuilds a context from a bare arena and its registration order. Every
    /// variable starts unset and every cache empty.
    pub(crate) fn from_parts(registry: Registry, order: &[NodeId]) -> Result<Self, ContextError> {
        registry.validate()?;
        let mut ctx = Self { registry, ..Self::default() };
        let variables: Vec<(String, NodeId)> = ctx
            .registry
            .ids()
            .filter_map(|id| match ctx.registry.kind(id) {
                NodeKind::Variable { name } => Some((name.clone(), id)),
                _ => None,
            })
            .collect();
        for (name, id) in variables {
            ctx.register_variable(&name, id)?;
        }
        for &id in order {
            let name = ctx
                .registry
                .name(id)
                .map(str::to_string)
                .ok_or_else(|| ContextError::NotAnExpression { name: String::new(), id })?;
            ctx.register_expression(&name, id)?;
        }
        ctx.ledger.ensure_capacity(ctx.registry.count());
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// X = 3 ; Y = X + (1 + (2 + z))
    fn sample() -> (EvaluationContext, NodeId, NodeId) {
        let mut ctx = EvaluationContext::new();
        let three = ctx.add_constant(3.0);
        let x = ctx.define_expression("X", three).unwrap();
        let z = ctx.declare_variable("z").unwrap();
        let two = ctx.add_constant(2.0);
        let inner = ctx.add_binary(BinaryOp::Add, two, z).unwrap();
        let one = ctx.add_constant(1.0);
        let mid = ctx.add_binary(BinaryOp::Add, one, inner).unwrap();
        let body = ctx.add_binary(BinaryOp::Add, x, mid).unwrap();
        let y = ctx.define_expression("Y", body).unwrap();
        (ctx, x, y)
    }

    #[test]
    fn test_evaluate_sample() {
        let (mut ctx, _, _) = sample();
        ctx.set_variable("z", 0.5);
        assert_eq!(ctx.evaluate("X"), Ok(3.0));
        assert_eq!(ctx.evaluate("Y"), Ok(6.5));
    }

    #[test]
    fn test_second_call_is_all_cache_hits() {
        let (mut ctx, x, y) = sample();
        ctx.set_variable("z", 0.5);
        let first = ctx.evaluate("Y").unwrap();
        let before = ctx.ledger().total_recomputes();

        let second = ctx.evaluate("Y").unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(ctx.ledger().total_recomputes(), before);
        assert_eq!(ctx.recompute_count(x), 1);
        assert_eq!(ctx.recompute_count(y), 1);
    }

    #[test]
    fn test_dirty_flag_lives_for_exactly_one_evaluate() {
        let (mut ctx, x, y) = sample();
        ctx.set_variable("z", 0.5);
        ctx.evaluate("X").unwrap();
        assert_eq!(ctx.recompute_count(y), 1);

        ctx.set_variable("z", 1.5);
        assert_eq!(ctx.evaluate("Y"), Ok(7.5));
        assert_eq!(ctx.recompute_count(y), 2);
        // X does not read z.
        assert_eq!(ctx.recompute_count(x), 1);

        ctx.evaluate("Y").unwrap();
        assert_eq!(ctx.recompute_count(y), 2);
    }

    #[test]
    fn test_unknown_variable_is_ignored() {
        let (mut ctx, _, y) = sample();
        ctx.set_variable("z", 0.5);
        ctx.evaluate("Y").unwrap();
        let before = ctx.cached_value(y);

        ctx.set_variable("nope", 42.0);
        assert_eq!(ctx.cached_value(y), before);
        assert!(!ctx.has_variable("nope"));
        assert_eq!(ctx.evaluate("Y"), Ok(6.5));
    }

    #[test]
    fn test_unknown_expression_is_not_found() {
        let (mut ctx, _, _) = sample();
        ctx.set_variable("z", 0.5);
        for _ in 0..3 {
            ctx.evaluate("Y").unwrap();
            assert_eq!(ctx.evaluate("W"), Err(EvalError::NotFound { name: "W".into() }));
        }
        // Variables are not expressions.
        assert!(matches!(ctx.evaluate("z"), Err(EvalError::NotFound { .. })));
    }

    #[test]
    fn test_unset_variable_fails_every_time() {
        let (mut ctx, _, _) = sample();
        for _ in 0..2 {
            assert_eq!(ctx.evaluate("X"), Err(EvalError::UnsetVariable { name: "z".into() }));
        }
        ctx.set_variable("z", 0.5);
        assert_eq!(ctx.evaluate("X"), Ok(3.0));
    }

    #[test]
    fn test_duplicate_names_are_rejected() {
        let (mut ctx, _, _) = sample();
        let c = ctx.add_constant(1.0);
        assert_eq!(ctx.define_expression("X", c), Err(ContextError::DuplicateExpression("X".into())));
        assert_eq!(ctx.declare_variable("z"), Err(ContextError::DuplicateVariable("z".into())));
        assert_eq!(ctx.define_expression("z", c), Err(ContextError::NameConflict("z".into())));
        assert_eq!(ctx.declare_variable("Y"), Err(ContextError::NameConflict("Y".into())));
        assert_eq!(ctx.expression_names().collect::<Vec<_>>(), vec!["X", "Y"]);
    }

    #[test]
    fn test_register_checks_node_kind() {
        let mut ctx = EvaluationContext::new();
        let c = ctx.add_constant(1.0);
        assert_eq!(
            ctx.register_variable("c", c),
            Err(ContextError::NotAVariable { name: "c".into(), id: c })
        );
        assert!(matches!(ctx.register_expression("c", c), Err(ContextError::NotAnExpression { .. })));
        assert!(matches!(ctx.add_unary(UnaryOp::Negate, NodeId(99)), Err(ContextError::InvalidHandle(_))));
    }

    #[test]
    fn test_lookup_returns_shared_handles() {
        let (ctx, x, y) = sample();
        assert_eq!(ctx.lookup_expression("X"), Some(x));
        assert_eq!(ctx.lookup_expression("Y"), Some(y));
        assert!(ctx.lookup_variable("z").is_some());
        assert_eq!(ctx.lookup_variable("X"), None);
        assert!(ctx.has_expression("Y") && ctx.has_variable("z"));
    }

    #[test]
    fn test_evaluate_all_in_registration_order() {
        let (mut ctx, _, _) = sample();
        ctx.set_variable("z", 0.5);
        let all = ctx.evaluate_all().unwrap();
        assert_eq!(all, vec![("X".to_string(), 3.0), ("Y".to_string(), 6.5)]);
    }

    #[test]
    fn test_pass_follows_registration_order() {
        // q has the lower handle, but "First" is registered first.
        let mut ctx = EvaluationContext::new();
        let q = ctx.declare_variable("q").unwrap();
        let p = ctx.declare_variable("p").unwrap();
        let first = ctx.add_unary(UnaryOp::Negate, p).unwrap();
        ctx.define_expression("First", first).unwrap();
        ctx.define_expression("Second", q).unwrap();

        let unset_p: Result<f64, EvalError> = Err(EvalError::UnsetVariable { name: "p".into() });
        assert_eq!(ctx.evaluate("Second"), unset_p);
        assert_eq!(ctx.evaluate("First"), unset_p);

        ctx.set_variable("p", 1.0);
        assert_eq!(ctx.evaluate("First"), Err(EvalError::UnsetVariable { name: "q".into() }));
    }
}
