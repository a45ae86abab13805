use crate::context::EvaluationContext;
use crate::store::{NodeId, NodeKind, Registry};
use crate::compute::Ledger;
use std::collections::HashMap;
use std::fmt::Write;

/// Renders the subtree of a registered expression with the values currently
/// held in the cache. Does not evaluate anything: call `evaluate` first to
/// see fresh numbers, otherwise absent values print as `[?]`.
pub fn format_trace(ctx: &EvaluationContext, expression: &str) -> String {
    let mut tracer = Tracer {
        registry: ctx.registry(),
        ledger: ctx.ledger(),
        visited_at_level: HashMap::new(),
        output: String::new(),
    };

    match ctx.lookup_expression(expression) {
        Some(id) => {
            let _ = writeln!(tracer.output, "AUDIT TRACE for expression '{}':", expression);
            let _ = writeln!(tracer.output, "--------------------------------------------------");
            tracer.trace_node(id, 1, "");
        }
        None => {
            let _ = writeln!(tracer.output, "Error: Unknown expression '{}'", expression);
        }
    }
    tracer.output
}

struct Tracer<'a> {
    registry: &'a Registry,
    ledger: &'a Ledger,
    visited_at_level: HashMap<NodeId, usize>,
    output: String,
}

impl<'a> Tracer<'a> {
    fn trace_node(&mut self, node_id: NodeId, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(&node_id) {
            let label = self.label(node_id);
            let _ = writeln!(self.output, "{}-> {} (Ref to L{})", prefix, label, first_seen);
            return;
        }
        self.visited_at_level.insert(node_id, level);

        let line_header = format!("[L{}] {}{}", level, self.label(node_id), self.format_value(node_id));

        match self.registry.kind(node_id) {
            NodeKind::Constant(_) => {
                let _ = writeln!(self.output, "{}{} -> Const", prefix, line_header);
            }
            NodeKind::Variable { .. } => {
                let input = self.ledger.input(node_id);
                let state = match (input.value, input.dirty) {
                    (None, _) => " (unset)",
                    (Some(_), true) => " (dirty)",
                    (Some(_), false) => "",
                };
                let _ = writeln!(self.output, "{}{} -> Var{}", prefix, line_header, state);
            }
            NodeKind::Expression { child, .. } => {
                let body = self.format_ref(*child);
                let _ = writeln!(self.output, "{}{} = {}", prefix, line_header, body);
                self.recurse_children(prefix, &[*child], level);
            }
            NodeKind::Unary { op, child } => {
                let operand = self.format_ref(*child);
                let _ = writeln!(self.output, "{}{} = {}({})", prefix, line_header, op.symbol(), operand);
                self.recurse_children(prefix, &[*child], level);
            }
            NodeKind::Binary { op, left, right } => {
                let formula = if op.is_infix() {
                    format!("{} {} {}", self.format_ref(*left), op.symbol(), self.format_ref(*right))
                } else {
                    format!("{}({}, {})", op.symbol(), self.format_ref(*left), self.format_ref(*right))
                };
                let _ = writeln!(self.output, "{}{} = {}", prefix, line_header, formula);
                self.recurse_children(prefix, &[*left, *right], level);
            }
        }
    }

    fn recurse_children(&mut self, prefix: &str, children: &[NodeId], level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, &child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(child, level + 1, &full_prefix);
        }
    }

    fn label(&self, id: NodeId) -> String {
        match self.registry.kind(id) {
            NodeKind::Constant(v) => format!("{}", v),
            NodeKind::Variable { name } | NodeKind::Expression { name, .. } => name.clone(),
            NodeKind::Unary { op, .. } => op.symbol().to_string(),
            NodeKind::Binary { op, .. } => format!("({})", op.symbol()),
        }
    }

    fn format_ref(&self, id: NodeId) -> String {
        format!("{}{}", self.label(id), self.format_value(id))
    }

    fn format_value(&self, id: NodeId) -> String {
        match self.ledger.cached(id) {
            Some(v) => format!("[{:.3}]", v),
            None => "[?]".to_string(),
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}
