use crate::context::EvaluationContext;
use crate::store::{NodeId, NodeKind, Registry};
use petgraph::algo::{is_cyclic_directed, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Exports the arena as a `petgraph` graph. Node `i` carries `NodeId(i)` and
/// edges point from an input to the node that reads it.
pub fn dependency_graph(registry: &Registry) -> DiGraph<NodeId, ()> {
    let mut graph = DiGraph::with_capacity(registry.count(), registry.count() * 2);
    for id in registry.ids() {
        graph.add_node(id);
    }
    for id in registry.ids() {
        for child in registry.children(id) {
            // Edges to handles outside the arena are skipped; `Registry::validate` reports them.
            if registry.contains(child) {
                graph.add_edge(NodeIndex::new(child.index()), NodeIndex::new(id.index()), ());
            }
        }
    }
    graph
}

pub fn is_acyclic(registry: &Registry) -> bool {
    !is_cyclic_directed(&dependency_graph(registry))
}

/// Returns an order in which every input appears before its consumers.
pub fn sort(registry: &Registry) -> Result<Vec<NodeId>, String> {
    let graph = dependency_graph(registry);
    toposort(&graph, None)
        .map(|order| order.into_iter().map(|ix| graph[ix]).collect())
        .map_err(|cycle| format!("Cycle detected involving node {}", graph[cycle.node_id()]))
}

/// Every node the start nodes transitively read, including the start nodes.
pub fn upstream_from(registry: &Registry, start_nodes: &[NodeId]) -> HashSet<NodeId> {
    let mut visited = HashSet::new();
    let mut queue = VecDeque::from(start_nodes.to_vec());

    while let Some(node) = queue.pop_front() {
        if visited.insert(node) {
            queue.extend(registry.children(node));
        }
    }
    visited
}

/// Every node that transitively reads one of the start nodes, including the start nodes.
pub fn downstream_from(registry: &Registry, start_nodes: &[NodeId]) -> HashSet<NodeId> {
    let graph = dependency_graph(registry);
    let mut visited = HashSet::new();
    for &start in start_nodes {
        if !registry.contains(start) {
            continue;
        }
        let mut dfs = Dfs::new(&graph, NodeIndex::new(start.index()));
        while let Some(ix) = dfs.next(&graph) {
            visited.insert(graph[ix]);
        }
    }
    visited
}

/// Names of the variables an expression depends on, sorted.
pub fn upstream_variables(registry: &Registry, id: NodeId) -> Vec<String> {
    upstream_from(registry, &[id])
        .into_iter()
        .filter_map(|n| match registry.get(n) {
            Some(NodeKind::Variable { name }) => Some(name.clone()),
            _ => None,
        })
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Registered expressions that read the named variable, in registration order.
/// Empty when the variable is unknown.
pub fn downstream_expressions(ctx: &EvaluationContext, variable: &str) -> Vec<String> {
    let Some(var) = ctx.lookup_variable(variable) else {
        return Vec::new();
    };
    let affected = downstream_from(ctx.registry(), &[var]);
    ctx.registration_order()
        .iter()
        .filter(|id| affected.contains(*id))
        .filter_map(|&id| ctx.registry().name(id).map(str::to_string))
        .collect()
}
