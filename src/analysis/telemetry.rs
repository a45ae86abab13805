use crate::compute::Ledger;
use crate::store::Registry;
use std::collections::HashMap;
use std::fmt;

/// Cache effectiveness of a context since it was built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryReport {
    pub node_count: usize,
    pub passes: u64,
    pub total_recomputes: u64,
    pub cache_hits: u64,
    /// Recomputations grouped by node variant ("constant", "binary", ...).
    pub recomputes_by_kind: HashMap<String, u64>,
    /// Nodes that have never produced a value.
    pub never_computed: usize,
    pub last_pass_recomputes: u64,
    pub last_pass_hits: u64,
}

impl TelemetryReport {
    pub fn analyze(registry: &Registry, ledger: &Ledger) -> Self {
        let mut recomputes_by_kind = HashMap::new();
        let mut never_computed = 0;

        for id in registry.ids() {
            let cell = ledger.cell(id);
            if cell.value.is_none() {
                never_computed += 1;
            }
            if cell.recomputes > 0 {
                *recomputes_by_kind.entry(registry.kind(id).label().to_string()).or_insert(0) += cell.recomputes;
            }
        }

        let (last_pass_recomputes, last_pass_hits) = ledger.last_pass_counts();
        Self {
            node_count: registry.count(),
            passes: ledger.passes(),
            total_recomputes: ledger.total_recomputes(),
            cache_hits: ledger.cache_hits(),
            recomputes_by_kind,
            never_computed,
            last_pass_recomputes,
            last_pass_hits,
        }
    }

    /// Share of `compute` calls answered from the cache. Lower is worse.
    pub fn hit_ratio(&self) -> f64 {
        let total = self.total_recomputes + self.cache_hits;
        if total > 0 { self.cache_hits as f64 / total as f64 } else { 0.0 }
    }
}

impl fmt::Display for TelemetryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "nodes: {} ({} never computed)", self.node_count, self.never_computed)?;
        writeln!(f, "passes: {}", self.passes)?;
        writeln!(
            f,
            "recomputes: {}, cache hits: {} (hit ratio {:.1}%)",
            self.total_recomputes,
            self.cache_hits,
            self.hit_ratio() * 100.0
        )?;
        let mut kinds: Vec<_> = self.recomputes_by_kind.iter().collect();
        kinds.sort();
        for (kind, count) in kinds {
            writeln!(f, "  {}: {}", kind, count)?;
        }
        write!(f, "last pass: {} recomputes, {} hits", self.last_pass_recomputes, self.last_pass_hits)
    }
}
