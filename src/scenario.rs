//! What-if evaluation of many input assignments over one graph.
//!
//! Each scenario runs on its own clone of the context, so the dirty flags and
//! caches of one scenario never leak into another (or back into the base).
use crate::compute::EvalError;
use crate::context::EvaluationContext;
use rayon::prelude::*;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scenario {
    pub name: String,
    pub assignments: Vec<(String, f64)>,
}

impl Scenario {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), assignments: Vec::new() }
    }

    pub fn set(mut self, variable: impl Into<String>, value: f64) -> Self {
        self.assignments.push((variable.into(), value));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub values: Result<BTreeMap<String, f64>, EvalError>,
}

/// Evaluates `targets` (every registered expression when empty) under each
/// scenario in parallel. Outcomes are returned in scenario order.
pub fn run_scenarios(base: &EvaluationContext, scenarios: &[Scenario], targets: &[&str]) -> Vec<ScenarioOutcome> {
    let targets: Vec<String> = if targets.is_empty() {
        base.expression_names().map(str::to_string).collect()
    } else {
        targets.iter().map(|t| t.to_string()).collect()
    };

    scenarios
        .par_iter()
        .map(|scenario| ScenarioOutcome {
            scenario: scenario.name.clone(),
            values: run_one(base.clone(), scenario, &targets),
        })
        .collect()
}

fn run_one(mut ctx: EvaluationContext, scenario: &Scenario, targets: &[String]) -> Result<BTreeMap<String, f64>, EvalError> {
    for (name, value) in &scenario.assignments {
        ctx.set_variable(name, *value);
    }
    targets
        .iter()
        .map(|t| ctx.evaluate(t).map(|v| (t.clone(), v)))
        .collect()
}
