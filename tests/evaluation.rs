use evalgraph_core::analysis::topology;
use evalgraph_core::builder;
use evalgraph_core::scenario::{run_scenarios, Scenario};
use evalgraph_core::{EvalError, EvaluationContext};
use std::io::Write;

const TOLERANCE: f64 = 1e-12;

// X = 3
// Y = X + 1 + 2 + z
const TEST_0: &str = r#"
<root>
  <!--X = 3-->
  <variable value="X"><constant value="3"/></variable>
  <!--Y = X + 1 + 2 + z-->
  <variable value="Y">
    <bin_op type="+">
      <variable value="X"/>
      <bin_op type="+">
        <constant value="1"/>
        <bin_op type="+"><constant value="2"/><variable value="z"/></bin_op>
      </bin_op>
    </bin_op>
  </variable>
</root>"#;

// X = exp(y)
// Z = 1 * X
const TEST_1: &str = r#"
<root>
  <variable value="X"><un_op type="exp"><variable value="y"/></un_op></variable>
  <variable value="Z"><bin_op type="*"><constant value="1"/><variable value="X"/></bin_op></variable>
</root>"#;

// E = log(1 + a) + 3 * min(2, 3)
// F = b ^ 2
// G = -E
const INDEPENDENT: &str = r#"
<root>
  <variable value="E">
    <bin_op type="+">
      <un_op type="log"><bin_op type="+"><constant value="1"/><variable value="a"/></bin_op></un_op>
      <bin_op type="*">
        <constant value="3"/>
        <bin_op type="min"><constant value="2"/><constant value="3"/></bin_op>
      </bin_op>
    </bin_op>
  </variable>
  <variable value="F"><bin_op type="^"><variable value="b"/><constant value="2"/></bin_op></variable>
  <variable value="G"><un_op type="-"><variable value="E"/></un_op></variable>
</root>"#;

fn load(xml: &str) -> EvaluationContext {
    builder::from_str(xml).expect("fixture must build")
}

#[test]
fn test_constant_and_free_variable() {
    let mut ctx = load(TEST_0);
    ctx.set_variable("z", 0.5);
    assert_eq!(ctx.evaluate("X"), Ok(3.0));
    assert_eq!(ctx.evaluate("Y"), Ok(6.5));
}

#[test]
fn test_exponential_through_named_expression() {
    let mut ctx = load(TEST_1);
    ctx.set_variable("y", 0.5);
    let x = ctx.evaluate("X").unwrap();
    let z = ctx.evaluate("Z").unwrap();
    assert!((x - 1.6487212707001282).abs() < TOLERANCE, "X = {}", x);
    assert!((z - 1.6487212707001282).abs() < TOLERANCE, "Z = {}", z);
}

#[test]
fn test_repeated_evaluation_is_deterministic() {
    let mut ctx = load(INDEPENDENT);
    ctx.set_variable("a", 2.0);
    ctx.set_variable("b", 1.5);

    let first = ctx.evaluate("G").unwrap();
    for _ in 0..5 {
        assert_eq!(ctx.evaluate("G").unwrap().to_bits(), first.to_bits());
    }
    assert!((first + (3.0f64.ln() + 6.0)).abs() < TOLERANCE);
}

#[test]
fn test_cache_hits_perform_no_recomputation() {
    let mut ctx = load(INDEPENDENT);
    ctx.set_variable("a", 2.0);
    ctx.set_variable("b", 1.5);
    ctx.evaluate("F").unwrap();
    let before = ctx.telemetry();

    assert_eq!(ctx.evaluate("F"), Ok(2.25));
    let after = ctx.telemetry();
    assert_eq!(after.total_recomputes, before.total_recomputes);
    assert_eq!(after.last_pass_recomputes, 0);
    assert!(after.cache_hits > before.cache_hits);
}

#[test]
fn test_dirty_variable_recomputes_only_its_dependents() {
    let mut ctx = load(INDEPENDENT);
    ctx.set_variable("a", 2.0);
    ctx.set_variable("b", 1.5);
    ctx.evaluate("E").unwrap();

    let e = ctx.lookup_expression("E").unwrap();
    let f = ctx.lookup_expression("F").unwrap();
    let g = ctx.lookup_expression("G").unwrap();
    let f_value = ctx.cached_value(f).unwrap();

    ctx.set_variable("a", 0.0);
    assert_eq!(ctx.evaluate("E"), Ok(6.0));
    assert_eq!(ctx.recompute_count(e), 2);
    assert_eq!(ctx.recompute_count(g), 2);
    assert_eq!(ctx.recompute_count(f), 1);
    assert_eq!(ctx.cached_value(f).unwrap().to_bits(), f_value.to_bits());
    assert_eq!(ctx.evaluate("G"), Ok(-6.0));

    assert_eq!(topology::downstream_expressions(&ctx, "a"), vec!["E", "G"]);
    assert_eq!(topology::downstream_expressions(&ctx, "b"), vec!["F"]);
}

#[test]
fn test_shared_subexpression_updates_consistently_and_computes_once() {
    // S = y * y ; P = S + 1 ; Q = S - 1 ; R = P * Q
    let xml = r#"
        <root>
          <variable value="S"><bin_op type="*"><variable value="y"/><variable value="y"/></bin_op></variable>
          <variable value="P"><bin_op type="+"><variable value="S"/><constant value="1"/></bin_op></variable>
          <variable value="Q"><bin_op type="-"><variable value="S"/><constant value="1"/></bin_op></variable>
          <variable value="R"><bin_op type="*"><variable value="P"/><variable value="Q"/></bin_op></variable>
        </root>"#;
    let mut ctx = load(xml);
    let s = ctx.lookup_expression("S").unwrap();
    let y = ctx.lookup_variable("y").unwrap();

    ctx.set_variable("y", 3.0);
    assert_eq!(ctx.evaluate("R"), Ok(80.0));
    assert_eq!(ctx.recompute_count(s), 1);
    assert_eq!(ctx.recompute_count(y), 1);

    ctx.set_variable("y", 2.0);
    assert_eq!(ctx.evaluate("P"), Ok(5.0));
    assert_eq!(ctx.evaluate("Q"), Ok(3.0));
    assert_eq!(ctx.evaluate("R"), Ok(15.0));
    assert_eq!(ctx.recompute_count(s), 2);
    assert_eq!(ctx.recompute_count(y), 2);
}

#[test]
fn test_unset_variable_fails_every_time() {
    let mut ctx = load(TEST_1);
    for _ in 0..3 {
        assert_eq!(ctx.evaluate("Z"), Err(EvalError::UnsetVariable { name: "y".into() }));
    }
    ctx.set_variable("y", 0.0);
    assert_eq!(ctx.evaluate("Z"), Ok(1.0));
}

#[test]
fn test_unknown_variable_never_raises_nor_touches_caches() {
    let mut ctx = load(TEST_0);
    ctx.set_variable("z", 0.5);
    ctx.evaluate("Y").unwrap();
    let y = ctx.lookup_expression("Y").unwrap();
    let before = ctx.telemetry();

    ctx.set_variable("does_not_exist", 1.0);
    ctx.set_variable("X", 100.0); // an expression, not a variable
    assert_eq!(ctx.cached_value(y), Some(6.5));
    assert_eq!(ctx.evaluate("Y"), Ok(6.5));
    assert_eq!(ctx.evaluate("X"), Ok(3.0));
    assert_eq!(ctx.telemetry().total_recomputes, before.total_recomputes);
}

#[test]
fn test_unknown_expression_is_always_not_found() {
    let mut ctx = load(TEST_0);
    ctx.set_variable("z", 0.5);
    assert!(matches!(ctx.evaluate("W"), Err(EvalError::NotFound { .. })));
    for _ in 0..3 {
        ctx.evaluate("Y").unwrap();
        let err = ctx.evaluate("W").unwrap_err();
        assert_eq!(err, EvalError::NotFound { name: "W".into() });
        assert!(err.to_string().contains("Not found"));
    }
}

#[test]
fn test_binary_operands_fail_left_first() {
    let xml = r#"
        <root>
          <variable value="D"><bin_op type="/"><variable value="a"/><variable value="b"/></bin_op></variable>
        </root>"#;
    let mut ctx = load(xml);
    assert_eq!(ctx.evaluate("D"), Err(EvalError::UnsetVariable { name: "a".into() }));
    ctx.set_variable("a", 1.0);
    assert_eq!(ctx.evaluate("D"), Err(EvalError::UnsetVariable { name: "b".into() }));
    ctx.set_variable("b", 4.0);
    assert_eq!(ctx.evaluate("D"), Ok(0.25));
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(TEST_1.as_bytes()).unwrap();

    let mut ctx = builder::from_path(file.path()).unwrap();
    assert!(ctx.has_expression("X") && ctx.has_expression("Z"));
    assert!(ctx.has_variable("y") && !ctx.has_variable("X"));
    ctx.set_variable("y", 1.0);
    assert!((ctx.evaluate("Z").unwrap() - std::f64::consts::E).abs() < TOLERANCE);
}

#[test]
fn test_scenarios_over_built_graph() {
    let base = load(TEST_0);
    let scenarios: Vec<Scenario> = [0.0, 0.5, 1.0]
        .iter()
        .map(|&z| Scenario::new(format!("z={z}")).set("z", z))
        .collect();

    let outcomes = run_scenarios(&base, &scenarios, &["Y"]);
    let ys: Vec<f64> = outcomes.iter().map(|o| o.values.as_ref().unwrap()["Y"]).collect();
    assert_eq!(ys, vec![6.0, 6.5, 7.0]);
}
