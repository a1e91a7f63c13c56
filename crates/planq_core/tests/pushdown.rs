use planq_core::analyzer::Analyzer;
use planq_core::arrays::scalar::ScalarValue;
use planq_core::catalog::index::IndexCapabilities;
use planq_core::config::analyzer::AnalyzerConfig;
use planq_core::execution::planner::ExecutionPlanner;
use planq_core::execution::{ExecutionContext, collect_rows};
use planq_core::explain::node::ExplainNode;
use planq_core::expr::{self, unresolved};
use planq_core::logical::logical_filter::LogicalFilter;
use planq_core::logical::logical_join::LogicalCrossJoin;
use planq_core::logical::logical_project::LogicalProject;
use planq_core::logical::operator::{LogicalOperator, Node, PlanRef};
use planq_core::logical::scope::Scope;
use planq_core::testutil::{TestEnv, scan_filters, unresolved_table};

/// `SELECT t, i2 FROM mytable, mytable2 WHERE i > 1 AND t2 = 'y'`
fn query() -> PlanRef {
    let filter = expr::and([
        expr::gt(unresolved(None, "i"), expr::lit(1_i64)),
        expr::eq(unresolved(None, "t2"), expr::lit("y")),
    ])
    .unwrap();

    let join = LogicalOperator::CrossJoin(Node::new(
        LogicalCrossJoin,
        vec![unresolved_table("mytable"), unresolved_table("mytable2")],
    ))
    .into_ref();
    let filtered =
        LogicalOperator::Filter(Node::new(LogicalFilter { filter }, vec![join])).into_ref();

    LogicalOperator::Project(Node::new(
        LogicalProject {
            projections: vec![unresolved(None, "t"), unresolved(None, "i2")],
        },
        vec![filtered],
    ))
    .into_ref()
}

fn execute(plan: &PlanRef) -> Vec<Vec<ScalarValue>> {
    let source = ExecutionPlanner::new().plan(plan).unwrap();
    collect_rows(source.as_ref(), &ExecutionContext::new()).unwrap()
}

fn analyze_with(env: &TestEnv, config: AnalyzerConfig) -> PlanRef {
    Analyzer::new(config)
        .analyze(&env.context(), &query(), &Scope::new())
        .unwrap()
}

#[test]
fn pushdown_keeps_results() {
    logutil::init_test();
    let env = TestEnv::with_sample_tables();
    env.add_index("idx_i", "mytable", &["i"], IndexCapabilities::ALL);

    let mut disabled = AnalyzerConfig::default();
    disabled.enable_pushdown = false;
    let plain = analyze_with(&env, disabled);
    let pushed = analyze_with(&env, AnalyzerConfig::default());

    assert!(scan_filters(&plain).is_empty());
    assert_eq!(2, scan_filters(&pushed).len());

    let expected: Vec<Vec<ScalarValue>> =
        vec![vec!["b".into(), 3_i32.into()], vec!["c".into(), 3_i32.into()]];
    assert_eq!(expected, execute(&plain));
    assert_eq!(expected, execute(&pushed));
}

#[test]
fn reanalysis_is_stable() {
    logutil::init_test();
    let env = TestEnv::with_sample_tables();
    env.add_index("idx_i", "mytable", &["i"], IndexCapabilities::ALL);

    let analyzer = Analyzer::default();
    let once = analyzer
        .analyze(&env.context(), &query(), &Scope::new())
        .unwrap();
    let twice = analyzer
        .analyze(&env.context(), &once, &Scope::new())
        .unwrap();

    assert_eq!(once, twice);
}

#[test]
fn explain_shows_pushed_filters() {
    let env = TestEnv::with_sample_tables();
    let plan = analyze_with(&env, AnalyzerConfig::default());

    let explain = ExplainNode::new_from_logical_plan(false, &plan).to_string();
    assert!(explain.starts_with("Project"), "{explain}");
    assert!(explain.contains("filters = "), "{explain}");
    assert!(
        explain.lines().all(|line| !line.trim_start().starts_with("Filter (")),
        "{explain}"
    );
}
