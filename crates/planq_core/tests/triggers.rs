use planq_core::analyzer::Analyzer;
use planq_core::arrays::scalar::ScalarValue;
use planq_core::config::analyzer::AnalyzerConfig;
use planq_core::execution::planner::ExecutionPlanner;
use planq_core::execution::{ExecutionContext, collect_rows};
use planq_core::expr::{self, Expression, unresolved};
use planq_core::logical::logical_delete::LogicalDelete;
use planq_core::logical::logical_filter::LogicalFilter;
use planq_core::logical::logical_set::LogicalSet;
use planq_core::logical::logical_trigger::{
    TriggerEvent,
    TriggerOrder,
    TriggerOrderKind,
    TriggerTime,
};
use planq_core::logical::operator::{LogicalOperator, Node, PlanRef};
use planq_core::logical::scope::Scope;
use planq_core::testutil::{
    TestEnv,
    create_trigger,
    delete_from,
    insert_values,
    unresolved_table,
    update_set,
};
use planq_error::ErrorKind;

fn run(env: &TestEnv, plan: &PlanRef) -> Vec<Vec<ScalarValue>> {
    let plan = env.analyze(plan).unwrap();
    let source = ExecutionPlanner::new().plan(&plan).unwrap();
    collect_rows(source.as_ref(), &ExecutionContext::new()).unwrap()
}

fn set(assignments: Vec<Expression>) -> PlanRef {
    LogicalOperator::Set(Node::new(LogicalSet { assignments }, Vec::new())).into_ref()
}

fn new_row() -> Vec<Vec<Expression>> {
    vec![vec![expr::lit(4_i32), expr::lit(4.5_f64), expr::lit("d")]]
}

/// Trigger inserting `(NEW.i, 0.0, tag)` into mytable2.
fn logging_trigger(name: &str, order: Option<TriggerOrder>) -> PlanRef {
    create_trigger(
        name,
        "mytable",
        TriggerEvent::Insert,
        TriggerTime::After,
        order,
        insert_values(
            "mytable2",
            vec![vec![
                unresolved(Some("new"), "i"),
                expr::lit(0.0_f64),
                expr::lit(name),
            ]],
        ),
    )
}

fn tags(env: &TestEnv) -> Vec<ScalarValue> {
    env.table("mytable2")
        .rows()
        .into_iter()
        .skip(2)
        .map(|row| row[2].clone())
        .collect()
}

#[test]
fn before_insert_rewrites_row() {
    logutil::init_test();
    let env = TestEnv::with_sample_tables();
    env.add_trigger(create_trigger(
        "fix_t",
        "mytable",
        TriggerEvent::Insert,
        TriggerTime::Before,
        None,
        set(vec![expr::set_field(
            unresolved(Some("new"), "t"),
            expr::lit("changed"),
        )]),
    ));

    let inserted = run(&env, &insert_values("mytable", new_row()));
    let expected: Vec<ScalarValue> = vec![4_i32.into(), 4.5_f64.into(), "changed".into()];
    assert_eq!(vec![expected.clone()], inserted);
    assert_eq!(Some(&expected), env.table("mytable").rows().last());
}

#[test]
fn after_triggers_fire_in_resolved_order() {
    logutil::init_test();
    let env = TestEnv::with_sample_tables();
    env.add_trigger(logging_trigger("x", None));
    env.add_trigger(logging_trigger(
        "y",
        Some(TriggerOrder {
            kind: TriggerOrderKind::Precedes,
            other_trigger: "x".to_string(),
        }),
    ));
    env.add_trigger(logging_trigger(
        "z",
        Some(TriggerOrder {
            kind: TriggerOrderKind::Follows,
            other_trigger: "y".to_string(),
        }),
    ));

    run(&env, &insert_values("mytable", new_row()));
    assert_eq!(
        vec![
            ScalarValue::from("y"),
            ScalarValue::from("z"),
            ScalarValue::from("x")
        ],
        tags(&env)
    );
}

#[test]
fn before_update_keeps_old_value() {
    logutil::init_test();
    let env = TestEnv::with_sample_tables();
    env.add_trigger(create_trigger(
        "keep_f",
        "mytable",
        TriggerEvent::Update,
        TriggerTime::Before,
        None,
        set(vec![expr::set_field(
            unresolved(Some("new"), "f"),
            unresolved(Some("old"), "f"),
        )]),
    ));

    let updated = run(
        &env,
        &update_set(
            "mytable",
            vec![("f", expr::lit(9.9_f64)), ("t", expr::lit("z"))],
        ),
    );
    assert_eq!(3, updated.len());

    let rows = env.table("mytable").rows();
    let first: Vec<ScalarValue> = vec![1_i32.into(), 1.5_f64.into(), "z".into()];
    assert_eq!(first, rows[0]);
    assert_eq!(ScalarValue::Float64(3.5), rows[2][1]);
}

#[test]
fn after_delete_sees_old_row() {
    logutil::init_test();
    let env = TestEnv::with_sample_tables();
    env.add_trigger(create_trigger(
        "archive",
        "mytable",
        TriggerEvent::Delete,
        TriggerTime::After,
        None,
        insert_values(
            "mytable2",
            vec![vec![
                unresolved(Some("old"), "i"),
                unresolved(Some("old"), "f"),
                unresolved(Some("old"), "t"),
            ]],
        ),
    ));

    let delete = LogicalOperator::Delete(Node::new(
        LogicalDelete,
        vec![
            LogicalOperator::Filter(Node::new(
                LogicalFilter {
                    filter: expr::eq(unresolved(None, "i"), expr::lit(2_i64)),
                },
                vec![unresolved_table("mytable")],
            ))
            .into_ref(),
        ],
    ))
    .into_ref();

    let deleted = run(&env, &delete);
    assert_eq!(1, deleted.len());
    assert_eq!(2, env.table("mytable").rows().len());
    let archived: Vec<ScalarValue> = vec![2_i32.into(), 2.5_f64.into(), "b".into()];
    assert_eq!(Some(&archived), env.table("mytable2").rows().last());
}

#[test]
fn delete_trigger_cannot_reference_new() {
    let env = TestEnv::with_sample_tables();
    env.add_trigger(create_trigger(
        "bad",
        "mytable",
        TriggerEvent::Delete,
        TriggerTime::Before,
        None,
        insert_values("mytable2", vec![vec![unresolved(Some("new"), "i")]]),
    ));

    let err = env.analyze(&delete_from("mytable")).unwrap_err();
    assert_eq!(
        &ErrorKind::InvalidUseOfOldNew {
            pseudo_table: "new".to_string(),
            event: "delete".to_string(),
        },
        err.kind()
    );
}

#[test]
fn after_update_cannot_assign_new() {
    let env = TestEnv::with_sample_tables();
    let trigger = create_trigger(
        "late",
        "mytable",
        TriggerEvent::Update,
        TriggerTime::After,
        None,
        set(vec![expr::set_field(
            unresolved(Some("new"), "t"),
            expr::lit("late"),
        )]),
    );

    let err = env.analyze(&trigger).unwrap_err();
    assert_eq!(&ErrorKind::InvalidUpdateInAfterTrigger, err.kind());
}

#[test]
fn order_reference_missing() {
    let env = TestEnv::with_sample_tables();
    env.add_trigger(logging_trigger(
        "x",
        Some(TriggerOrder {
            kind: TriggerOrderKind::Follows,
            other_trigger: "missing".to_string(),
        }),
    ));

    let err = env
        .analyze(&insert_values("mytable", new_row()))
        .unwrap_err();
    assert!(matches!(
        err.kind(),
        ErrorKind::TriggerOrderReferenceNotFound { reference, .. } if reference == "missing"
    ));
}

#[test]
fn triggers_disabled() {
    let env = TestEnv::with_sample_tables();
    env.add_trigger(logging_trigger("x", None));

    let mut config = AnalyzerConfig::default();
    config.apply_triggers = false;
    let analyzer = Analyzer::new(config);

    let plan = analyzer
        .analyze(
            &env.context(),
            &insert_values("mytable", new_row()),
            &Scope::new(),
        )
        .unwrap();
    assert!(matches!(plan.as_ref(), LogicalOperator::Insert(_)));
}
