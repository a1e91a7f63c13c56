use planq_error::{DbError, ErrorKind, Result};
use tracing::debug;

use super::order::order_triggers;
use super::resolve_old_new::resolve_trigger_body;
use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerRule};
use crate::logical::logical_join::LogicalCrossJoin;
use crate::logical::logical_scan::LogicalScan;
use crate::logical::logical_table::LogicalTableAlias;
use crate::logical::logical_trigger::{
    LogicalCreateTrigger,
    LogicalTriggerExecutor,
    TriggerEvent,
    TriggerTime,
};
use crate::logical::operator::{LogicalOperator, Node, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::{inspect, transform_up};

/// Wraps insert, update and delete nodes with the stored triggers that fire
/// on them.
#[derive(Debug, Clone, Copy)]
pub struct ApplyTriggers;

impl AnalyzerRule for ApplyTriggers {
    fn name(&self) -> &'static str {
        "apply_triggers"
    }

    fn apply(
        &self,
        analyzer: &Analyzer,
        ctx: &AnalysisContext,
        plan: &PlanRef,
        scope: &Scope,
    ) -> Result<PlanRef> {
        if matches!(plan.as_ref(), LogicalOperator::CreateTrigger(_)) {
            return Ok(plan.clone());
        }

        let mutations = collect_mutations(plan);
        if mutations.is_empty() {
            return Ok(plan.clone());
        }

        let triggers = matching_triggers(ctx, &mutations)?;
        if triggers.is_empty() {
            return Ok(plan.clone());
        }

        let triggers = order_triggers(triggers)?;
        debug!(
            triggers = ?triggers.iter().map(|t| t.node.name.as_str()).collect::<Vec<_>>(),
            "applying triggers"
        );

        // Before triggers wrap inner to outer in order. After triggers are
        // applied in reverse so the first ordered trigger ends up innermost
        // and runs first.
        let (before, after): (Vec<_>, Vec<_>) = triggers
            .into_iter()
            .partition(|t| t.node.time == TriggerTime::Before);
        let application = before.into_iter().chain(after.into_iter().rev());

        let mut current = plan.clone();
        for trigger in application {
            let Some(invoking) = find_invoking_node(plan, &trigger.node) else {
                continue;
            };
            validate_no_circular_updates(&trigger, &invoking, scope)?;

            let logic = compile_trigger_logic(analyzer, ctx, &invoking, &trigger, scope)?;
            current = wrap_mutations(&current, &trigger.node, &logic)?;
        }

        Ok(current)
    }
}

/// Tables (lowercased) and events mutated by the plan, excluding anything
/// inside trigger bodies or compiled trigger logic.
fn collect_mutations(plan: &PlanRef) -> Vec<(String, TriggerEvent)> {
    fn inner(plan: &PlanRef, out: &mut Vec<(String, TriggerEvent)>) {
        if let (Some(table), Some(event)) = (plan.mutation_table_name(), plan.mutation_event()) {
            let entry = (table.to_ascii_lowercase(), event);
            if !out.contains(&entry) {
                out.push(entry);
            }
        }
        for (idx, child) in plan.children().iter().enumerate() {
            if !plan.is_opaque_child(idx) {
                inner(child, out);
            }
        }
    }

    let mut out = Vec::new();
    inner(plan, &mut out);
    out
}

/// Parse the current database's stored triggers, keeping the ones that fire
/// for one of the mutated tables.
fn matching_triggers(
    ctx: &AnalysisContext,
    mutations: &[(String, TriggerEvent)],
) -> Result<Vec<Node<LogicalCreateTrigger>>> {
    let database = ctx.catalog.database(ctx.current_database)?;

    let mut matching = Vec::new();
    for definition in database.triggers()? {
        let parsed = ctx.parser.parse(&definition.create_statement)?;
        let LogicalOperator::CreateTrigger(trigger) = parsed.as_ref() else {
            return Err(DbError::from(ErrorKind::TriggerCreateStatementInvalid {
                statement: definition.create_statement.clone(),
            }));
        };

        let fires = mutations.iter().any(|(table, event)| {
            trigger.node.table.eq_ignore_ascii_case(table) && trigger.node.event == *event
        });
        if !fires {
            continue;
        }

        // Only checks NEW/OLD usage. The body is resolved against the
        // mutated row when the trigger logic is compiled.
        resolve_trigger_body(trigger)?;
        matching.push(trigger.clone());
    }

    Ok(matching)
}

fn fires_on(trigger: &LogicalCreateTrigger, node: &LogicalOperator) -> bool {
    node.mutation_event() == Some(trigger.event)
        && node
            .mutation_table_name()
            .is_some_and(|t| t.eq_ignore_ascii_case(&trigger.table))
}

/// First node in the original plan the trigger fires on.
fn find_invoking_node(plan: &PlanRef, trigger: &LogicalCreateTrigger) -> Option<PlanRef> {
    if fires_on(trigger, plan) {
        return Some(plan.clone());
    }
    plan.children()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !plan.is_opaque_child(*idx))
        .find_map(|(_, child)| find_invoking_node(child, trigger))
}

/// Errors if the trigger body writes to the table of the statement that
/// invoked it, or to any table written by an enclosing statement.
fn validate_no_circular_updates(
    trigger: &Node<LogicalCreateTrigger>,
    invoking: &PlanRef,
    scope: &Scope,
) -> Result<()> {
    let mut in_use: Vec<String> = invoking
        .mutation_table_name()
        .map(|t| vec![t.to_ascii_lowercase()])
        .unwrap_or_default();
    for memo in scope.memo_nodes() {
        if let Some(table) = memo.mutation_table_name() {
            in_use.push(table.to_ascii_lowercase());
        }
    }

    let body = trigger.get_one_child_exact()?;
    let mut conflict = None;
    inspect(body, &mut |node| {
        if conflict.is_some() {
            return false;
        }
        if let Some(table) = node.mutation_table_name() {
            if in_use.contains(&table.to_ascii_lowercase()) {
                conflict = Some(table.to_string());
                return false;
            }
        }
        true
    });

    match conflict {
        Some(table) => Err(DbError::from(ErrorKind::TriggerTableInUse { table })),
        None => Ok(()),
    }
}

/// Analyze the trigger body with the NEW/OLD rows in scope.
///
/// The scope row is laid out as the mutation's row: `new` for inserts,
/// `old ++ new` for updates, and `old` for deletes.
fn compile_trigger_logic(
    analyzer: &Analyzer,
    ctx: &AnalysisContext,
    invoking: &PlanRef,
    trigger: &Node<LogicalCreateTrigger>,
    scope: &Scope,
) -> Result<PlanRef> {
    let table = match invoking.mutation_target().map(|t| t.as_ref()) {
        Some(LogicalOperator::Scan(scan)) => {
            LogicalScan::new(scan.node.database.clone(), scan.node.source.clone())
        }
        _ => {
            return Err(DbError::new("Trigger target table is not resolved")
                .with_field("trigger", &trigger.node.name));
        }
    };
    let table = LogicalOperator::Scan(Node::new(table, Vec::new())).into_ref();

    let alias = |name: &str| {
        LogicalOperator::TableAlias(Node::new(
            LogicalTableAlias {
                alias: name.to_string(),
            },
            vec![table.clone()],
        ))
        .into_ref()
    };

    let row_node = match trigger.node.event {
        TriggerEvent::Insert => alias("new"),
        TriggerEvent::Update => LogicalOperator::CrossJoin(Node::new(
            LogicalCrossJoin,
            vec![alias("old"), alias("new")],
        ))
        .into_ref(),
        TriggerEvent::Delete => alias("old"),
    };

    let logic_scope = Scope::new()
        .new_scope(row_node)
        .with_memos(scope.with_memo(invoking.clone()).memo_nodes().cloned());

    let body = trigger.get_one_child_exact()?;
    analyzer.analyze(ctx, body, &logic_scope)
}

/// Wrap every node the trigger fires on with a trigger executor.
///
/// Before triggers wrap the rows flowing into the mutation, after triggers
/// wrap the mutation itself. Compiled logic of existing executors is never
/// visited.
fn wrap_mutations(
    plan: &PlanRef,
    trigger: &LogicalCreateTrigger,
    logic: &PlanRef,
) -> Result<PlanRef> {
    let executor = |wrapped: PlanRef| {
        LogicalOperator::TriggerExecutor(Node::new(
            LogicalTriggerExecutor {
                trigger_name: trigger.name.clone(),
                event: trigger.event,
                time: trigger.time,
            },
            vec![wrapped, logic.clone()],
        ))
        .into_ref()
    };

    transform_up(plan, &mut |node| {
        if !fires_on(trigger, node) {
            return Ok(node.clone());
        }

        match (trigger.time, node.as_ref()) {
            (TriggerTime::Before, LogicalOperator::Insert(insert)) => {
                let [dest, source] = insert.get_two_children_exact()?;
                node.with_new_children(vec![dest.clone(), executor(source.clone())])
            }
            (TriggerTime::Before, LogicalOperator::Update(update)) => {
                let rows = update.get_one_child_exact()?;
                node.with_new_children(vec![executor(rows.clone())])
            }
            (TriggerTime::Before, LogicalOperator::Delete(delete)) => {
                let rows = delete.get_one_child_exact()?;
                node.with_new_children(vec![executor(rows.clone())])
            }
            (TriggerTime::After, _) => Ok(executor(node.clone())),
            _ => Ok(node.clone()),
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::expr::{self, unresolved};
    use crate::logical::logical_set::LogicalSet;
    use crate::logical::logical_trigger::{TriggerOrder, TriggerOrderKind};
    use crate::testutil::{TestEnv, create_trigger, delete_from, insert_values, update_set};

    fn log_insert() -> PlanRef {
        insert_values("mytable2", vec![vec![
            unresolved(Some("new"), "i"),
            unresolved(Some("new"), "f"),
            unresolved(Some("new"), "t"),
        ]])
    }

    fn stored(env: &TestEnv, name: &str, time: TriggerTime, order: Option<TriggerOrder>) {
        env.add_trigger(create_trigger(
            name,
            "mytable",
            TriggerEvent::Insert,
            time,
            order,
            log_insert(),
        ));
    }

    /// Trigger names of executors from the outside in, following the wrapped
    /// child, and the innermost wrapped node.
    fn executor_chain(plan: &PlanRef) -> (Vec<String>, PlanRef) {
        let mut names = Vec::new();
        let mut current = plan.clone();
        while let LogicalOperator::TriggerExecutor(exec) = current.clone().as_ref() {
            names.push(exec.node.trigger_name.clone());
            current = exec.children[0].clone();
        }
        (names, current)
    }

    #[test]
    fn no_triggers_unchanged() {
        let env = TestEnv::with_sample_tables();
        let plan = env
            .analyze(&insert_values("mytable", vec![vec![
                expr::lit(1_i64),
                expr::lit(1.5_f64),
                expr::lit("a"),
            ]]))
            .unwrap();

        let out = env.apply_rule(&ApplyTriggers, &plan).unwrap();
        assert!(Arc::ptr_eq(&plan, &out));
    }

    #[test]
    fn after_triggers_run_in_order() {
        let env = TestEnv::with_sample_tables();
        stored(&env, "x", TriggerTime::After, None);
        stored(&env, "y", TriggerTime::After, None);

        let plan = env
            .analyze(&insert_values("mytable", vec![vec![
                expr::lit(1_i64),
                expr::lit(1.5_f64),
                expr::lit("a"),
            ]]))
            .unwrap();

        // Outermost runs last.
        let (names, inner) = executor_chain(&plan);
        assert_eq!(vec!["y", "x"], names);
        assert_eq!(Some("mytable"), inner.mutation_table_name());
    }

    #[test]
    fn before_triggers_wrap_source() {
        let env = TestEnv::with_sample_tables();
        stored(&env, "a", TriggerTime::Before, None);
        stored(
            &env,
            "b",
            TriggerTime::Before,
            Some(TriggerOrder {
                kind: TriggerOrderKind::Precedes,
                other_trigger: "a".to_string(),
            }),
        );

        let plan = env
            .analyze(&insert_values("mytable", vec![vec![
                expr::lit(1_i64),
                expr::lit(1.5_f64),
                expr::lit("a"),
            ]]))
            .unwrap();

        let LogicalOperator::Insert(insert) = plan.as_ref() else {
            panic!("expected insert");
        };
        // b precedes a, so b is innermost.
        let (names, inner) = executor_chain(&insert.children[1]);
        assert_eq!(vec!["a", "b"], names);
        assert!(matches!(inner.as_ref(), LogicalOperator::Values(_)));
    }

    #[test]
    fn circular_update() {
        let env = TestEnv::with_sample_tables();
        env.add_trigger(create_trigger(
            "trig",
            "mytable",
            TriggerEvent::Delete,
            TriggerTime::After,
            None,
            delete_from("mytable"),
        ));

        let err = env.analyze(&delete_from("mytable")).unwrap_err();
        assert_eq!(
            &ErrorKind::TriggerTableInUse {
                table: "mytable".to_string()
            },
            err.kind()
        );
    }

    #[test]
    fn invalid_stored_statement() {
        let env = TestEnv::with_sample_tables();
        env.add_raw_trigger("bad", "select 1");

        let err = env.analyze(&delete_from("mytable")).unwrap_err();
        assert_eq!(
            &ErrorKind::TriggerCreateStatementInvalid {
                statement: "select 1".to_string()
            },
            err.kind()
        );
    }

    #[test]
    fn before_update_logic_sees_old_and_new() {
        let env = TestEnv::with_sample_tables();
        env.add_trigger(create_trigger(
            "trig",
            "mytable",
            TriggerEvent::Update,
            TriggerTime::Before,
            None,
            LogicalOperator::Set(Node::new(
                LogicalSet {
                    assignments: vec![expr::set_field(
                        unresolved(Some("new"), "t"),
                        unresolved(Some("old"), "t"),
                    )],
                },
                Vec::new(),
            ))
            .into_ref(),
        ));

        let plan = env
            .analyze(&update_set(
                "mytable",
                vec![("t", expr::lit("changed"))],
            ))
            .unwrap();

        let LogicalOperator::Update(update) = plan.as_ref() else {
            panic!("expected update");
        };
        let LogicalOperator::TriggerExecutor(exec) = update.children[0].as_ref() else {
            panic!("expected executor under update");
        };
        let LogicalOperator::Set(set) = exec.children[1].as_ref() else {
            panic!("expected set logic");
        };
        // old.t is column 2, new.t is column 5 of the scope row.
        let expr::Expression::SetField(assign) = &set.node.assignments[0] else {
            panic!("expected set field");
        };
        assert_eq!(5, assign.left.try_as_column().unwrap().index);
        assert_eq!(2, assign.right.try_as_column().unwrap().index);
    }
}
