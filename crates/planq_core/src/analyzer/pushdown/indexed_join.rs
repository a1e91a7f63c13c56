//! Converts joins into indexed joins when the secondary side is a scan with
//! an index on a column the join condition compares for equality.

use std::collections::BTreeSet;
use std::sync::Arc;

use planq_error::Result;

use super::AccessChain;
use crate::analyzer::fix_indexes::fix_field_indexes;
use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerRule};
use crate::catalog::index::{IndexLookup, IndexRegistry};
use crate::expr::column_expr::ColumnExpr;
use crate::expr::comparison_expr::ComparisonOperator;
use crate::expr::{Expression, split_conjunction};
use crate::logical::logical_decorated::DecorationKind;
use crate::logical::logical_join::{JoinType, LogicalIndexedJoin, LogicalJoin};
use crate::logical::logical_project::LogicalProject;
use crate::logical::logical_scan::LogicalScan;
use crate::logical::operator::{LogicalNode, LogicalOperator, Node, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::transform_up;

#[derive(Debug, Clone, Copy)]
pub struct PlanIndexedJoins;

impl AnalyzerRule for PlanIndexedJoins {
    fn name(&self) -> &'static str {
        "plan_indexed_joins"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        ctx: &AnalysisContext,
        plan: &PlanRef,
        scope: &Scope,
    ) -> Result<PlanRef> {
        let planned = transform_up(plan, &mut |node| match node.as_ref() {
            LogicalOperator::Join(join) => plan_indexed_join(ctx.indexes, node, join),
            _ => Ok(node.clone()),
        })?;

        if Arc::ptr_eq(&planned, plan) {
            return Ok(plan.clone());
        }
        fix_field_indexes(&planned, &scope.schema())
    }
}

fn plan_indexed_join(
    registry: &dyn IndexRegistry,
    plan: &PlanRef,
    join: &Node<LogicalJoin>,
) -> Result<PlanRef> {
    let [left, right] = join.get_two_children_exact()?;

    // The preserved side of an outer join drives the iteration.
    let (primary, secondary) = match join.node.join_type {
        JoinType::Inner | JoinType::Left => (left, right),
        JoinType::Right => (right, left),
    };

    let Some(mut chain) = AccessChain::from_plan(secondary) else {
        return Ok(plan.clone());
    };
    if !chain.scan.source.capabilities().index_lookup {
        return Ok(plan.clone());
    }

    let secondary_table = chain.scan.table_name().to_ascii_lowercase();
    let primary_sources: BTreeSet<String> = primary
        .output_schema()
        .fields
        .iter()
        .map(|f| f.source.to_ascii_lowercase())
        .collect();
    if primary_sources.contains(&secondary_table) {
        return Ok(plan.clone());
    }

    let mut conjuncts = Vec::new();
    split_conjunction(join.node.condition.clone(), &mut conjuncts);

    let Some(join_lookup) = conjuncts.iter().find_map(|conjunct| {
        join_key_lookup(
            registry,
            &chain.scan,
            conjunct,
            &secondary_table,
            &primary_sources,
        )
    }) else {
        return Ok(plan.clone());
    };

    let lookup = match chain.scan.lookup.clone() {
        Some(existing) => existing
            .intersect(join_lookup.clone())
            .unwrap_or(join_lookup),
        None => join_lookup,
    };
    let Some(scan) = chain.scan.with_lookup(lookup.clone()) else {
        return Ok(plan.clone());
    };
    chain.scan = scan;
    chain.set_decoration(DecorationKind::IndexLookup, &[lookup.to_string()]);

    let indexed = LogicalOperator::IndexedJoin(Node::new(
        LogicalIndexedJoin {
            join_type: join.node.join_type,
            condition: join.node.condition.clone(),
        },
        vec![primary.clone(), chain.into_plan()],
    ))
    .into_ref();

    if join.node.join_type != JoinType::Right {
        return Ok(indexed);
    }

    // Sides were swapped, put columns back in the order the join produced.
    let projections = join
        .output_schema()
        .fields
        .iter()
        .enumerate()
        .map(|(index, field)| {
            Expression::Column(ColumnExpr {
                index,
                table: field.source.clone(),
                column: field.name.clone(),
                datatype: field.datatype,
                nullable: field.nullable,
            })
        })
        .collect();

    Ok(LogicalOperator::Project(Node::new(LogicalProject { projections }, vec![indexed])).into_ref())
}

/// Equality lookup on the secondary table keyed by an expression over the
/// primary side's columns.
fn join_key_lookup(
    registry: &dyn IndexRegistry,
    scan: &LogicalScan,
    conjunct: &Expression,
    secondary_table: &str,
    primary_sources: &BTreeSet<String>,
) -> Option<IndexLookup> {
    let Expression::Comparison(cmp) = conjunct else {
        return None;
    };
    if cmp.op != ComparisonOperator::Eq {
        return None;
    }

    for (column, key) in [(&cmp.left, &cmp.right), (&cmp.right, &cmp.left)] {
        let Expression::Column(col) = column.as_ref() else {
            continue;
        };
        if !col.table.eq_ignore_ascii_case(secondary_table) || key.has_trigger_columns() {
            continue;
        }
        let key_tables = key.referenced_tables();
        if key_tables.is_empty() || !key_tables.is_subset(primary_sources) {
            continue;
        }

        let index = registry
            .indexes_for_columns(&scan.database, scan.table_name(), &[&col.column])
            .into_iter()
            .next();
        if let Some(index) = index {
            return IndexLookup::equals(index, vec![(**key).clone()]).ok();
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::catalog::index::IndexCapabilities;
    use crate::expr::{self, col};
    use crate::testutil::{TestEnv, decorations};

    fn join(join_type: JoinType, left: PlanRef, right: PlanRef, condition: Expression) -> PlanRef {
        LogicalOperator::Join(Node::new(
            LogicalJoin {
                join_type,
                condition,
            },
            vec![left, right],
        ))
        .into_ref()
    }

    fn lookup_key(plan: &PlanRef) -> Option<(String, usize)> {
        let chain = AccessChain::from_plan(plan)?;
        let mut key = None;
        chain
            .scan
            .lookup
            .as_ref()?
            .for_each_key(&mut |expr| {
                let col = expr.try_as_column()?;
                key = Some((col.to_string(), col.index));
                Ok(())
            })
            .ok()?;
        key
    }

    #[test]
    fn inner_join_becomes_indexed() {
        let env = TestEnv::with_sample_tables();
        env.add_index("idx_i2", "mytable2", &["i2"], IndexCapabilities::ALL);

        let plan = join(
            JoinType::Inner,
            env.sample_scan("mytable"),
            env.sample_scan("mytable2"),
            expr::eq(
                col(0, "mytable", "i", DataType::Int32),
                col(3, "mytable2", "i2", DataType::Int32),
            ),
        );

        let out = env.apply_rule(&PlanIndexedJoins, &plan).unwrap();
        let LogicalOperator::IndexedJoin(indexed) = out.as_ref() else {
            panic!("expected indexed join");
        };
        assert_eq!(JoinType::Inner, indexed.node.join_type);
        assert_eq!(
            Some(("mytable.i".to_string(), 0)),
            lookup_key(&indexed.children[1])
        );
        assert_eq!(
            vec!["Indexed table access on [idx_i2[i2 = mytable.i]]".to_string()],
            decorations(&out)
        );

        let again = env.apply_rule(&PlanIndexedJoins, &out).unwrap();
        assert!(Arc::ptr_eq(&out, &again));
    }

    #[test]
    fn right_join_swaps_sides() {
        let env = TestEnv::with_sample_tables();
        env.add_index("idx_i", "mytable", &["i"], IndexCapabilities::ALL);

        let plan = join(
            JoinType::Right,
            env.sample_scan("mytable"),
            env.sample_scan("mytable2"),
            expr::eq(
                col(0, "mytable", "i", DataType::Int32),
                col(3, "mytable2", "i2", DataType::Int32),
            ),
        );
        let original_schema = plan.output_schema();

        let out = env.apply_rule(&PlanIndexedJoins, &plan).unwrap();
        let LogicalOperator::Project(project) = out.as_ref() else {
            panic!("expected project");
        };
        let LogicalOperator::IndexedJoin(indexed) = project.children[0].as_ref() else {
            panic!("expected indexed join");
        };
        assert_eq!(JoinType::Right, indexed.node.join_type);
        assert_eq!(
            Some(("mytable2.i2".to_string(), 0)),
            lookup_key(&indexed.children[1])
        );

        // Project restores mytable columns first, reading them from after
        // the primary side's three columns.
        assert_eq!(original_schema, out.output_schema());
        assert_eq!(
            vec![3, 4, 5, 0, 1, 2],
            project
                .node
                .projections
                .iter()
                .map(|p| p.try_as_column().unwrap().index)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn unindexed_join_unchanged() {
        let env = TestEnv::with_sample_tables();
        let plan = join(
            JoinType::Left,
            env.sample_scan("mytable"),
            env.sample_scan("mytable2"),
            expr::eq(
                col(0, "mytable", "i", DataType::Int32),
                col(3, "mytable2", "i2", DataType::Int32),
            ),
        );

        let out = env.apply_rule(&PlanIndexedJoins, &plan).unwrap();
        assert!(Arc::ptr_eq(&plan, &out));
    }
}
