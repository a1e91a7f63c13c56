//! Projection pushdown.
//!
//! Narrows every scan to the columns something in the plan reads, then
//! renumbers column references to the narrowed layouts in one pass.

use std::collections::HashSet;
use std::sync::Arc;

use planq_error::Result;

use super::AccessChain;
use crate::analyzer::fix_indexes::fix_field_indexes;
use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerRule};
use crate::logical::logical_decorated::DecorationKind;
use crate::logical::operator::{LogicalNode, LogicalOperator, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::inspect;

#[derive(Debug, Clone, Copy)]
pub struct PushdownProjections;

impl AnalyzerRule for PushdownProjections {
    fn name(&self) -> &'static str {
        "pushdown_projections"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        _ctx: &AnalysisContext,
        plan: &PlanRef,
        scope: &Scope,
    ) -> Result<PlanRef> {
        // Mutations and triggers consume full table rows.
        if writes_rows(plan) {
            return Ok(plan.clone());
        }

        let mut required = Required::new();
        for field in &plan.output_schema().fields {
            required.insert((field.source.to_ascii_lowercase(), field.name.to_ascii_lowercase()));
        }
        collect_required(plan, &mut required)?;

        let pruned = prune(plan, &required, None)?;
        if Arc::ptr_eq(&pruned, plan) {
            return Ok(plan.clone());
        }
        fix_field_indexes(&pruned, &scope.schema())
    }
}

/// Lowercased `(table, column)` pairs read somewhere in the plan.
type Required = HashSet<(String, String)>;

fn writes_rows(plan: &PlanRef) -> bool {
    let mut found = false;
    inspect(plan, &mut |node| {
        found |= matches!(
            node.as_ref(),
            LogicalOperator::Insert(_)
                | LogicalOperator::Update(_)
                | LogicalOperator::UpdateSource(_)
                | LogicalOperator::Delete(_)
                | LogicalOperator::Set(_)
                | LogicalOperator::Block(_)
                | LogicalOperator::CreateTrigger(_)
                | LogicalOperator::TriggerExecutor(_)
        );
        !found
    });
    found
}

fn collect_required(plan: &PlanRef, required: &mut Required) -> Result<()> {
    let mut insert = |expr: &crate::expr::Expression| {
        for col in expr.column_refs() {
            required.insert((col.table.to_ascii_lowercase(), col.column.to_ascii_lowercase()));
        }
        Ok(())
    };

    plan.for_each_expr(&mut insert)?;
    if let LogicalOperator::Scan(scan) = plan.as_ref() {
        if let Some(lookup) = &scan.node.lookup {
            lookup.for_each_key(&mut insert)?;
        }
    }

    for child in plan.children() {
        collect_required(child, required)?;
    }
    Ok(())
}

fn prune(plan: &PlanRef, required: &Required, alias: Option<&str>) -> Result<PlanRef> {
    match plan.as_ref() {
        LogicalOperator::Scan(_) | LogicalOperator::Decorated(_) => {
            prune_access(plan, required, alias)
        }
        LogicalOperator::TableAlias(n) => {
            let child = n.get_one_child_exact()?;
            let alias = AccessChain::from_plan(child).map(|_| n.node.alias.as_str());
            let new_child = prune(child, required, alias)?;
            if Arc::ptr_eq(&new_child, child) {
                return Ok(plan.clone());
            }
            plan.with_new_children(vec![new_child])
        }
        _ => {
            let mut changed = false;
            let children = plan
                .children()
                .iter()
                .map(|child| {
                    let new_child = prune(child, required, None)?;
                    changed |= !Arc::ptr_eq(&new_child, child);
                    Ok(new_child)
                })
                .collect::<Result<Vec<_>>>()?;

            if changed {
                plan.with_new_children(children)
            } else {
                Ok(plan.clone())
            }
        }
    }
}

fn prune_access(plan: &PlanRef, required: &Required, alias: Option<&str>) -> Result<PlanRef> {
    let Some(mut chain) = AccessChain::from_plan(plan) else {
        return Ok(plan.clone());
    };

    let visible = alias
        .unwrap_or(chain.scan.table_name())
        .to_ascii_lowercase();
    // Columns read by the index lookup can't be dropped.
    let lookup_columns = chain
        .scan
        .lookup
        .as_ref()
        .map(|lookup| lookup.columns())
        .unwrap_or_default();

    let columns: Vec<usize> = chain
        .scan
        .full_schema()
        .fields
        .iter()
        .enumerate()
        .filter(|(_, field)| {
            let name = field.name.to_ascii_lowercase();
            lookup_columns.contains(&name) || required.contains(&(visible.clone(), name))
        })
        .map(|(idx, _)| idx)
        .collect();

    let Some(scan) = chain.scan.with_projection(columns) else {
        return Ok(plan.clone());
    };
    if scan.projection == chain.scan.projection {
        return Ok(plan.clone());
    }

    let names: Vec<_> = scan
        .output_schema()
        .fields
        .iter()
        .map(|f| f.name.clone())
        .collect();
    chain.scan = scan;
    chain.set_decoration(DecorationKind::Projection, &names);

    Ok(chain.into_plan())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::catalog::TableCapabilities;
    use crate::arrays::field::Field;
    use crate::expr::{self, Expression, col};
    use crate::logical::logical_filter::LogicalFilter;
    use crate::logical::logical_join::LogicalCrossJoin;
    use crate::logical::logical_project::LogicalProject;
    use crate::logical::operator::Node;
    use crate::testutil::{TestEnv, decorations};

    fn project(projections: Vec<Expression>, child: PlanRef) -> PlanRef {
        LogicalOperator::Project(Node::new(LogicalProject { projections }, vec![child])).into_ref()
    }

    fn column_indexes(plan: &PlanRef) -> Vec<usize> {
        let mut out = Vec::new();
        inspect(plan, &mut |node| {
            node.for_each_expr(|expr| {
                out.extend(expr.column_refs().into_iter().map(|c| c.index));
                Ok(())
            })
            .unwrap();
            true
        });
        out
    }

    #[test]
    fn pushdown_projections_to_tables() {
        let env = TestEnv::with_sample_tables();
        let plan = project(
            vec![col(5, "mytable2", "t2", DataType::Utf8)],
            LogicalOperator::Filter(Node::new(
                LogicalFilter {
                    filter: expr::or([
                        expr::eq(col(1, "mytable", "f", DataType::Float64), expr::lit(2.5)),
                        expr::is_null(col(3, "mytable2", "i2", DataType::Int32)),
                    ])
                    .unwrap(),
                },
                vec![
                    LogicalOperator::CrossJoin(Node::new(
                        LogicalCrossJoin,
                        vec![env.sample_scan("mytable"), env.sample_scan("mytable2")],
                    ))
                    .into_ref(),
                ],
            ))
            .into_ref(),
        );

        let out = env.apply_rule(&PushdownProjections, &plan).unwrap();
        assert_eq!(
            vec![
                "Projected table access on [f]".to_string(),
                "Projected table access on [i2, t2]".to_string(),
            ],
            decorations(&out)
        );
        // Project reads t2, filter reads f and i2.
        assert_eq!(vec![2, 0, 1], column_indexes(&out));
        assert_eq!(plan.output_schema(), out.output_schema());

        let again = env.apply_rule(&PushdownProjections, &out).unwrap();
        assert!(Arc::ptr_eq(&out, &again));
    }

    #[test]
    fn unprojectable_source_skipped() {
        let env = TestEnv::new();
        let scan = env.scan_with_capabilities(
            "t",
            [
                Field::new("a", "", DataType::Int64, true),
                Field::new("b", "", DataType::Int64, true),
            ],
            TableCapabilities {
                projection: false,
                ..TableCapabilities::ALL
            },
        );
        let plan = project(vec![col(1, "t", "b", DataType::Int64)], scan);

        let out = env.apply_rule(&PushdownProjections, &plan).unwrap();
        assert!(Arc::ptr_eq(&plan, &out));
    }

    #[test]
    fn mutations_untouched() {
        let env = TestEnv::with_sample_tables();
        let plan = LogicalOperator::Delete(Node::new(
            crate::logical::logical_delete::LogicalDelete,
            vec![env.sample_scan("mytable")],
        ))
        .into_ref();

        let out = env.apply_rule(&PushdownProjections, &plan).unwrap();
        assert!(Arc::ptr_eq(&plan, &out));
    }
}
