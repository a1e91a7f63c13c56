//! Coordinated renumbering of positional column references.
//!
//! Rewrites that change a node's output layout (narrowing a scan, swapping
//! join sides, wrapping a mutation) leave column references above them
//! pointing at stale positions. Every reference also carries the table and
//! column it names, which is what gets used to find the new position.

use std::sync::Arc;

use planq_error::{DbError, ErrorKind, Result};

use super::resolve::input_schema;
use super::{AnalysisContext, Analyzer, AnalyzerRule};
use crate::arrays::field::Schema;
use crate::expr::Expression;
use crate::logical::logical_scan::LogicalScan;
use crate::logical::operator::{LogicalNode, LogicalOperator, Node, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::transform_node_expressions;

#[derive(Debug, Clone, Copy)]
pub struct FixFieldIndexes;

impl AnalyzerRule for FixFieldIndexes {
    fn name(&self) -> &'static str {
        "fix_field_indexes"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        _ctx: &AnalysisContext,
        plan: &PlanRef,
        scope: &Scope,
    ) -> Result<PlanRef> {
        fix_field_indexes(plan, &scope.schema())
    }
}

/// Renumber every resolved column reference in the plan so it points at the
/// current position of the column it names.
///
/// `scope` is the schema of the columns visible from outside the plan.
pub fn fix_field_indexes(plan: &PlanRef, scope: &Schema) -> Result<PlanRef> {
    let children = plan.children();
    let mut new_children: Vec<PlanRef> = Vec::with_capacity(children.len());
    let mut changed = false;

    for (idx, child) in children.iter().enumerate() {
        if plan.is_opaque_child(idx) {
            new_children.push(child.clone());
            continue;
        }

        // The secondary side of an indexed join is opened once per primary
        // row, with the primary row appended to the scope.
        let new_child = match (plan.as_ref(), new_children.first()) {
            (LogicalOperator::IndexedJoin(_), Some(primary)) if idx == 1 => {
                fix_field_indexes(child, &scope.concat(&primary.output_schema()))?
            }
            _ => fix_field_indexes(child, scope)?,
        };

        changed |= !Arc::ptr_eq(&new_child, child);
        new_children.push(new_child);
    }

    let node = if changed {
        plan.with_new_children(new_children)?
    } else {
        plan.clone()
    };

    match node.as_ref() {
        LogicalOperator::Scan(scan) => fix_scan(&node, scan, scope),
        _ => {
            let schema = scope.concat(&input_schema(&node));
            transform_node_expressions(&node, &mut |expr| renumber(expr, &schema))
        }
    }
}

/// Pushed filters see the table's full row, lookup keys see the scope.
fn fix_scan(plan: &PlanRef, scan: &Node<LogicalScan>, scope: &Schema) -> Result<PlanRef> {
    let mut new_scan = scan.node.clone();

    for filter in &mut new_scan.filters {
        *filter = filter.transform_up(&mut |expr| renumber(expr, scan.node.full_schema()))?;
    }
    if let Some(lookup) = &mut new_scan.lookup {
        lookup.for_each_key_mut(&mut |key| {
            *key = key.transform_up(&mut |expr| renumber(expr, scope))?;
            Ok(())
        })?;
    }

    if new_scan == scan.node {
        return Ok(plan.clone());
    }

    Ok(LogicalOperator::Scan(Node::new(new_scan, Vec::new())).into_ref())
}

pub fn renumber(expr: Expression, schema: &Schema) -> Result<Expression> {
    match expr {
        Expression::Column(mut col) => {
            let index = schema.position(Some(&col.table), &col.column).ok_or_else(|| {
                DbError::with_kind(
                    ErrorKind::ColumnNotFound,
                    "Column no longer available after rewrite",
                )
                .with_field("column", &col)
            })?;
            col.index = index;
            Ok(Expression::Column(col))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::arrays::field::Field;
    use crate::expr::{self, col};
    use crate::logical::logical_filter::LogicalFilter;
    use crate::logical::logical_join::LogicalCrossJoin;
    use crate::testutil::TestEnv;

    #[test]
    fn renumber_after_layout_change() {
        let env = TestEnv::new();
        let t1 = env.scan("t1", [Field::new("a", "", DataType::Int64, true)]);
        let t2 = env.scan(
            "t2",
            [
                Field::new("b", "", DataType::Int64, true),
                Field::new("c", "", DataType::Int64, true),
            ],
        );

        // Indexes are stale, `t2.c` is actually at position 2.
        let plan = LogicalOperator::Filter(Node::new(
            LogicalFilter {
                filter: expr::eq(
                    col(0, "t2", "c", DataType::Int64),
                    col(7, "t1", "a", DataType::Int64),
                ),
            },
            vec![
                LogicalOperator::CrossJoin(Node::new(LogicalCrossJoin, vec![t1, t2])).into_ref(),
            ],
        ))
        .into_ref();

        let fixed = fix_field_indexes(&plan, &Schema::empty()).unwrap();
        let LogicalOperator::Filter(filter) = fixed.as_ref() else {
            panic!("expected filter");
        };
        let Expression::Comparison(cmp) = &filter.node.filter else {
            panic!("expected comparison");
        };
        assert_eq!(2, cmp.left.try_as_column().unwrap().index);
        assert_eq!(0, cmp.right.try_as_column().unwrap().index);

        // Already correct, nothing to do.
        let again = fix_field_indexes(&fixed, &Schema::empty()).unwrap();
        assert!(Arc::ptr_eq(&fixed, &again));
    }

    #[test]
    fn scope_columns_come_first() {
        let env = TestEnv::new();
        let t1 = env.scan("t1", [Field::new("a", "", DataType::Int64, true)]);
        let scope = Schema::new([Field::new("x", "new", DataType::Int64, true)]);

        let plan = LogicalOperator::Filter(Node::new(
            LogicalFilter {
                filter: expr::eq(
                    col(0, "t1", "a", DataType::Int64),
                    col(1, "new", "x", DataType::Int64),
                ),
            },
            vec![t1],
        ))
        .into_ref();

        let fixed = fix_field_indexes(&plan, &scope).unwrap();
        let LogicalOperator::Filter(filter) = fixed.as_ref() else {
            panic!("expected filter");
        };
        assert_eq!("t1.a = new.x", filter.node.filter.to_string());
        let Expression::Comparison(cmp) = &filter.node.filter else {
            panic!("expected comparison");
        };
        assert_eq!(1, cmp.left.try_as_column().unwrap().index);
        assert_eq!(0, cmp.right.try_as_column().unwrap().index);
    }

    #[test]
    fn missing_column_errors() {
        let env = TestEnv::new();
        let t1 = env.scan("t1", [Field::new("a", "", DataType::Int64, true)]);
        let plan = LogicalOperator::Filter(Node::new(
            LogicalFilter {
                filter: expr::is_null(col(0, "t1", "gone", DataType::Int64)),
            },
            vec![t1],
        ))
        .into_ref();

        let err = fix_field_indexes(&plan, &Schema::empty()).unwrap_err();
        assert_eq!(&ErrorKind::ColumnNotFound, err.kind());
    }
}
