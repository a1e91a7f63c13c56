use std::sync::Arc;

use planq_error::{DbError, Result};

use super::RowSource;
use super::operators::delete::PhysicalDelete;
use super::operators::filter::PhysicalFilter;
use super::operators::insert::PhysicalInsert;
use super::operators::nested_loop_join::PhysicalNestedLoopJoin;
use super::operators::project::PhysicalProject;
use super::operators::scan::PhysicalScan;
use super::operators::set::{BlockStatement, PhysicalBlock, PhysicalSet};
use super::operators::trigger_executor::PhysicalTriggerExecutor;
use super::operators::update::{PhysicalUpdate, PhysicalUpdateSource};
use super::operators::values::PhysicalValues;
use crate::catalog::TableSource;
use crate::logical::logical_join::JoinType;
use crate::logical::operator::{LogicalNode, LogicalOperator, PlanRef};
use crate::logical::scope::Scope;

/// Lowers an analyzed logical plan into row sources.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlanner {
    /// Scope the plan was analyzed in. Its row is the parent row the root
    /// source must be opened with.
    scope_width: usize,
}

impl ExecutionPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Planner for a plan analyzed in `scope`.
    pub fn with_scope(scope: &Scope) -> Self {
        ExecutionPlanner {
            scope_width: scope.num_columns(),
        }
    }

    pub fn plan(&self, plan: &PlanRef) -> Result<Arc<dyn RowSource>> {
        self.plan_with_scope(plan, self.scope_width)
    }

    fn plan_with_scope(&self, plan: &PlanRef, scope_width: usize) -> Result<Arc<dyn RowSource>> {
        let source: Arc<dyn RowSource> = match plan.as_ref() {
            LogicalOperator::Project(project) => Arc::new(PhysicalProject {
                projections: project.node.projections.clone(),
                child: self.plan_with_scope(project.get_one_child_exact()?, scope_width)?,
            }),
            LogicalOperator::Filter(filter) => Arc::new(PhysicalFilter {
                predicate: filter.node.filter.clone(),
                child: self.plan_with_scope(filter.get_one_child_exact()?, scope_width)?,
            }),
            LogicalOperator::CrossJoin(join) => {
                let [left, right] = join.get_two_children_exact()?;
                Arc::new(PhysicalNestedLoopJoin {
                    primary: self.plan_with_scope(left, scope_width)?,
                    secondary: self.plan_with_scope(right, scope_width)?,
                    condition: None,
                    preserve_primary: false,
                    correlated: false,
                    secondary_first: false,
                })
            }
            LogicalOperator::Join(join) => {
                let [left, right] = join.get_two_children_exact()?;
                let left = self.plan_with_scope(left, scope_width)?;
                let right = self.plan_with_scope(right, scope_width)?;
                let (primary, secondary, secondary_first) = match join.node.join_type {
                    JoinType::Inner | JoinType::Left => (left, right, false),
                    JoinType::Right => (right, left, true),
                };
                Arc::new(PhysicalNestedLoopJoin {
                    primary,
                    secondary,
                    condition: Some(join.node.condition.clone()),
                    preserve_primary: join.node.join_type != JoinType::Inner,
                    correlated: false,
                    secondary_first,
                })
            }
            LogicalOperator::IndexedJoin(join) => {
                let [primary, secondary] = join.get_two_children_exact()?;
                let primary_width = primary.output_schema().len();
                Arc::new(PhysicalNestedLoopJoin {
                    primary: self.plan_with_scope(primary, scope_width)?,
                    secondary: self.plan_with_scope(secondary, scope_width + primary_width)?,
                    condition: Some(join.node.condition.clone()),
                    preserve_primary: join.node.join_type != JoinType::Inner,
                    correlated: true,
                    secondary_first: false,
                })
            }
            LogicalOperator::Scan(scan) => Arc::new(PhysicalScan {
                source: scan.node.source.clone(),
                projection: scan.node.projection.clone(),
                filters: scan.node.filters.clone(),
                lookup: scan.node.lookup.clone(),
            }),
            LogicalOperator::TableAlias(alias) => {
                self.plan_with_scope(alias.get_one_child_exact()?, scope_width)?
            }
            LogicalOperator::Decorated(decorated) => {
                self.plan_with_scope(decorated.get_one_child_exact()?, scope_width)?
            }
            LogicalOperator::Values(values) => Arc::new(PhysicalValues {
                rows: values.node.rows.clone(),
            }),
            LogicalOperator::Insert(insert) => {
                if !insert.node.columns.is_empty() {
                    return Err(DbError::new("Insert columns were not mapped to table rows")
                        .with_field("columns", insert.node.columns.join(", ")));
                }
                let [_, source] = insert.get_two_children_exact()?;
                Arc::new(PhysicalInsert {
                    table: mutation_table(plan)?,
                    source: self.plan_with_scope(source, scope_width)?,
                })
            }
            LogicalOperator::Update(update) => Arc::new(PhysicalUpdate {
                table: mutation_table(plan)?,
                child: self.plan_with_scope(update.get_one_child_exact()?, scope_width)?,
            }),
            LogicalOperator::UpdateSource(source) => Arc::new(PhysicalUpdateSource {
                assignments: source.node.assignments.clone(),
                child: self.plan_with_scope(source.get_one_child_exact()?, scope_width)?,
            }),
            LogicalOperator::Delete(delete) => Arc::new(PhysicalDelete {
                table: mutation_table(plan)?,
                child: self.plan_with_scope(delete.get_one_child_exact()?, scope_width)?,
            }),
            LogicalOperator::Set(set) => Arc::new(PhysicalSet {
                assignments: set.node.assignments.clone(),
                width: scope_width,
            }),
            LogicalOperator::Block(block) => Arc::new(PhysicalBlock {
                statements: block
                    .children
                    .iter()
                    .map(|statement| {
                        Ok(BlockStatement {
                            source: self.plan_with_scope(statement, scope_width)?,
                            updates_scope: updates_scope_row(statement),
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                width: scope_width,
            }),
            LogicalOperator::TriggerExecutor(executor) => {
                let [wrapped, logic] = executor.get_two_children_exact()?;
                // Compiled logic sees only the wrapped row.
                let wrapped_width = wrapped.output_schema().len();
                Arc::new(PhysicalTriggerExecutor {
                    trigger_name: executor.node.trigger_name.clone(),
                    time: executor.node.time,
                    wrapped: self.plan_with_scope(wrapped, scope_width)?,
                    logic: self.plan_with_scope(logic, wrapped_width)?,
                    logic_updates_row: updates_scope_row(logic),
                })
            }
            LogicalOperator::UnresolvedTable(_) | LogicalOperator::CreateTrigger(_) => {
                return Err(DbError::new("Cannot execute plan node").with_field("node", plan.name()));
            }
        };

        Ok(source)
    }
}

fn updates_scope_row(plan: &PlanRef) -> bool {
    matches!(plan.as_ref(), LogicalOperator::Set(_) | LogicalOperator::Block(_))
}

fn mutation_table(plan: &PlanRef) -> Result<Arc<dyn TableSource>> {
    match plan.mutation_target().map(|t| t.as_ref()) {
        Some(LogicalOperator::Scan(scan)) => Ok(scan.node.source.clone()),
        _ => Err(DbError::new("Mutation target is not a resolved table")
            .with_field("node", plan.name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::scalar::ScalarValue;
    use crate::execution::{ExecutionContext, collect_rows};
    use crate::testutil::{TestEnv, unresolved_table};

    #[test]
    fn unresolved_plan_rejected() {
        let err = ExecutionPlanner::new()
            .plan(&unresolved_table("mytable"))
            .unwrap_err();
        assert_eq!(Some("UnresolvedTable"), err.field("node"));
    }

    #[test]
    fn scan_full_table() {
        let env = TestEnv::with_sample_tables();
        let plan = env.analyze(&unresolved_table("mytable2")).unwrap();

        let source = ExecutionPlanner::new().plan(&plan).unwrap();
        let rows = collect_rows(source.as_ref(), &ExecutionContext::new()).unwrap();
        assert_eq!(2, rows.len());
        assert_eq!(ScalarValue::from("x"), rows[0][2]);
    }
}
