use std::sync::Arc;

use planq_error::Result;

use super::apply_assignments;
use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::execution::{ExecutionContext, RowIter, RowSource, VecRowIter, drain};
use crate::expr::Expression;

/// Assigns into a copy of the parent row and emits it.
#[derive(Debug)]
pub struct PhysicalSet {
    pub(crate) assignments: Vec<Expression>,
    pub(crate) width: usize,
}

impl PhysicalSet {
    fn assign(&self, parent: &[ScalarValue]) -> Result<Row> {
        let mut row = parent.to_vec();
        apply_assignments(&self.assignments, &mut row)?;
        Ok(row)
    }
}

impl RowSource for PhysicalSet {
    fn name(&self) -> &'static str {
        "Set"
    }

    fn num_columns(&self) -> usize {
        self.width
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(VecRowIter::new(ctx, vec![self.assign(parent)?])))
    }
}

/// A statement in a block, and whether it rewrites the scope row.
#[derive(Debug)]
pub struct BlockStatement {
    pub(crate) source: Arc<dyn RowSource>,
    pub(crate) updates_scope: bool,
}

/// Runs statements in order, threading the scope row through those that
/// rewrite it. Emits the final scope row.
#[derive(Debug)]
pub struct PhysicalBlock {
    pub(crate) statements: Vec<BlockStatement>,
    pub(crate) width: usize,
}

impl RowSource for PhysicalBlock {
    fn name(&self) -> &'static str {
        "Block"
    }

    fn num_columns(&self) -> usize {
        self.width
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        let mut scope_row = parent.to_vec();
        for statement in &self.statements {
            let rows = drain(statement.source.row_iter(ctx, &scope_row)?)?;
            if statement.updates_scope {
                if let Some(row) = rows.into_iter().last() {
                    scope_row = row;
                }
            }
        }
        Ok(Box::new(VecRowIter::new(ctx, vec![scope_row])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::execution::operators::values::PhysicalValues;
    use crate::expr::{self, col};

    fn set(target: usize, value: Expression) -> Arc<dyn RowSource> {
        Arc::new(PhysicalSet {
            assignments: vec![expr::set_field(
                col(target, "new", "c", DataType::Int64),
                value,
            )],
            width: 2,
        })
    }

    #[test]
    fn set_sees_earlier_assignments() {
        let set = PhysicalSet {
            assignments: vec![
                expr::set_field(col(0, "new", "a", DataType::Int64), expr::lit(10_i64)),
                expr::set_field(
                    col(1, "new", "b", DataType::Int64),
                    col(0, "new", "a", DataType::Int64),
                ),
            ],
            width: 2,
        };

        let ctx = ExecutionContext::new();
        let rows = drain(set.row_iter(&ctx, &[1_i64.into(), 2_i64.into()]).unwrap()).unwrap();
        assert_eq!(vec![vec![ScalarValue::Int64(10), ScalarValue::Int64(10)]], rows);
    }

    #[test]
    fn block_threads_scope_row() {
        let block = PhysicalBlock {
            statements: vec![
                BlockStatement {
                    source: set(0, expr::lit(5_i64)),
                    updates_scope: true,
                },
                BlockStatement {
                    source: Arc::new(PhysicalValues {
                        rows: vec![vec![expr::lit(99_i64), expr::lit(99_i64)]],
                    }),
                    updates_scope: false,
                },
                BlockStatement {
                    source: set(1, col(0, "new", "a", DataType::Int64)),
                    updates_scope: true,
                },
            ],
            width: 2,
        };

        let ctx = ExecutionContext::new();
        let rows = drain(block.row_iter(&ctx, &[1_i64.into(), 2_i64.into()]).unwrap()).unwrap();
        assert_eq!(vec![vec![ScalarValue::Int64(5), ScalarValue::Int64(5)]], rows);
    }
}
