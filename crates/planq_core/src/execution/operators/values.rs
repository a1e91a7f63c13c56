use planq_error::Result;

use crate::arrays::scalar::ScalarValue;
use crate::execution::{ExecutionContext, RowIter, RowSource, VecRowIter};
use crate::expr::Expression;

/// Literal rows. Expressions may reference the parent row.
#[derive(Debug)]
pub struct PhysicalValues {
    pub(crate) rows: Vec<Vec<Expression>>,
}

impl RowSource for PhysicalValues {
    fn name(&self) -> &'static str {
        "Values"
    }

    fn num_columns(&self) -> usize {
        self.rows.first().map(|r| r.len()).unwrap_or(0)
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        let rows = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|expr| expr.eval(parent))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Box::new(VecRowIter::new(ctx, rows)))
    }
}
