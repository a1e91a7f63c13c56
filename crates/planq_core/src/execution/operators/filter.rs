use std::sync::Arc;

use planq_error::Result;

use super::concat_rows;
use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::execution::{ExecutionContext, RowIter, RowSource};
use crate::expr::Expression;

#[derive(Debug)]
pub struct PhysicalFilter {
    pub(crate) predicate: Expression,
    pub(crate) child: Arc<dyn RowSource>,
}

impl RowSource for PhysicalFilter {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn num_columns(&self) -> usize {
        self.child.num_columns()
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(FilterIter {
            parent: parent.to_vec(),
            predicate: self.predicate.clone(),
            child: self.child.row_iter(ctx, parent)?,
        }))
    }
}

#[derive(Debug)]
struct FilterIter {
    parent: Row,
    predicate: Expression,
    child: Box<dyn RowIter>,
}

impl RowIter for FilterIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.child.try_next()? {
            if self.predicate.eval_predicate(&concat_rows(&self.parent, &row))? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}
