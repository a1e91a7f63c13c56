use std::sync::Arc;

use planq_error::Result;

use super::concat_rows;
use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::execution::{ExecutionContext, RowIter, RowSource};
use crate::expr::Expression;

#[derive(Debug)]
pub struct PhysicalProject {
    pub(crate) projections: Vec<Expression>,
    pub(crate) child: Arc<dyn RowSource>,
}

impl RowSource for PhysicalProject {
    fn name(&self) -> &'static str {
        "Project"
    }

    fn num_columns(&self) -> usize {
        self.projections.len()
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(ProjectIter {
            parent: parent.to_vec(),
            projections: self.projections.clone(),
            child: self.child.row_iter(ctx, parent)?,
        }))
    }
}

#[derive(Debug)]
struct ProjectIter {
    parent: Row,
    projections: Vec<Expression>,
    child: Box<dyn RowIter>,
}

impl RowIter for ProjectIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.child.try_next()? else {
            return Ok(None);
        };
        let input = concat_rows(&self.parent, &row);
        let out = self
            .projections
            .iter()
            .map(|expr| expr.eval(&input))
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(out))
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}
