use std::sync::Arc;

use planq_error::Result;

use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::catalog::TableSource;
use crate::execution::{ExecutionContext, RowIter, RowSource};

/// Deletes each child row from the table and emits it.
#[derive(Debug)]
pub struct PhysicalDelete {
    pub(crate) table: Arc<dyn TableSource>,
    pub(crate) child: Arc<dyn RowSource>,
}

impl RowSource for PhysicalDelete {
    fn name(&self) -> &'static str {
        "Delete"
    }

    fn num_columns(&self) -> usize {
        self.child.num_columns()
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(DeleteIter {
            table: self.table.clone(),
            child: self.child.row_iter(ctx, parent)?,
        }))
    }
}

#[derive(Debug)]
struct DeleteIter {
    table: Arc<dyn TableSource>,
    child: Box<dyn RowIter>,
}

impl RowIter for DeleteIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.child.try_next()? else {
            return Ok(None);
        };
        self.table.delete(&row)?;
        Ok(Some(row))
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}
