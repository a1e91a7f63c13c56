use std::sync::Arc;

use planq_error::Result;

use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::catalog::TableSource;
use crate::execution::{ExecutionContext, RowIter, RowSource};

/// Inserts each source row into the table and emits it.
#[derive(Debug)]
pub struct PhysicalInsert {
    pub(crate) table: Arc<dyn TableSource>,
    pub(crate) source: Arc<dyn RowSource>,
}

impl RowSource for PhysicalInsert {
    fn name(&self) -> &'static str {
        "Insert"
    }

    fn num_columns(&self) -> usize {
        self.table.schema().len()
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(InsertIter {
            table: self.table.clone(),
            source: self.source.row_iter(ctx, parent)?,
        }))
    }
}

#[derive(Debug)]
struct InsertIter {
    table: Arc<dyn TableSource>,
    source: Box<dyn RowIter>,
}

impl RowIter for InsertIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.source.try_next()? else {
            return Ok(None);
        };
        self.table.insert(row.clone())?;
        Ok(Some(row))
    }

    fn close(&mut self) -> Result<()> {
        self.source.close()
    }
}
