use std::sync::Arc;

use planq_error::{DbError, Result};

use super::{apply_assignments, concat_rows};
use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::catalog::TableSource;
use crate::execution::{ExecutionContext, RowIter, RowSource};
use crate::expr::Expression;

/// Applies assignments to each child row, emitting `old ++ new`.
#[derive(Debug)]
pub struct PhysicalUpdateSource {
    /// Assignment targets and values are positioned against
    /// `parent ++ child row`.
    pub(crate) assignments: Vec<Expression>,
    pub(crate) child: Arc<dyn RowSource>,
}

impl RowSource for PhysicalUpdateSource {
    fn name(&self) -> &'static str {
        "UpdateSource"
    }

    fn num_columns(&self) -> usize {
        self.child.num_columns() * 2
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(UpdateSourceIter {
            parent: parent.to_vec(),
            assignments: self.assignments.clone(),
            child: self.child.row_iter(ctx, parent)?,
        }))
    }
}

#[derive(Debug)]
struct UpdateSourceIter {
    parent: Row,
    assignments: Vec<Expression>,
    child: Box<dyn RowIter>,
}

impl RowIter for UpdateSourceIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        let Some(old) = self.child.try_next()? else {
            return Ok(None);
        };

        let mut new = concat_rows(&self.parent, &old);
        apply_assignments(&self.assignments, &mut new)?;
        let new = new.split_off(self.parent.len());

        Ok(Some(concat_rows(&old, &new)))
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}

/// Writes `old ++ new` child rows back to the table, emitting them.
#[derive(Debug)]
pub struct PhysicalUpdate {
    pub(crate) table: Arc<dyn TableSource>,
    pub(crate) child: Arc<dyn RowSource>,
}

impl RowSource for PhysicalUpdate {
    fn name(&self) -> &'static str {
        "Update"
    }

    fn num_columns(&self) -> usize {
        self.child.num_columns()
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(UpdateIter {
            table: self.table.clone(),
            width: self.table.schema().len(),
            child: self.child.row_iter(ctx, parent)?,
        }))
    }
}

#[derive(Debug)]
struct UpdateIter {
    table: Arc<dyn TableSource>,
    width: usize,
    child: Box<dyn RowIter>,
}

impl RowIter for UpdateIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.child.try_next()? else {
            return Ok(None);
        };
        if row.len() != self.width * 2 {
            return Err(DbError::new("Update row is not old ++ new")
                .with_field("expected", self.width * 2)
                .with_field("got", row.len()));
        }

        let (old, new) = row.split_at(self.width);
        self.table.update(old, new.to_vec())?;
        Ok(Some(row))
    }

    fn close(&mut self) -> Result<()> {
        self.child.close()
    }
}
