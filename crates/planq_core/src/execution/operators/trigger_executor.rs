use std::sync::Arc;

use planq_error::Result;
use tracing::trace;

use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::execution::{ExecutionContext, RowIter, RowSource, drain};
use crate::logical::logical_trigger::TriggerTime;

/// Runs compiled trigger logic once per row of the wrapped input.
///
/// The logic is opened with the wrapped row as its parent row. A BEFORE
/// trigger whose logic rewrites the scope row replaces the wrapped row with
/// the rewritten one.
#[derive(Debug)]
pub struct PhysicalTriggerExecutor {
    pub(crate) trigger_name: String,
    pub(crate) time: TriggerTime,
    pub(crate) wrapped: Arc<dyn RowSource>,
    pub(crate) logic: Arc<dyn RowSource>,
    /// Logic emits the (possibly modified) scope row.
    pub(crate) logic_updates_row: bool,
}

impl RowSource for PhysicalTriggerExecutor {
    fn name(&self) -> &'static str {
        "TriggerExecutor"
    }

    fn num_columns(&self) -> usize {
        self.wrapped.num_columns()
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        Ok(Box::new(TriggerExecutorIter {
            ctx: ctx.clone(),
            trigger_name: self.trigger_name.clone(),
            adopt_row: self.time == TriggerTime::Before && self.logic_updates_row,
            wrapped: self.wrapped.row_iter(ctx, parent)?,
            logic: self.logic.clone(),
        }))
    }
}

#[derive(Debug)]
struct TriggerExecutorIter {
    ctx: ExecutionContext,
    trigger_name: String,
    adopt_row: bool,
    wrapped: Box<dyn RowIter>,
    logic: Arc<dyn RowSource>,
}

impl RowIter for TriggerExecutorIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        let Some(row) = self.wrapped.try_next()? else {
            return Ok(None);
        };

        trace!(trigger = %self.trigger_name, "running trigger logic");
        let logic_rows = drain(self.logic.row_iter(&self.ctx, &row)?)?;

        if self.adopt_row {
            if let Some(updated) = logic_rows.into_iter().last() {
                if updated.len() == row.len() {
                    return Ok(Some(updated));
                }
            }
        }
        Ok(Some(row))
    }

    fn close(&mut self) -> Result<()> {
        self.wrapped.close()
    }
}
