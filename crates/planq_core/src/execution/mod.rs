//! Pull-based row execution.
//!
//! Every operator is a [`RowSource`] which can be opened any number of times
//! against a parent row. The parent row carries the values of an enclosing
//! scope (e.g. the primary row of an indexed join, or the NEW/OLD row of a
//! trigger), and expressions are evaluated against `parent ++ row`.

pub mod operators;
pub mod planner;

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use planq_error::{DbError, ErrorKind, Result};

use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;

/// Shared state for a single statement execution.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    cancelled: Arc<AtomicBool>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal all iterators created with this context to stop.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(DbError::from(ErrorKind::Cancelled));
        }
        Ok(())
    }
}

/// A stream of rows.
pub trait RowIter: Debug + Send {
    /// Pull the next row. `None` signals exhaustion.
    fn try_next(&mut self) -> Result<Option<Row>>;

    /// Release resources held by this iterator and any iterators it owns.
    fn close(&mut self) -> Result<()>;
}

/// Something that can produce rows given a parent row.
pub trait RowSource: Debug + Sync + Send {
    fn name(&self) -> &'static str;

    /// Number of columns in each produced row.
    fn num_columns(&self) -> usize;

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>>;
}

/// Iterator over an already materialized set of rows.
#[derive(Debug)]
pub struct VecRowIter {
    ctx: ExecutionContext,
    rows: std::vec::IntoIter<Row>,
}

impl VecRowIter {
    pub fn new(ctx: &ExecutionContext, rows: Vec<Row>) -> Self {
        VecRowIter {
            ctx: ctx.clone(),
            rows: rows.into_iter(),
        }
    }

    pub fn empty(ctx: &ExecutionContext) -> Self {
        Self::new(ctx, Vec::new())
    }
}

impl RowIter for VecRowIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        self.ctx.check_cancelled()?;
        Ok(self.rows.next())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Pull every row from `iter`, then close it.
///
/// The iterator is closed even if pulling fails. The pull error takes
/// precedence over a close error.
pub fn drain(mut iter: Box<dyn RowIter>) -> Result<Vec<Row>> {
    let mut rows = Vec::new();
    let pulled = loop {
        match iter.try_next() {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => break Ok(()),
            Err(e) => break Err(e),
        }
    };
    let closed = iter.close();
    pulled?;
    closed?;
    Ok(rows)
}

/// Open `source` against an empty parent and collect all rows.
pub fn collect_rows(source: &dyn RowSource, ctx: &ExecutionContext) -> Result<Vec<Row>> {
    drain(source.row_iter(ctx, &[])?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_iter_stops_when_cancelled() {
        let ctx = ExecutionContext::new();
        let mut iter = VecRowIter::new(&ctx, vec![vec![1_i64.into()], vec![2_i64.into()]]);
        assert_eq!(Some(vec![ScalarValue::Int64(1)]), iter.try_next().unwrap());

        ctx.cancel();
        let err = iter.try_next().unwrap_err();
        assert_eq!(&ErrorKind::Cancelled, err.kind());
    }
}
