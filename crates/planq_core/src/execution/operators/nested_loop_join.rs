use std::sync::Arc;

use planq_error::{DbError, Result};
use tracing::trace;

use super::{close_all, concat_rows};
use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::execution::{ExecutionContext, RowIter, RowSource};
use crate::expr::Expression;

/// Nested loop join pulling from a primary input and reopening the
/// secondary input for every primary row.
///
/// Plain joins and cross joins open the secondary against the join's parent
/// row. Indexed joins open it against `parent ++ primary row` so the
/// secondary's index lookup can be keyed on primary values.
#[derive(Debug)]
pub struct PhysicalNestedLoopJoin {
    pub(crate) primary: Arc<dyn RowSource>,
    pub(crate) secondary: Arc<dyn RowSource>,
    /// Evaluated against `parent ++ output row`. `None` matches everything.
    pub(crate) condition: Option<Expression>,
    /// Emit unmatched primary rows padded with NULLs.
    pub(crate) preserve_primary: bool,
    /// Open the secondary with the primary row appended to the parent.
    pub(crate) correlated: bool,
    /// Output `secondary ++ primary` instead of `primary ++ secondary`.
    pub(crate) secondary_first: bool,
}

impl RowSource for PhysicalNestedLoopJoin {
    fn name(&self) -> &'static str {
        if self.correlated {
            "IndexedJoin"
        } else {
            "NestedLoopJoin"
        }
    }

    fn num_columns(&self) -> usize {
        self.primary.num_columns() + self.secondary.num_columns()
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        trace!(
            join = self.name(),
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            "building join iterator"
        );

        Ok(Box::new(NestedLoopJoinIter {
            ctx: ctx.clone(),
            parent: parent.to_vec(),
            primary: self.primary.row_iter(ctx, parent)?,
            secondary_source: self.secondary.clone(),
            secondary_width: self.secondary.num_columns(),
            condition: self.condition.clone(),
            preserve_primary: self.preserve_primary,
            correlated: self.correlated,
            secondary_first: self.secondary_first,
            current: None,
        }))
    }
}

/// State for the primary row currently being joined.
#[derive(Debug)]
struct PrimaryRow {
    row: Row,
    secondary: Box<dyn RowIter>,
    found_match: bool,
}

#[derive(Debug)]
struct NestedLoopJoinIter {
    ctx: ExecutionContext,
    parent: Row,
    primary: Box<dyn RowIter>,
    secondary_source: Arc<dyn RowSource>,
    secondary_width: usize,
    condition: Option<Expression>,
    preserve_primary: bool,
    correlated: bool,
    secondary_first: bool,
    current: Option<PrimaryRow>,
}

impl NestedLoopJoinIter {
    fn combine(&self, primary: &[ScalarValue], secondary: &[ScalarValue]) -> Row {
        if self.secondary_first {
            concat_rows(secondary, primary)
        } else {
            concat_rows(primary, secondary)
        }
    }

    /// Only a non-null true condition is a match.
    fn matches(&self, row: &[ScalarValue]) -> Result<bool> {
        match &self.condition {
            Some(condition) => condition.eval_predicate(&concat_rows(&self.parent, row)),
            None => Ok(true),
        }
    }

    /// Load the next primary row, opening a fresh secondary iterator for it.
    ///
    /// Returns false once the primary input is exhausted.
    fn advance_primary(&mut self) -> Result<bool> {
        let Some(row) = self.primary.try_next()? else {
            return Ok(false);
        };

        let secondary = if self.correlated {
            self.secondary_source
                .row_iter(&self.ctx, &concat_rows(&self.parent, &row))?
        } else {
            self.secondary_source.row_iter(&self.ctx, &self.parent)?
        };

        self.current = Some(PrimaryRow {
            row,
            secondary,
            found_match: false,
        });
        Ok(true)
    }
}

impl RowIter for NestedLoopJoinIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        loop {
            if self.current.is_none() && !self.advance_primary()? {
                return Ok(None);
            }
            let current = self
                .current
                .as_mut()
                .ok_or_else(|| DbError::new("Missing primary row"))?;

            match current.secondary.try_next()? {
                Some(secondary_row) => {
                    let primary_row = current.row.clone();
                    let out = self.combine(&primary_row, &secondary_row);
                    if self.matches(&out)? {
                        if let Some(current) = self.current.as_mut() {
                            current.found_match = true;
                        }
                        return Ok(Some(out));
                    }
                }
                None => {
                    let Some(mut finished) = self.current.take() else {
                        continue;
                    };
                    finished.secondary.close()?;

                    if self.preserve_primary && !finished.found_match {
                        let nulls = vec![ScalarValue::Null; self.secondary_width];
                        return Ok(Some(self.combine(&finished.row, &nulls)));
                    }
                }
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        let secondary = self.current.as_mut().map(|c| &mut c.secondary);
        close_all(std::iter::once(&mut self.primary).chain(secondary))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::execution::{VecRowIter, collect_rows};
    use crate::expr::{self, col};

    /// Fixed rows, optionally failing on close. Ignores cancellation.
    #[derive(Debug)]
    struct RowsSource {
        width: usize,
        rows: Vec<Row>,
        close_error: Option<&'static str>,
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    impl RowsSource {
        fn new(width: usize, rows: Vec<Row>) -> Self {
            RowsSource {
                width,
                rows,
                close_error: None,
                opened: AtomicUsize::new(0),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn failing_close(mut self, msg: &'static str) -> Self {
            self.close_error = Some(msg);
            self
        }
    }

    #[derive(Debug)]
    struct FailingClose {
        rows: std::vec::IntoIter<Row>,
        msg: Option<&'static str>,
        closed: Arc<AtomicUsize>,
    }

    impl RowIter for FailingClose {
        fn try_next(&mut self) -> Result<Option<Row>> {
            Ok(self.rows.next())
        }

        fn close(&mut self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::Relaxed);
            match self.msg {
                Some(msg) => Err(DbError::new(msg)),
                None => Ok(()),
            }
        }
    }

    impl RowSource for RowsSource {
        fn name(&self) -> &'static str {
            "Rows"
        }

        fn num_columns(&self) -> usize {
            self.width
        }

        fn row_iter(
            &self,
            _ctx: &ExecutionContext,
            _parent: &[ScalarValue],
        ) -> Result<Box<dyn RowIter>> {
            self.opened.fetch_add(1, Ordering::Relaxed);
            Ok(Box::new(FailingClose {
                rows: self.rows.clone().into_iter(),
                msg: self.close_error,
                closed: self.closed.clone(),
            }))
        }
    }

    /// Secondary that only emits rows whose first column equals the last
    /// value of the parent row, like an index lookup keyed on the primary.
    #[derive(Debug)]
    struct KeyedSource {
        rows: Vec<Row>,
    }

    impl RowSource for KeyedSource {
        fn name(&self) -> &'static str {
            "Keyed"
        }

        fn num_columns(&self) -> usize {
            2
        }

        fn row_iter(
            &self,
            ctx: &ExecutionContext,
            parent: &[ScalarValue],
        ) -> Result<Box<dyn RowIter>> {
            let key = parent.last().cloned().unwrap_or(ScalarValue::Null);
            let rows = self
                .rows
                .iter()
                .filter(|row| row[0] == key)
                .cloned()
                .collect();
            Ok(Box::new(VecRowIter::new(ctx, rows)))
        }
    }

    fn indexed_join(preserve_primary: bool) -> PhysicalNestedLoopJoin {
        PhysicalNestedLoopJoin {
            primary: Arc::new(RowsSource::new(
                1,
                vec![vec![1_i64.into()], vec![2_i64.into()]],
            )),
            secondary: Arc::new(KeyedSource {
                rows: vec![vec![1_i64.into(), "a".into()], vec![3_i64.into(), "c".into()]],
            }),
            condition: Some(expr::eq(
                col(0, "p", "k", DataType::Int64),
                col(1, "s", "k", DataType::Int64),
            )),
            preserve_primary,
            correlated: true,
            secondary_first: false,
        }
    }

    #[test]
    fn left_indexed_join_pads_unmatched() {
        let join = indexed_join(true);
        let rows = collect_rows(&join, &ExecutionContext::new()).unwrap();
        assert_eq!(
            vec![
                vec![1_i64.into(), 1_i64.into(), "a".into()],
                vec![2_i64.into(), ScalarValue::Null, ScalarValue::Null],
            ],
            rows
        );
    }

    #[test]
    fn inner_indexed_join_drops_unmatched() {
        let join = indexed_join(false);
        let rows = collect_rows(&join, &ExecutionContext::new()).unwrap();
        assert_eq!(vec![vec![
            ScalarValue::Int64(1),
            1_i64.into(),
            "a".into()
        ]], rows);
    }

    #[test]
    fn null_condition_is_not_a_match() {
        let join = PhysicalNestedLoopJoin {
            primary: Arc::new(RowsSource::new(1, vec![vec![1_i64.into()]])),
            secondary: Arc::new(RowsSource::new(1, vec![vec![ScalarValue::Null]])),
            condition: Some(expr::eq(
                col(0, "p", "a", DataType::Int64),
                col(1, "s", "b", DataType::Int64),
            )),
            preserve_primary: true,
            correlated: false,
            secondary_first: false,
        };

        let rows = collect_rows(&join, &ExecutionContext::new()).unwrap();
        assert_eq!(vec![vec![ScalarValue::Int64(1), ScalarValue::Null]], rows);
    }

    #[test]
    fn secondary_reopened_per_primary_row() {
        let secondary = Arc::new(RowsSource::new(1, vec![vec![5_i64.into()]]));
        let join = PhysicalNestedLoopJoin {
            primary: Arc::new(RowsSource::new(
                1,
                vec![vec![1_i64.into()], vec![2_i64.into()], vec![3_i64.into()]],
            )),
            secondary: secondary.clone(),
            condition: None,
            preserve_primary: false,
            correlated: false,
            secondary_first: true,
        };

        let rows = collect_rows(&join, &ExecutionContext::new()).unwrap();
        assert_eq!(3, rows.len());
        assert_eq!(vec![ScalarValue::Int64(5), ScalarValue::Int64(1)], rows[0]);
        assert_eq!(3, secondary.opened.load(Ordering::Relaxed));
    }

    #[test]
    fn close_returns_first_error() {
        let primary =
            RowsSource::new(1, vec![vec![1_i64.into()]]).failing_close("primary close");
        let secondary = RowsSource::new(1, vec![vec![1_i64.into()], vec![2_i64.into()]])
            .failing_close("secondary close");
        let primary_closed = primary.closed.clone();
        let secondary_closed = secondary.closed.clone();

        let join = PhysicalNestedLoopJoin {
            primary: Arc::new(primary),
            secondary: Arc::new(secondary),
            condition: None,
            preserve_primary: false,
            correlated: false,
            secondary_first: false,
        };

        let ctx = ExecutionContext::new();
        let mut iter = join.row_iter(&ctx, &[]).unwrap();
        // Leave the secondary open mid-stream.
        iter.try_next().unwrap().unwrap();

        let err = iter.close().unwrap_err();
        assert_eq!("primary close", err.message());
        assert_eq!(1, primary_closed.load(Ordering::Relaxed));
        assert_eq!(1, secondary_closed.load(Ordering::Relaxed));
    }

    #[test]
    fn cancellation_left_to_inputs() {
        let join = PhysicalNestedLoopJoin {
            primary: Arc::new(RowsSource::new(1, vec![vec![1_i64.into()]])),
            secondary: Arc::new(RowsSource::new(1, vec![vec![2_i64.into()]])),
            condition: None,
            preserve_primary: false,
            correlated: false,
            secondary_first: false,
        };

        let ctx = ExecutionContext::new();
        let mut iter = join.row_iter(&ctx, &[]).unwrap();
        ctx.cancel();

        let row = iter.try_next().unwrap();
        assert_eq!(Some(vec![1_i64.into(), 2_i64.into()]), row);
        assert_eq!(None, iter.try_next().unwrap());
    }
}
