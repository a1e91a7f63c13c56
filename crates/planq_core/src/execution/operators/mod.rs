//! Physical operators.
//!
//! Each operator is a [`RowSource`](super::RowSource) whose iterators
//! evaluate expressions against `parent ++ row`.

pub mod delete;
pub mod filter;
pub mod insert;
pub mod nested_loop_join;
pub mod project;
pub mod scan;
pub mod set;
pub mod trigger_executor;
pub mod update;
pub mod values;

use planq_error::{DbError, Result};

use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::expr::Expression;

/// `parent ++ row`.
pub(crate) fn concat_rows(parent: &[ScalarValue], row: &[ScalarValue]) -> Row {
    let mut out = Vec::with_capacity(parent.len() + row.len());
    out.extend_from_slice(parent);
    out.extend_from_slice(row);
    out
}

/// Apply set field assignments to `row` in order.
///
/// The left side of each assignment is a column position in `row`, and
/// later assignments see the values written by earlier ones.
pub(crate) fn apply_assignments(assignments: &[Expression], row: &mut Row) -> Result<()> {
    for assignment in assignments {
        let Expression::SetField(set_field) = assignment else {
            return Err(DbError::new("Expected a set field expression")
                .with_field("expression", assignment));
        };
        let target = set_field.left.try_as_column()?.index;
        let value = set_field.right.eval(row)?;
        match row.get_mut(target) {
            Some(slot) => *slot = value,
            None => {
                return Err(DbError::new("Assignment target out of range")
                    .with_field("index", target)
                    .with_field("row_len", row.len()));
            }
        }
    }
    Ok(())
}

/// Close every iterator, returning the first error.
pub(crate) fn close_all<'a>(
    iters: impl IntoIterator<Item = &'a mut Box<dyn super::RowIter>>,
) -> Result<()> {
    let mut result = Ok(());
    for iter in iters {
        let closed = iter.close();
        if result.is_ok() {
            result = closed;
        }
    }
    result
}
