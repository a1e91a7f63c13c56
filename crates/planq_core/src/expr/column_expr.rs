use std::fmt;

use planq_error::{DbError, Result};

use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;

/// Reference to a column in the row an expression is evaluated against.
///
/// The row is the concatenation of the outer scope's row and the outputs of
/// the node's children, so `index` is only valid relative to where the
/// expression sits in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnExpr {
    /// Position of the column in the input row.
    pub index: usize,
    /// Table (or alias) the column belongs to.
    pub table: String,
    pub column: String,
    pub datatype: DataType,
    pub nullable: bool,
}

impl ColumnExpr {
    pub fn eval(&self, row: &[ScalarValue]) -> Result<ScalarValue> {
        row.get(self.index).cloned().ok_or_else(|| {
            DbError::new("Column index out of range")
                .with_field("column", self)
                .with_field("index", self.index)
                .with_field("row_len", row.len())
        })
    }

    /// Check if this column refers to `table.column`, ignoring case.
    pub fn refers_to(&self, table: &str, column: &str) -> bool {
        self.table.eq_ignore_ascii_case(table) && self.column.eq_ignore_ascii_case(column)
    }
}

impl fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.is_empty() {
            write!(f, "{}", self.column)
        } else {
            write!(f, "{}.{}", self.table, self.column)
        }
    }
}

/// A column reference that hasn't been bound to an input position yet.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnresolvedColumnExpr {
    pub table: Option<String>,
    pub column: String,
}

impl fmt::Display for UnresolvedColumnExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.table {
            Some(table) => write!(f, "{}.{}", table, self.column),
            None => write!(f, "{}", self.column),
        }
    }
}
