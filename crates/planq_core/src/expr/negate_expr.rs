use std::fmt;

use planq_error::Result;

use super::Expression;
use crate::arrays::scalar::ScalarValue;

/// Logical NOT.
#[derive(Debug, Clone, PartialEq)]
pub struct NotExpr {
    pub expr: Box<Expression>,
}

impl NotExpr {
    pub fn eval(&self, row: &[ScalarValue]) -> Result<ScalarValue> {
        match self.expr.eval(row)? {
            ScalarValue::Null => Ok(ScalarValue::Null),
            other => Ok(ScalarValue::Boolean(!other.try_as_bool()?)),
        }
    }
}

impl fmt::Display for NotExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NOT({})", self.expr)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IsNullExpr {
    pub expr: Box<Expression>,
}

impl IsNullExpr {
    pub fn eval(&self, row: &[ScalarValue]) -> Result<ScalarValue> {
        Ok(ScalarValue::Boolean(self.expr.eval(row)?.is_null()))
    }
}

impl fmt::Display for IsNullExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} IS NULL", self.expr)
    }
}
