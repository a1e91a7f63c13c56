use std::fmt;

use planq_error::{DbError, Result};

use super::Expression;
use crate::arrays::datatype::DataType;
use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for ArithOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "+"),
            Self::Sub => write!(f, "-"),
            Self::Mul => write!(f, "*"),
            Self::Div => write!(f, "/"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArithExpr {
    pub op: ArithOperator,
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

impl ArithExpr {
    pub fn datatype(&self) -> DataType {
        DataType::promote(self.left.datatype(), self.right.datatype())
    }

    pub fn eval(&self, row: &[ScalarValue]) -> Result<ScalarValue> {
        let left = self.left.eval(row)?;
        let right = self.right.eval(row)?;
        if left.is_null() || right.is_null() {
            return Ok(ScalarValue::Null);
        }

        let overflow = || {
            DbError::new("Arithmetic overflow")
                .with_field("left", &left)
                .with_field("right", &right)
        };

        match DataType::promote(left.datatype(), right.datatype()) {
            DataType::Int32 => {
                let (a, b) = (left.try_as_i64()? as i32, right.try_as_i64()? as i32);
                let out = match self.op {
                    ArithOperator::Add => a.checked_add(b),
                    ArithOperator::Sub => a.checked_sub(b),
                    ArithOperator::Mul => a.checked_mul(b),
                    ArithOperator::Div if b == 0 => return Ok(ScalarValue::Null),
                    ArithOperator::Div => a.checked_div(b),
                };
                out.map(ScalarValue::Int32).ok_or_else(overflow)
            }
            DataType::Int64 => {
                let (a, b) = (left.try_as_i64()?, right.try_as_i64()?);
                let out = match self.op {
                    ArithOperator::Add => a.checked_add(b),
                    ArithOperator::Sub => a.checked_sub(b),
                    ArithOperator::Mul => a.checked_mul(b),
                    ArithOperator::Div if b == 0 => return Ok(ScalarValue::Null),
                    ArithOperator::Div => a.checked_div(b),
                };
                out.map(ScalarValue::Int64).ok_or_else(overflow)
            }
            DataType::Float64 => {
                let (a, b) = (left.try_as_f64()?, right.try_as_f64()?);
                Ok(ScalarValue::Float64(match self.op {
                    ArithOperator::Add => a + b,
                    ArithOperator::Sub => a - b,
                    ArithOperator::Mul => a * b,
                    ArithOperator::Div if b == 0.0 => return Ok(ScalarValue::Null),
                    ArithOperator::Div => a / b,
                }))
            }
            other => Err(DbError::new("Arithmetic on non-numeric type").with_field("type", other)),
        }
    }
}

impl fmt::Display for ArithExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {})", self.left, self.op, self.right)
    }
}
