use std::fmt;

use planq_error::Result;

use super::Expression;
use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConjunctionOperator {
    And,
    Or,
}

impl fmt::Display for ConjunctionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::And => write!(f, "AND"),
            Self::Or => write!(f, "OR"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConjunctionExpr {
    pub op: ConjunctionOperator,
    pub expressions: Vec<Expression>,
}

impl ConjunctionExpr {
    /// Evaluate using three-valued logic.
    ///
    /// AND is false if any input is false, NULL if any input is NULL, and true
    /// otherwise. OR mirrors that with true.
    pub fn eval(&self, row: &[ScalarValue]) -> Result<ScalarValue> {
        let short_circuit = match self.op {
            ConjunctionOperator::And => false,
            ConjunctionOperator::Or => true,
        };

        let mut saw_null = false;
        for expr in &self.expressions {
            match expr.eval(row)? {
                ScalarValue::Null => saw_null = true,
                other => {
                    if other.try_as_bool()? == short_circuit {
                        return Ok(ScalarValue::Boolean(short_circuit));
                    }
                }
            }
        }

        if saw_null {
            Ok(ScalarValue::Null)
        } else {
            Ok(ScalarValue::Boolean(!short_circuit))
        }
    }
}

impl fmt::Display for ConjunctionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (idx, expr) in self.expressions.iter().enumerate() {
            if idx > 0 {
                write!(f, " {} ", self.op)?;
            }
            write!(f, "{expr}")?;
        }
        write!(f, ")")
    }
}
