use std::fmt;

use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub struct LiteralExpr {
    pub literal: ScalarValue,
}

impl fmt::Display for LiteralExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            ScalarValue::Utf8(s) => write!(f, "'{s}'"),
            other => write!(f, "{other}"),
        }
    }
}
