use std::fmt;

use super::Expression;

/// Assignment of `right` into the column referenced by `left`.
///
/// Only meaningful as an assignment in SET and UPDATE nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct SetFieldExpr {
    pub left: Box<Expression>,
    pub right: Box<Expression>,
}

impl fmt::Display for SetFieldExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SET {} = {}", self.left, self.right)
    }
}
