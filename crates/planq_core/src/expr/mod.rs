pub mod arith_expr;
pub mod column_expr;
pub mod comparison_expr;
pub mod conjunction_expr;
pub mod literal_expr;
pub mod negate_expr;
pub mod set_field_expr;
pub mod trigger_column_expr;

use std::collections::BTreeSet;
use std::fmt;

use arith_expr::{ArithExpr, ArithOperator};
use column_expr::{ColumnExpr, UnresolvedColumnExpr};
use comparison_expr::{ComparisonExpr, ComparisonOperator};
use conjunction_expr::{ConjunctionExpr, ConjunctionOperator};
use literal_expr::LiteralExpr;
use negate_expr::{IsNullExpr, NotExpr};
use planq_error::{DbError, ErrorKind, Result};
use set_field_expr::SetFieldExpr;
use trigger_column_expr::{PseudoTable, TriggerColumnExpr};

use crate::arrays::datatype::DataType;
use crate::arrays::field::Field;
use crate::arrays::scalar::ScalarValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Column(ColumnExpr),
    UnresolvedColumn(UnresolvedColumnExpr),
    TriggerColumn(TriggerColumnExpr),
    Literal(LiteralExpr),
    Comparison(ComparisonExpr),
    Conjunction(ConjunctionExpr),
    Not(NotExpr),
    IsNull(IsNullExpr),
    Arith(ArithExpr),
    SetField(SetFieldExpr),
}

impl Expression {
    pub fn datatype(&self) -> DataType {
        match self {
            Self::Column(expr) => expr.datatype,
            Self::UnresolvedColumn(_) => DataType::Null,
            Self::TriggerColumn(expr) => expr.datatype(),
            Self::Literal(expr) => expr.literal.datatype(),
            Self::Comparison(_) => DataType::Boolean,
            Self::Conjunction(_) => DataType::Boolean,
            Self::Not(_) => DataType::Boolean,
            Self::IsNull(_) => DataType::Boolean,
            Self::Arith(expr) => expr.datatype(),
            Self::SetField(expr) => expr.right.datatype(),
        }
    }

    pub fn nullable(&self) -> bool {
        match self {
            Self::Column(expr) => expr.nullable,
            Self::Literal(expr) => expr.literal.is_null(),
            Self::IsNull(_) => false,
            _ => true,
        }
    }

    /// Field describing the output of this expression when used as a
    /// projection.
    pub fn output_field(&self) -> Field {
        match self {
            Self::Column(col) => Field::new(&col.column, &col.table, col.datatype, col.nullable),
            other => Field::new(other.to_string(), "", other.datatype(), other.nullable()),
        }
    }

    /// Evaluate the expression against a single row.
    pub fn eval(&self, row: &[ScalarValue]) -> Result<ScalarValue> {
        match self {
            Self::Column(expr) => expr.eval(row),
            Self::Literal(expr) => Ok(expr.literal.clone()),
            Self::Comparison(expr) => expr.eval(row),
            Self::Conjunction(expr) => expr.eval(row),
            Self::Not(expr) => expr.eval(row),
            Self::IsNull(expr) => expr.eval(row),
            Self::Arith(expr) => expr.eval(row),
            Self::SetField(expr) => expr.right.eval(row),
            Self::UnresolvedColumn(expr) => Err(DbError::with_kind(
                ErrorKind::ColumnNotFound,
                "Cannot evaluate unresolved column",
            )
            .with_field("column", expr)),
            Self::TriggerColumn(expr) => Err(DbError::new(
                "Trigger column placeholders cannot be evaluated",
            )
            .with_field("column", expr)),
        }
    }

    /// Evaluate as a predicate. Only a non-null true passes.
    pub fn eval_predicate(&self, row: &[ScalarValue]) -> Result<bool> {
        match self.eval(row)? {
            ScalarValue::Null => Ok(false),
            other => other.try_as_bool(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match self {
            Self::UnresolvedColumn(_) => false,
            other => other.children().iter().all(|c| c.is_resolved()),
        }
    }

    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Self::Column(_)
            | Self::UnresolvedColumn(_)
            | Self::TriggerColumn(_)
            | Self::Literal(_) => Vec::new(),
            Self::Comparison(expr) => vec![expr.left.as_ref(), expr.right.as_ref()],
            Self::Conjunction(expr) => expr.expressions.iter().collect(),
            Self::Not(expr) => vec![expr.expr.as_ref()],
            Self::IsNull(expr) => vec![expr.expr.as_ref()],
            Self::Arith(expr) => vec![expr.left.as_ref(), expr.right.as_ref()],
            Self::SetField(expr) => vec![expr.left.as_ref(), expr.right.as_ref()],
        }
    }

    pub fn for_each_child<'a, F>(&'a self, func: &mut F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        match self {
            Self::Column(_)
            | Self::UnresolvedColumn(_)
            | Self::TriggerColumn(_)
            | Self::Literal(_) => (),
            Self::Comparison(expr) => {
                func(expr.left.as_ref())?;
                func(expr.right.as_ref())?;
            }
            Self::Conjunction(expr) => {
                for child in &expr.expressions {
                    func(child)?;
                }
            }
            Self::Not(expr) => func(expr.expr.as_ref())?,
            Self::IsNull(expr) => func(expr.expr.as_ref())?,
            Self::Arith(expr) => {
                func(expr.left.as_ref())?;
                func(expr.right.as_ref())?;
            }
            Self::SetField(expr) => {
                func(expr.left.as_ref())?;
                func(expr.right.as_ref())?;
            }
        }
        Ok(())
    }

    pub fn for_each_child_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Expression) -> Result<()>,
    {
        match self {
            Self::Column(_)
            | Self::UnresolvedColumn(_)
            | Self::TriggerColumn(_)
            | Self::Literal(_) => (),
            Self::Comparison(expr) => {
                func(expr.left.as_mut())?;
                func(expr.right.as_mut())?;
            }
            Self::Conjunction(expr) => {
                for child in &mut expr.expressions {
                    func(child)?;
                }
            }
            Self::Not(expr) => func(expr.expr.as_mut())?,
            Self::IsNull(expr) => func(expr.expr.as_mut())?,
            Self::Arith(expr) => {
                func(expr.left.as_mut())?;
                func(expr.right.as_mut())?;
            }
            Self::SetField(expr) => {
                func(expr.left.as_mut())?;
                func(expr.right.as_mut())?;
            }
        }
        Ok(())
    }

    /// Rebuild this expression with a new set of children.
    ///
    /// Errors if the number of children doesn't match what the expression
    /// expects.
    pub fn with_new_children(&self, children: Vec<Expression>) -> Result<Expression> {
        let expected = self.children().len();
        if children.len() != expected {
            return Err(DbError::from(ErrorKind::InvalidChildrenNumber {
                name: self.name(),
                got: children.len(),
                expected,
            }));
        }

        let mut out = self.clone();
        let mut iter = children.into_iter();
        out.for_each_child_mut(&mut |child| {
            if let Some(new_child) = iter.next() {
                *child = new_child;
            }
            Ok(())
        })?;

        Ok(out)
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Column(_) => "Column",
            Self::UnresolvedColumn(_) => "UnresolvedColumn",
            Self::TriggerColumn(_) => "TriggerColumn",
            Self::Literal(_) => "Literal",
            Self::Comparison(_) => "Comparison",
            Self::Conjunction(_) => "Conjunction",
            Self::Not(_) => "Not",
            Self::IsNull(_) => "IsNull",
            Self::Arith(_) => "Arith",
            Self::SetField(_) => "SetField",
        }
    }

    /// Post-order rewrite of the expression tree.
    ///
    /// Children are rewritten before their parent is passed to `func`.
    pub fn transform_up<F>(&self, func: &mut F) -> Result<Expression>
    where
        F: FnMut(Expression) -> Result<Expression>,
    {
        let mut expr = self.clone();
        expr.for_each_child_mut(&mut |child| {
            *child = child.transform_up(func)?;
            Ok(())
        })?;
        func(expr)
    }

    /// Visit every expression in the tree, parents before children.
    pub fn walk<'a, F>(&'a self, func: &mut F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        func(self)?;
        self.for_each_child(&mut |child| child.walk(func))
    }

    /// All resolved column references in the expression.
    pub fn column_refs(&self) -> Vec<&ColumnExpr> {
        fn inner<'a>(expr: &'a Expression, out: &mut Vec<&'a ColumnExpr>) {
            match expr {
                Expression::Column(col) => out.push(col),
                other => {
                    for child in other.children() {
                        inner(child, out);
                    }
                }
            }
        }

        let mut cols = Vec::new();
        inner(self, &mut cols);
        cols
    }

    /// Lowercased names of the tables referenced by resolved columns.
    pub fn referenced_tables(&self) -> BTreeSet<String> {
        self.column_refs()
            .into_iter()
            .map(|col| col.table.to_ascii_lowercase())
            .collect()
    }

    /// If this expression references NEW or OLD through placeholders.
    pub fn has_trigger_columns(&self) -> bool {
        match self {
            Self::TriggerColumn(_) => true,
            other => other.children().iter().any(|c| c.has_trigger_columns()),
        }
    }

    pub fn try_as_column(&self) -> Result<&ColumnExpr> {
        match self {
            Self::Column(col) => Ok(col),
            other => Err(DbError::new("Expected a column expression").with_field("expr", other)),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(expr) => expr.fmt(f),
            Self::UnresolvedColumn(expr) => expr.fmt(f),
            Self::TriggerColumn(expr) => expr.fmt(f),
            Self::Literal(expr) => expr.fmt(f),
            Self::Comparison(expr) => expr.fmt(f),
            Self::Conjunction(expr) => expr.fmt(f),
            Self::Not(expr) => expr.fmt(f),
            Self::IsNull(expr) => expr.fmt(f),
            Self::Arith(expr) => expr.fmt(f),
            Self::SetField(expr) => expr.fmt(f),
        }
    }
}

impl From<ColumnExpr> for Expression {
    fn from(value: ColumnExpr) -> Self {
        Expression::Column(value)
    }
}

impl From<ScalarValue> for Expression {
    fn from(value: ScalarValue) -> Self {
        Expression::Literal(LiteralExpr { literal: value })
    }
}

/// Resolved column reference.
pub fn col(
    index: usize,
    table: impl Into<String>,
    column: impl Into<String>,
    datatype: DataType,
) -> Expression {
    Expression::Column(ColumnExpr {
        index,
        table: table.into(),
        column: column.into(),
        datatype,
        nullable: true,
    })
}

/// Unresolved column reference, optionally qualified with a table.
pub fn unresolved(table: Option<&str>, column: impl Into<String>) -> Expression {
    Expression::UnresolvedColumn(UnresolvedColumnExpr {
        table: table.map(|t| t.to_string()),
        column: column.into(),
    })
}

pub fn trigger_col(table: PseudoTable, column: impl Into<String>) -> Expression {
    Expression::TriggerColumn(TriggerColumnExpr {
        table,
        column: column.into(),
    })
}

pub fn lit(value: impl Into<ScalarValue>) -> Expression {
    Expression::Literal(LiteralExpr {
        literal: value.into(),
    })
}

pub fn compare(op: ComparisonOperator, left: Expression, right: Expression) -> Expression {
    Expression::Comparison(ComparisonExpr {
        left: Box::new(left),
        right: Box::new(right),
        op,
    })
}

pub fn eq(left: Expression, right: Expression) -> Expression {
    compare(ComparisonOperator::Eq, left, right)
}

pub fn not_eq(left: Expression, right: Expression) -> Expression {
    compare(ComparisonOperator::NotEq, left, right)
}

pub fn lt(left: Expression, right: Expression) -> Expression {
    compare(ComparisonOperator::Lt, left, right)
}

pub fn gt(left: Expression, right: Expression) -> Expression {
    compare(ComparisonOperator::Gt, left, right)
}

/// AND together expressions. Returns None if there are no expressions.
pub fn and(exprs: impl IntoIterator<Item = Expression>) -> Option<Expression> {
    conjunction(ConjunctionOperator::And, exprs)
}

/// OR together expressions. Returns None if there are no expressions.
pub fn or(exprs: impl IntoIterator<Item = Expression>) -> Option<Expression> {
    conjunction(ConjunctionOperator::Or, exprs)
}

fn conjunction(
    op: ConjunctionOperator,
    exprs: impl IntoIterator<Item = Expression>,
) -> Option<Expression> {
    let mut exprs: Vec<_> = exprs.into_iter().collect();
    match exprs.len() {
        0 => None,
        1 => exprs.pop(),
        _ => Some(Expression::Conjunction(ConjunctionExpr {
            op,
            expressions: exprs,
        })),
    }
}

pub fn not(expr: Expression) -> Expression {
    Expression::Not(NotExpr {
        expr: Box::new(expr),
    })
}

pub fn is_null(expr: Expression) -> Expression {
    Expression::IsNull(IsNullExpr {
        expr: Box::new(expr),
    })
}

pub fn arith(op: ArithOperator, left: Expression, right: Expression) -> Expression {
    Expression::Arith(ArithExpr {
        op,
        left: Box::new(left),
        right: Box::new(right),
    })
}

pub fn set_field(left: Expression, right: Expression) -> Expression {
    Expression::SetField(SetFieldExpr {
        left: Box::new(left),
        right: Box::new(right),
    })
}

/// Recursively split an expression on AND, putting the split expressions in
/// `out`.
pub fn split_conjunction(expr: Expression, out: &mut Vec<Expression>) {
    match expr {
        Expression::Conjunction(ConjunctionExpr {
            expressions,
            op: ConjunctionOperator::And,
        }) => {
            for expr in expressions {
                split_conjunction(expr, out);
            }
        }
        other => out.push(other),
    }
}
