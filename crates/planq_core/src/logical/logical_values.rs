use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::{Field, Schema};
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Literal rows. Expressions are evaluated against the scope row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalValues {
    pub rows: Vec<Vec<Expression>>,
}

impl Explainable for LogicalValues {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Values", conf)
            .with_value("num_rows", self.rows.len())
            .with_values_if_verbose(
                "rows",
                self.rows.iter().map(|row| {
                    let exprs: Vec<_> = row.iter().map(|e| e.to_string()).collect();
                    format!("({})", exprs.join(", "))
                }),
            )
            .build()
    }
}

impl LogicalNode for Node<LogicalValues> {
    fn name(&self) -> &'static str {
        "Values"
    }

    fn output_schema(&self) -> Schema {
        match self.node.rows.first() {
            Some(row) => Schema::new(row.iter().enumerate().map(|(idx, expr)| {
                Field::new(format!("column{}", idx + 1), "", expr.datatype(), true)
            })),
            None => Schema::empty(),
        }
    }

    fn expected_children(&self) -> Option<usize> {
        Some(0)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for expr in self.node.rows.iter().flatten() {
            func(expr)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for expr in self.node.rows.iter_mut().flatten() {
            func(expr)?;
        }
        Ok(())
    }
}
