use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Write `old ++ new` rows produced by its child back to the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalUpdate;

impl Explainable for LogicalUpdate {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Update", conf).build()
    }
}

impl LogicalNode for Node<LogicalUpdate> {
    fn name(&self) -> &'static str {
        "Update"
    }

    fn output_schema(&self) -> Schema {
        self.child_schema(0)
    }

    fn expected_children(&self) -> Option<usize> {
        Some(1)
    }

    fn for_each_expr<'a, F>(&'a self, _func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, _func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        Ok(())
    }
}

/// Applies assignments to each row of its child, emitting `old ++ new`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalUpdateSource {
    /// Set field expressions. The left side of each references a column of
    /// the child.
    pub assignments: Vec<Expression>,
}

impl Explainable for LogicalUpdateSource {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("UpdateSource", conf)
            .with_values("assignments", &self.assignments)
            .build()
    }
}

impl LogicalNode for Node<LogicalUpdateSource> {
    fn name(&self) -> &'static str {
        "UpdateSource"
    }

    fn output_schema(&self) -> Schema {
        let child = self.child_schema(0);
        child.concat(&child)
    }

    fn expected_children(&self) -> Option<usize> {
        Some(1)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        for expr in &self.node.assignments {
            func(expr)?;
        }
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        for expr in &mut self.node.assignments {
            func(expr)?;
        }
        Ok(())
    }
}
