use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Assignments into the scope row.
///
/// Inside a trigger this is how NEW columns are modified. Produces a single
/// row: the scope row after the assignments.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalSet {
    pub assignments: Vec<Expression>,
}

impl Explainable for LogicalSet {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Set", conf)
            .with_values("assignments", &self.assignments)
            .build()
    }
}

impl LogicalNode for Node<LogicalSet> {
    fn name(&self) -> &'static str {
        "Set"
    }

    fn output_schema(&self) -> Schema {
        Schema::empty()
    }

    fn expected_children(&self) -> Option<usize> {
        Some(0)
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

/// Statements executed in order against the scope row.
///
/// SET statements update the scope row seen by later statements. Like
/// [`LogicalSet`], produces the final scope row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalBlock;

impl Explainable for LogicalBlock {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Block", conf).build()
    }
}

impl LogicalNode for Node<LogicalBlock> {
    fn name(&self) -> &'static str {
        "Block"
    }

    fn output_schema(&self) -> Schema {
        Schema::empty()
    }

    fn expected_children(&self) -> Option<usize> {
        None
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
