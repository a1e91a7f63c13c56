use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Delete every row produced by the child from the target table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalDelete;

impl Explainable for LogicalDelete {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Delete", conf).build()
    }
}

impl LogicalNode for Node<LogicalDelete> {
    fn name(&self) -> &'static str {
        "Delete"
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
