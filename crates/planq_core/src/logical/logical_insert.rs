use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Insert rows from the second child into the table of the first child.
///
/// Emits each inserted row in the destination table's layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalInsert {
    /// Destination columns the source rows map to, in source column order.
    ///
    /// Empty means the source produces full table rows.
    pub columns: Vec<String>,
}

impl Explainable for LogicalInsert {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Insert", conf)
            .with_values_if_verbose("columns", &self.columns)
            .build()
    }
}

impl LogicalNode for Node<LogicalInsert> {
    fn name(&self) -> &'static str {
        "Insert"
    }

    fn output_schema(&self) -> Schema {
        self.child_schema(0)
    }

    fn expected_children(&self) -> Option<usize> {
        Some(2)
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
