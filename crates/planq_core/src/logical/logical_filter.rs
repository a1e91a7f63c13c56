use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

#[derive(Debug, Clone, PartialEq)]
pub struct LogicalFilter {
    pub filter: Expression,
}

impl Explainable for LogicalFilter {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Filter", conf)
            .with_value("predicate", &self.filter)
            .build()
    }
}

impl LogicalNode for Node<LogicalFilter> {
    fn name(&self) -> &'static str {
        "Filter"
    }

    fn output_schema(&self) -> Schema {
        self.child_schema(0)
    }

    fn expected_children(&self) -> Option<usize> {
        Some(1)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        func(&self.node.filter)
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        func(&mut self.node.filter)
    }
}
