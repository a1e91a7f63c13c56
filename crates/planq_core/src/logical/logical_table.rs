use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// A table referenced by name that hasn't been looked up in the catalog yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalUnresolvedTable {
    /// Database to resolve in. Uses the current database if not set.
    pub database: Option<String>,
    pub name: String,
}

impl Explainable for LogicalUnresolvedTable {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("UnresolvedTable", conf)
            .with_value("name", &self.name)
            .build()
    }
}

impl LogicalNode for Node<LogicalUnresolvedTable> {
    fn name(&self) -> &'static str {
        "UnresolvedTable"
    }

    fn output_schema(&self) -> Schema {
        Schema::empty()
    }

    fn expected_children(&self) -> Option<usize> {
        Some(0)
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

/// Renames the table its child's columns are attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalTableAlias {
    pub alias: String,
}

impl Explainable for LogicalTableAlias {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("TableAlias", conf)
            .with_value("alias", &self.alias)
            .build()
    }
}

impl LogicalNode for Node<LogicalTableAlias> {
    fn name(&self) -> &'static str {
        "TableAlias"
    }

    fn output_schema(&self) -> Schema {
        self.child_schema(0).with_source(&self.node.alias)
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
