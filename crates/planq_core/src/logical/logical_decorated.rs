use std::fmt;

use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// What a decoration describes.
///
/// A table access chain carries at most one decoration of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecorationKind {
    Projection,
    Filter,
    IndexLookup,
}

impl DecorationKind {
    pub fn describe(&self, items: &[String]) -> String {
        let prefix = match self {
            Self::Projection => "Projected table access on",
            Self::Filter => "Filtered table access on",
            Self::IndexLookup => "Indexed table access on",
        };
        format!("{prefix} [{}]", items.join(", "))
    }
}

impl fmt::Display for DecorationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Projection => write!(f, "projection"),
            Self::Filter => write!(f, "filter"),
            Self::IndexLookup => write!(f, "index_lookup"),
        }
    }
}

/// Passthrough node carrying a human readable description of an access
/// optimization applied to the table below it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalDecorated {
    pub kind: DecorationKind,
    pub description: String,
}

impl Explainable for LogicalDecorated {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Decorated", conf)
            .with_value("description", &self.description)
            .with_value_if_verbose("kind", self.kind)
            .build()
    }
}

impl LogicalNode for Node<LogicalDecorated> {
    fn name(&self) -> &'static str {
        "Decorated"
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
