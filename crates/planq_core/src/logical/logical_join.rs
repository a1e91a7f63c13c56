use std::fmt;

use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinType {
    /// Standard INNER join.
    Inner,
    /// Standard LEFT join.
    Left,
    /// Standard RIGHT join.
    Right,
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inner => write!(f, "INNER"),
            Self::Left => write!(f, "LEFT"),
            Self::Right => write!(f, "RIGHT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalCrossJoin;

impl Explainable for LogicalCrossJoin {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("CrossJoin", conf).build()
    }
}

impl LogicalNode for Node<LogicalCrossJoin> {
    fn name(&self) -> &'static str {
        "CrossJoin"
    }

    fn output_schema(&self) -> Schema {
        self.children_schema()
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

/// Join of two inputs on an arbitrary condition.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalJoin {
    pub join_type: JoinType,
    /// Evaluated against `scope ++ left ++ right`.
    pub condition: Expression,
}

impl Explainable for LogicalJoin {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("Join", conf)
            .with_value("join_type", self.join_type)
            .with_value("condition", &self.condition)
            .build()
    }
}

impl LogicalNode for Node<LogicalJoin> {
    fn name(&self) -> &'static str {
        "Join"
    }

    fn output_schema(&self) -> Schema {
        let left = self.child_schema(0);
        let right = self.child_schema(1);
        match self.node.join_type {
            JoinType::Inner => left.concat(&right),
            JoinType::Left => left.concat(&right.into_nullable()),
            JoinType::Right => left.into_nullable().concat(&right),
        }
    }

    fn expected_children(&self) -> Option<usize> {
        Some(2)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        func(&self.node.condition)
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        func(&mut self.node.condition)
    }
}

/// Nested loop join where the secondary (second child) is reopened for every
/// primary (first child) row, with `scope ++ primary row` as its parent row.
///
/// Output rows are `primary ++ secondary`. LEFT and RIGHT both mean the
/// primary side is preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct LogicalIndexedJoin {
    pub join_type: JoinType,
    /// Evaluated against `scope ++ primary ++ secondary`.
    pub condition: Expression,
}

impl Explainable for LogicalIndexedJoin {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("IndexedJoin", conf)
            .with_value("join_type", self.join_type)
            .with_value("condition", &self.condition)
            .build()
    }
}

impl LogicalNode for Node<LogicalIndexedJoin> {
    fn name(&self) -> &'static str {
        "IndexedJoin"
    }

    fn output_schema(&self) -> Schema {
        let primary = self.child_schema(0);
        let secondary = self.child_schema(1);
        match self.node.join_type {
            JoinType::Inner => primary.concat(&secondary),
            JoinType::Left | JoinType::Right => primary.concat(&secondary.into_nullable()),
        }
    }

    fn expected_children(&self) -> Option<usize> {
        Some(2)
    }

    fn for_each_expr<'a, F>(&'a self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        func(&self.node.condition)
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, mut func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        func(&mut self.node.condition)
    }
}
