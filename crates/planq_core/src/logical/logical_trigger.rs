use std::fmt;

use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "insert"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerTime {
    Before,
    After,
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => write!(f, "before"),
            Self::After => write!(f, "after"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerOrderKind {
    Precedes,
    Follows,
}

/// `PRECEDES other` or `FOLLOWS other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TriggerOrder {
    pub kind: TriggerOrderKind,
    pub other_trigger: String,
}

impl fmt::Display for TriggerOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TriggerOrderKind::Precedes => write!(f, "PRECEDES {}", self.other_trigger),
            TriggerOrderKind::Follows => write!(f, "FOLLOWS {}", self.other_trigger),
        }
    }
}

/// Definition of a trigger. The only child is the trigger body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalCreateTrigger {
    pub name: String,
    pub table: String,
    pub event: TriggerEvent,
    pub time: TriggerTime,
    pub order: Option<TriggerOrder>,
    pub create_statement: String,
}

impl Explainable for LogicalCreateTrigger {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("CreateTrigger", conf)
            .with_value("name", &self.name)
            .with_value("table", &self.table)
            .with_value("event", self.event)
            .with_value("time", self.time);
        if let Some(order) = &self.order {
            builder = builder.with_value("order", order);
        }
        builder.build()
    }
}

impl LogicalNode for Node<LogicalCreateTrigger> {
    fn name(&self) -> &'static str {
        "CreateTrigger"
    }

    fn output_schema(&self) -> Schema {
        Schema::empty()
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

/// Runs compiled trigger logic (second child) for each row of the wrapped
/// node (first child).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalTriggerExecutor {
    pub trigger_name: String,
    pub event: TriggerEvent,
    pub time: TriggerTime,
}

impl Explainable for LogicalTriggerExecutor {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        EntryBuilder::new("TriggerExecutor", conf)
            .with_value("trigger", &self.trigger_name)
            .with_value("event", self.event)
            .with_value("time", self.time)
            .build()
    }
}

impl LogicalNode for Node<LogicalTriggerExecutor> {
    fn name(&self) -> &'static str {
        "TriggerExecutor"
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
