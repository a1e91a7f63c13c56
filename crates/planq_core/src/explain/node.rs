use std::fmt;

use serde::{Deserialize, Serialize};

use super::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::logical::operator::LogicalOperator;

/// Tree of explain entries mirroring a plan.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExplainNode {
    pub entry: ExplainEntry,
    pub children: Vec<ExplainNode>,
}

impl ExplainNode {
    pub fn new_from_logical_plan(verbose: bool, root: &LogicalOperator) -> Self {
        let config = ExplainConfig { verbose };
        Self::walk_logical(config, root)
    }

    fn walk_logical(config: ExplainConfig, plan: &LogicalOperator) -> Self {
        let entry = plan.explain_entry(config);
        let children = plan
            .children()
            .iter()
            .map(|child| Self::walk_logical(config, child))
            .collect();

        ExplainNode { entry, children }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.entry, indent = depth * 2)?;
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

/// One entry per line, children indented under their parent.
impl fmt::Display for ExplainNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
