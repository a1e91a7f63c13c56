use std::sync::Arc;

use indexmap::IndexMap;

use super::operator::{LogicalNode, PlanRef};
use crate::arrays::field::Schema;

/// Identity of a plan node, derived from its allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn of(plan: &PlanRef) -> Self {
        NodeId(Arc::as_ptr(plan) as *const () as usize)
    }
}

/// Outer plan nodes whose output columns are visible to the plan being
/// analyzed, plus memoized nodes from enclosing analyses.
///
/// Columns visible through the scope come first in every row an expression
/// is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    /// Outermost first.
    nodes: Vec<PlanRef>,
    memos: IndexMap<NodeId, PlanRef>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a scope nested inside this one, with `node` as the innermost
    /// outer node.
    pub fn new_scope(&self, node: PlanRef) -> Scope {
        let mut scope = self.clone();
        scope.nodes.push(node);
        scope
    }

    /// Returns a copy of this scope remembering `node`.
    pub fn with_memo(&self, node: PlanRef) -> Scope {
        let mut scope = self.clone();
        scope.memos.insert(NodeId::of(&node), node);
        scope
    }

    pub fn with_memos(mut self, nodes: impl IntoIterator<Item = PlanRef>) -> Scope {
        for node in nodes {
            self.memos.insert(NodeId::of(&node), node);
        }
        self
    }

    pub fn memo(&self, id: NodeId) -> Option<&PlanRef> {
        self.memos.get(&id)
    }

    /// Memoized nodes in the order they were added.
    pub fn memo_nodes(&self) -> impl Iterator<Item = &PlanRef> {
        self.memos.values()
    }

    pub fn nodes(&self) -> &[PlanRef] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Schema of the columns contributed by the scope.
    pub fn schema(&self) -> Schema {
        let schemas: Vec<_> = self.nodes.iter().map(|n| n.output_schema()).collect();
        Schema::merge(&schemas)
    }

    pub fn num_columns(&self) -> usize {
        self.nodes.iter().map(|n| n.output_schema().len()).sum()
    }

    /// Lowercased names of the tables visible through the scope.
    pub fn sources(&self) -> Vec<String> {
        self.schema()
            .fields
            .iter()
            .map(|f| f.source.to_ascii_lowercase())
            .collect()
    }
}
