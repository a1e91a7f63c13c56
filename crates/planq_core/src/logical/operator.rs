use std::sync::Arc;

use planq_error::{DbError, ErrorKind, Result};

use super::logical_decorated::LogicalDecorated;
use super::logical_delete::LogicalDelete;
use super::logical_filter::LogicalFilter;
use super::logical_insert::LogicalInsert;
use super::logical_join::{LogicalCrossJoin, LogicalIndexedJoin, LogicalJoin};
use super::logical_project::LogicalProject;
use super::logical_scan::LogicalScan;
use super::logical_set::{LogicalBlock, LogicalSet};
use super::logical_table::{LogicalTableAlias, LogicalUnresolvedTable};
use super::logical_trigger::{LogicalCreateTrigger, LogicalTriggerExecutor, TriggerEvent};
use super::logical_update::{LogicalUpdate, LogicalUpdateSource};
use super::logical_values::LogicalValues;
use crate::arrays::field::Schema;
use crate::explain::explainable::{ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Shared reference to an immutable plan node.
///
/// Rewrites never mutate a node in place. A rewritten subtree is a new set of
/// nodes sharing unchanged children with the original.
pub type PlanRef = Arc<LogicalOperator>;

/// Common operations across all logical nodes in a plan.
///
/// For individual operators, this should be implemented on `Node<T>` and not
/// `T`.
///
/// This is implemented on `LogicalOperator` for convenience.
pub trait LogicalNode {
    /// Name of the operator.
    fn name(&self) -> &'static str;

    /// Schema of the rows this node produces, not including any outer scope.
    fn output_schema(&self) -> Schema;

    /// Number of children this node requires, or `None` if any number is
    /// accepted.
    fn expected_children(&self) -> Option<usize>;

    /// Expressions owned by this node that are evaluated against
    /// `scope ++ children`.
    fn for_each_expr<'a, F>(&'a self, func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>;

    fn for_each_expr_mut<'a, F>(&'a mut self, func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>;
}

/// Wrapper around nodes in the logical plan holding the node's inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<N> {
    /// Node specific logic.
    pub node: N,
    /// Inputs to this node.
    pub children: Vec<PlanRef>,
}

impl<N> Node<N> {
    pub fn new(node: N, children: Vec<PlanRef>) -> Self {
        Node { node, children }
    }

    pub fn into_inner(self) -> N {
        self.node
    }

    pub fn get_one_child_exact(&self) -> Result<&PlanRef> {
        if self.children.len() != 1 {
            return Err(DbError::new(format!(
                "Expected 1 child to operator, have {}",
                self.children.len()
            )));
        }
        Ok(&self.children[0])
    }

    pub fn get_two_children_exact(&self) -> Result<[&PlanRef; 2]> {
        if self.children.len() != 2 {
            return Err(DbError::new(format!(
                "Expected 2 children to operator, have {}",
                self.children.len()
            )));
        }
        Ok([&self.children[0], &self.children[1]])
    }

    pub fn get_nth_child(&self, n: usize) -> Result<&PlanRef> {
        if self.children.len() < n + 1 {
            return Err(DbError::new(format!(
                "Expected at least {} children, got {}",
                n + 1,
                self.children.len()
            )));
        }
        Ok(&self.children[n])
    }

    /// Schemas of all children concatenated in order.
    pub fn children_schema(&self) -> Schema {
        let schemas: Vec<_> = self.children.iter().map(|c| c.output_schema()).collect();
        Schema::merge(&schemas)
    }

    /// Schema of the child at `n`, or an empty schema if there is no such
    /// child.
    pub fn child_schema(&self, n: usize) -> Schema {
        self.children
            .get(n)
            .map(|c| c.output_schema())
            .unwrap_or_default()
    }
}

impl<N> Explainable for Node<N>
where
    N: Explainable,
{
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        self.node.explain_entry(conf)
    }
}

impl<N> AsRef<N> for Node<N> {
    fn as_ref(&self) -> &N {
        &self.node
    }
}

impl<N> AsMut<N> for Node<N> {
    fn as_mut(&mut self) -> &mut N {
        &mut self.node
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalOperator {
    Project(Node<LogicalProject>),
    Filter(Node<LogicalFilter>),
    CrossJoin(Node<LogicalCrossJoin>),
    Join(Node<LogicalJoin>),
    IndexedJoin(Node<LogicalIndexedJoin>),
    Scan(Node<LogicalScan>),
    UnresolvedTable(Node<LogicalUnresolvedTable>),
    TableAlias(Node<LogicalTableAlias>),
    Decorated(Node<LogicalDecorated>),
    Values(Node<LogicalValues>),
    Insert(Node<LogicalInsert>),
    Update(Node<LogicalUpdate>),
    UpdateSource(Node<LogicalUpdateSource>),
    Delete(Node<LogicalDelete>),
    Set(Node<LogicalSet>),
    Block(Node<LogicalBlock>),
    CreateTrigger(Node<LogicalCreateTrigger>),
    TriggerExecutor(Node<LogicalTriggerExecutor>),
}

impl LogicalOperator {
    pub fn into_ref(self) -> PlanRef {
        Arc::new(self)
    }

    pub fn children(&self) -> &[PlanRef] {
        match self {
            Self::Project(n) => &n.children,
            Self::Filter(n) => &n.children,
            Self::CrossJoin(n) => &n.children,
            Self::Join(n) => &n.children,
            Self::IndexedJoin(n) => &n.children,
            Self::Scan(n) => &n.children,
            Self::UnresolvedTable(n) => &n.children,
            Self::TableAlias(n) => &n.children,
            Self::Decorated(n) => &n.children,
            Self::Values(n) => &n.children,
            Self::Insert(n) => &n.children,
            Self::Update(n) => &n.children,
            Self::UpdateSource(n) => &n.children,
            Self::Delete(n) => &n.children,
            Self::Set(n) => &n.children,
            Self::Block(n) => &n.children,
            Self::CreateTrigger(n) => &n.children,
            Self::TriggerExecutor(n) => &n.children,
        }
    }

    fn children_mut(&mut self) -> &mut Vec<PlanRef> {
        match self {
            Self::Project(n) => &mut n.children,
            Self::Filter(n) => &mut n.children,
            Self::CrossJoin(n) => &mut n.children,
            Self::Join(n) => &mut n.children,
            Self::IndexedJoin(n) => &mut n.children,
            Self::Scan(n) => &mut n.children,
            Self::UnresolvedTable(n) => &mut n.children,
            Self::TableAlias(n) => &mut n.children,
            Self::Decorated(n) => &mut n.children,
            Self::Values(n) => &mut n.children,
            Self::Insert(n) => &mut n.children,
            Self::Update(n) => &mut n.children,
            Self::UpdateSource(n) => &mut n.children,
            Self::Delete(n) => &mut n.children,
            Self::Set(n) => &mut n.children,
            Self::Block(n) => &mut n.children,
            Self::CreateTrigger(n) => &mut n.children,
            Self::TriggerExecutor(n) => &mut n.children,
        }
    }

    /// Returns a copy of this node with its children replaced.
    ///
    /// Errors if the number of children doesn't match what the node requires.
    pub fn with_new_children(&self, children: Vec<PlanRef>) -> Result<PlanRef> {
        if let Some(expected) = self.expected_children() {
            if children.len() != expected {
                return Err(DbError::from(ErrorKind::InvalidChildrenNumber {
                    name: self.name(),
                    got: children.len(),
                    expected,
                }));
            }
        } else if children.is_empty() {
            return Err(DbError::from(ErrorKind::InvalidChildrenNumber {
                name: self.name(),
                got: 0,
                expected: 1,
            }));
        }

        let mut node = self.clone();
        *node.children_mut() = children;
        Ok(Arc::new(node))
    }

    /// Returns a copy of this node with the expressions it owns rewritten.
    pub fn with_exprs_mut<F>(&self, mut func: F) -> Result<LogicalOperator>
    where
        F: FnMut(&mut Expression) -> Result<()>,
    {
        let mut node = self.clone();
        node.for_each_expr_mut(|expr| func(expr))?;
        Ok(node)
    }

    /// Whether the child at `idx` is planned in its own scope and must not be
    /// visited by rules operating on this node's scope.
    ///
    /// This is the body of a trigger definition and the compiled logic of a
    /// trigger executor.
    pub fn is_opaque_child(&self, idx: usize) -> bool {
        matches!(
            (self, idx),
            (Self::CreateTrigger(_), 0) | (Self::TriggerExecutor(_), 1)
        )
    }

    /// Check if this node (not its children) is fully resolved.
    pub fn is_resolved(&self) -> bool {
        if matches!(self, Self::UnresolvedTable(_)) {
            return false;
        }
        let mut resolved = true;
        let _ = self.for_each_expr(|expr| {
            resolved &= expr.is_resolved();
            Ok(())
        });
        resolved
    }

    /// Event this node performs if it mutates a table.
    pub fn mutation_event(&self) -> Option<TriggerEvent> {
        match self {
            Self::Insert(_) => Some(TriggerEvent::Insert),
            Self::Update(_) => Some(TriggerEvent::Update),
            Self::Delete(_) => Some(TriggerEvent::Delete),
            _ => None,
        }
    }

    /// The table node (scan or unresolved table) a mutation targets.
    pub fn mutation_target(&self) -> Option<&PlanRef> {
        match self {
            Self::Insert(n) => n.children.first().and_then(base_table),
            Self::Update(n) => n.children.first().and_then(base_table),
            Self::Delete(n) => n.children.first().and_then(base_table),
            _ => None,
        }
    }

    /// Name of the table a mutation targets.
    pub fn mutation_table_name(&self) -> Option<&str> {
        self.mutation_target().and_then(|t| table_name(t))
    }
}

/// Walk down the first input of row-preserving nodes until reaching a table.
pub fn base_table(plan: &PlanRef) -> Option<&PlanRef> {
    match plan.as_ref() {
        LogicalOperator::Scan(_) | LogicalOperator::UnresolvedTable(_) => Some(plan),
        LogicalOperator::Filter(n) => n.children.first().and_then(base_table),
        LogicalOperator::Decorated(n) => n.children.first().and_then(base_table),
        LogicalOperator::TableAlias(n) => n.children.first().and_then(base_table),
        LogicalOperator::UpdateSource(n) => n.children.first().and_then(base_table),
        LogicalOperator::TriggerExecutor(n) => n.children.first().and_then(base_table),
        _ => None,
    }
}

/// Unaliased name of a scan or unresolved table node.
pub fn table_name(plan: &PlanRef) -> Option<&str> {
    match plan.as_ref() {
        LogicalOperator::Scan(n) => Some(n.node.table_name()),
        LogicalOperator::UnresolvedTable(n) => Some(n.node.name.as_str()),
        _ => None,
    }
}

impl LogicalNode for LogicalOperator {
    fn name(&self) -> &'static str {
        match self {
            Self::Project(n) => n.name(),
            Self::Filter(n) => n.name(),
            Self::CrossJoin(n) => n.name(),
            Self::Join(n) => n.name(),
            Self::IndexedJoin(n) => n.name(),
            Self::Scan(n) => n.name(),
            Self::UnresolvedTable(n) => n.name(),
            Self::TableAlias(n) => n.name(),
            Self::Decorated(n) => n.name(),
            Self::Values(n) => n.name(),
            Self::Insert(n) => n.name(),
            Self::Update(n) => n.name(),
            Self::UpdateSource(n) => n.name(),
            Self::Delete(n) => n.name(),
            Self::Set(n) => n.name(),
            Self::Block(n) => n.name(),
            Self::CreateTrigger(n) => n.name(),
            Self::TriggerExecutor(n) => n.name(),
        }
    }

    fn output_schema(&self) -> Schema {
        match self {
            Self::Project(n) => n.output_schema(),
            Self::Filter(n) => n.output_schema(),
            Self::CrossJoin(n) => n.output_schema(),
            Self::Join(n) => n.output_schema(),
            Self::IndexedJoin(n) => n.output_schema(),
            Self::Scan(n) => n.output_schema(),
            Self::UnresolvedTable(n) => n.output_schema(),
            Self::TableAlias(n) => n.output_schema(),
            Self::Decorated(n) => n.output_schema(),
            Self::Values(n) => n.output_schema(),
            Self::Insert(n) => n.output_schema(),
            Self::Update(n) => n.output_schema(),
            Self::UpdateSource(n) => n.output_schema(),
            Self::Delete(n) => n.output_schema(),
            Self::Set(n) => n.output_schema(),
            Self::Block(n) => n.output_schema(),
            Self::CreateTrigger(n) => n.output_schema(),
            Self::TriggerExecutor(n) => n.output_schema(),
        }
    }

    fn expected_children(&self) -> Option<usize> {
        match self {
            Self::Project(n) => n.expected_children(),
            Self::Filter(n) => n.expected_children(),
            Self::CrossJoin(n) => n.expected_children(),
            Self::Join(n) => n.expected_children(),
            Self::IndexedJoin(n) => n.expected_children(),
            Self::Scan(n) => n.expected_children(),
            Self::UnresolvedTable(n) => n.expected_children(),
            Self::TableAlias(n) => n.expected_children(),
            Self::Decorated(n) => n.expected_children(),
            Self::Values(n) => n.expected_children(),
            Self::Insert(n) => n.expected_children(),
            Self::Update(n) => n.expected_children(),
            Self::UpdateSource(n) => n.expected_children(),
            Self::Delete(n) => n.expected_children(),
            Self::Set(n) => n.expected_children(),
            Self::Block(n) => n.expected_children(),
            Self::CreateTrigger(n) => n.expected_children(),
            Self::TriggerExecutor(n) => n.expected_children(),
        }
    }

    fn for_each_expr<'a, F>(&'a self, func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        match self {
            Self::Project(n) => n.for_each_expr(func),
            Self::Filter(n) => n.for_each_expr(func),
            Self::CrossJoin(n) => n.for_each_expr(func),
            Self::Join(n) => n.for_each_expr(func),
            Self::IndexedJoin(n) => n.for_each_expr(func),
            Self::Scan(n) => n.for_each_expr(func),
            Self::UnresolvedTable(n) => n.for_each_expr(func),
            Self::TableAlias(n) => n.for_each_expr(func),
            Self::Decorated(n) => n.for_each_expr(func),
            Self::Values(n) => n.for_each_expr(func),
            Self::Insert(n) => n.for_each_expr(func),
            Self::Update(n) => n.for_each_expr(func),
            Self::UpdateSource(n) => n.for_each_expr(func),
            Self::Delete(n) => n.for_each_expr(func),
            Self::Set(n) => n.for_each_expr(func),
            Self::Block(n) => n.for_each_expr(func),
            Self::CreateTrigger(n) => n.for_each_expr(func),
            Self::TriggerExecutor(n) => n.for_each_expr(func),
        }
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        match self {
            Self::Project(n) => n.for_each_expr_mut(func),
            Self::Filter(n) => n.for_each_expr_mut(func),
            Self::CrossJoin(n) => n.for_each_expr_mut(func),
            Self::Join(n) => n.for_each_expr_mut(func),
            Self::IndexedJoin(n) => n.for_each_expr_mut(func),
            Self::Scan(n) => n.for_each_expr_mut(func),
            Self::UnresolvedTable(n) => n.for_each_expr_mut(func),
            Self::TableAlias(n) => n.for_each_expr_mut(func),
            Self::Decorated(n) => n.for_each_expr_mut(func),
            Self::Values(n) => n.for_each_expr_mut(func),
            Self::Insert(n) => n.for_each_expr_mut(func),
            Self::Update(n) => n.for_each_expr_mut(func),
            Self::UpdateSource(n) => n.for_each_expr_mut(func),
            Self::Delete(n) => n.for_each_expr_mut(func),
            Self::Set(n) => n.for_each_expr_mut(func),
            Self::Block(n) => n.for_each_expr_mut(func),
            Self::CreateTrigger(n) => n.for_each_expr_mut(func),
            Self::TriggerExecutor(n) => n.for_each_expr_mut(func),
        }
    }
}

impl Explainable for LogicalOperator {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        match self {
            Self::Project(n) => n.explain_entry(conf),
            Self::Filter(n) => n.explain_entry(conf),
            Self::CrossJoin(n) => n.explain_entry(conf),
            Self::Join(n) => n.explain_entry(conf),
            Self::IndexedJoin(n) => n.explain_entry(conf),
            Self::Scan(n) => n.explain_entry(conf),
            Self::UnresolvedTable(n) => n.explain_entry(conf),
            Self::TableAlias(n) => n.explain_entry(conf),
            Self::Decorated(n) => n.explain_entry(conf),
            Self::Values(n) => n.explain_entry(conf),
            Self::Insert(n) => n.explain_entry(conf),
            Self::Update(n) => n.explain_entry(conf),
            Self::UpdateSource(n) => n.explain_entry(conf),
            Self::Delete(n) => n.explain_entry(conf),
            Self::Set(n) => n.explain_entry(conf),
            Self::Block(n) => n.explain_entry(conf),
            Self::CreateTrigger(n) => n.explain_entry(conf),
            Self::TriggerExecutor(n) => n.explain_entry(conf),
        }
    }
}
