//! Filter pushdown.
//!
//! Conjuncts of a filter that reference a single table are moved onto that
//! table's scan. Whatever can't be moved stays in the filter, and a filter
//! left with nothing is removed.

use std::collections::BTreeSet;
use std::sync::Arc;

use indexmap::IndexMap;
use planq_error::Result;
use tracing::trace;

use super::AccessChain;
use crate::analyzer::fix_indexes::fix_field_indexes;
use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerRule};
use crate::expr::{self, Expression, split_conjunction};
use crate::logical::logical_decorated::DecorationKind;
use crate::logical::logical_filter::LogicalFilter;
use crate::logical::logical_join::JoinType;
use crate::logical::operator::{LogicalOperator, Node, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::transform_up;

#[derive(Debug, Clone, Copy)]
pub struct PushdownFilters;

impl AnalyzerRule for PushdownFilters {
    fn name(&self) -> &'static str {
        "pushdown_filters"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        _ctx: &AnalysisContext,
        plan: &PlanRef,
        scope: &Scope,
    ) -> Result<PlanRef> {
        let scope_sources: BTreeSet<String> = scope.sources().into_iter().collect();

        let pushed = transform_up(plan, &mut |node| match node.as_ref() {
            LogicalOperator::Filter(filter) => push_filter(node, filter, &scope_sources),
            _ => Ok(node.clone()),
        })?;

        if Arc::ptr_eq(&pushed, plan) {
            return Ok(plan.clone());
        }
        fix_field_indexes(&pushed, &scope.schema())
    }
}

/// Conjuncts waiting to be placed, keyed by the lowercased name of the table
/// they reference. Each conjunct keeps its position in the original filter.
type Pending = IndexMap<String, Vec<(usize, Expression)>>;

fn push_filter(
    plan: &PlanRef,
    filter: &Node<LogicalFilter>,
    scope_sources: &BTreeSet<String>,
) -> Result<PlanRef> {
    let mut conjuncts = Vec::new();
    split_conjunction(filter.node.filter.clone(), &mut conjuncts);

    let mut pending = Pending::new();
    let mut remaining = Vec::new();
    for (idx, conjunct) in conjuncts.into_iter().enumerate() {
        match pushable_table(&conjunct, scope_sources) {
            Some(table) => pending.entry(table).or_default().push((idx, conjunct)),
            None => remaining.push((idx, conjunct)),
        }
    }

    let num_pending = pending.len();
    if num_pending == 0 {
        return Ok(plan.clone());
    }

    let child = filter.get_one_child_exact()?;
    let new_child = push_into(child, &mut pending, None)?;
    if pending.len() == num_pending {
        return Ok(plan.clone());
    }

    remaining.extend(pending.into_values().flatten());
    remaining.sort_by_key(|(idx, _)| *idx);

    match expr::and(remaining.into_iter().map(|(_, expr)| expr)) {
        Some(predicate) => Ok(LogicalOperator::Filter(Node::new(
            LogicalFilter { filter: predicate },
            vec![new_child],
        ))
        .into_ref()),
        None => Ok(new_child),
    }
}

/// The single table a conjunct can be pushed to, if any.
fn pushable_table(conjunct: &Expression, scope_sources: &BTreeSet<String>) -> Option<String> {
    if !conjunct.is_resolved() || conjunct.has_trigger_columns() {
        return None;
    }
    let tables = conjunct.referenced_tables();
    if tables.len() != 1 {
        return None;
    }
    tables
        .into_iter()
        .next()
        .filter(|table| !scope_sources.contains(table))
}

fn push_into(plan: &PlanRef, pending: &mut Pending, alias: Option<&str>) -> Result<PlanRef> {
    match plan.as_ref() {
        LogicalOperator::Scan(_) | LogicalOperator::Decorated(_) => {
            push_into_access(plan, pending, alias)
        }
        LogicalOperator::TableAlias(n) => {
            let child = n.get_one_child_exact()?;
            if AccessChain::from_plan(child).is_none() {
                return Ok(plan.clone());
            }
            let new_child = push_into(child, pending, Some(&n.node.alias))?;
            if Arc::ptr_eq(&new_child, child) {
                return Ok(plan.clone());
            }
            plan.with_new_children(vec![new_child])
        }
        LogicalOperator::CrossJoin(_) => push_into_children(plan, pending, &[0, 1]),
        LogicalOperator::Join(n) => match n.node.join_type {
            JoinType::Inner => push_into_children(plan, pending, &[0, 1]),
            JoinType::Left => push_into_children(plan, pending, &[0]),
            JoinType::Right => push_into_children(plan, pending, &[1]),
        },
        // The primary side is always the preserved side of an indexed join.
        LogicalOperator::IndexedJoin(n) => match n.node.join_type {
            JoinType::Inner => push_into_children(plan, pending, &[0, 1]),
            JoinType::Left | JoinType::Right => push_into_children(plan, pending, &[0]),
        },
        LogicalOperator::Filter(_) => push_into_children(plan, pending, &[0]),
        _ => Ok(plan.clone()),
    }
}

fn push_into_children(plan: &PlanRef, pending: &mut Pending, indices: &[usize]) -> Result<PlanRef> {
    let mut children = plan.children().to_vec();
    let mut changed = false;

    for &idx in indices {
        if pending.is_empty() {
            break;
        }
        let Some(child) = children.get(idx) else {
            continue;
        };
        let new_child = push_into(child, pending, None)?;
        changed |= !Arc::ptr_eq(&new_child, child);
        children[idx] = new_child;
    }

    if changed {
        plan.with_new_children(children)
    } else {
        Ok(plan.clone())
    }
}

fn push_into_access(plan: &PlanRef, pending: &mut Pending, alias: Option<&str>) -> Result<PlanRef> {
    let Some(mut chain) = AccessChain::from_plan(plan) else {
        return Ok(plan.clone());
    };

    let table = chain.scan.table_name().to_string();
    let visible = alias.unwrap_or(&table).to_ascii_lowercase();

    let Some(filters) = pending.get(&visible) else {
        return Ok(plan.clone());
    };

    // Filters on the scan reference the table itself, not an alias.
    let filters = filters
        .iter()
        .map(|(_, filter)| {
            filter.transform_up(&mut |expr| match expr {
                Expression::Column(mut col) => {
                    col.table = table.clone();
                    Ok(Expression::Column(col))
                }
                other => Ok(other),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let Some(scan) = chain.scan.with_filters(filters) else {
        return Ok(plan.clone());
    };
    pending.shift_remove(&visible);

    if scan == chain.scan {
        return Ok(plan.clone());
    }

    let descriptions: Vec<_> = scan.filters.iter().map(|f| f.to_string()).collect();
    trace!(table = %table, filters = ?descriptions, "pushed filters onto scan");
    chain.scan = scan;
    chain.set_decoration(DecorationKind::Filter, &descriptions);

    Ok(chain.into_plan())
}
