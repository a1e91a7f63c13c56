//! Persistent plan rewriting helpers.
//!
//! Every helper returns the input `PlanRef` unchanged (same allocation) when
//! nothing was rewritten, which lets callers detect changes with
//! `Arc::ptr_eq`.

use std::sync::Arc;

use planq_error::Result;

use super::operator::{LogicalOperator, PlanRef};
use crate::expr::Expression;

/// Post-order rewrite of the plan.
///
/// Children are rewritten before `func` sees their parent. Opaque children
/// (trigger bodies and compiled trigger logic) are not visited.
pub fn transform_up<F>(plan: &PlanRef, func: &mut F) -> Result<PlanRef>
where
    F: FnMut(&PlanRef) -> Result<PlanRef>,
{
    let children = plan.children();
    let mut new_children = Vec::with_capacity(children.len());
    let mut changed = false;

    for (idx, child) in children.iter().enumerate() {
        if plan.is_opaque_child(idx) {
            new_children.push(child.clone());
            continue;
        }
        let new_child = transform_up(child, func)?;
        changed |= !Arc::ptr_eq(&new_child, child);
        new_children.push(new_child);
    }

    let node = if changed {
        plan.with_new_children(new_children)?
    } else {
        plan.clone()
    };

    func(&node)
}

/// Post-order rewrite passing each node's original parent and the node's
/// position within it.
///
/// Unlike [`transform_up`], every child is visited.
pub fn transform_up_with_parent<F>(plan: &PlanRef, func: &mut F) -> Result<PlanRef>
where
    F: FnMut(&PlanRef, Option<(&PlanRef, usize)>) -> Result<PlanRef>,
{
    fn inner<F>(plan: &PlanRef, parent: Option<(&PlanRef, usize)>, func: &mut F) -> Result<PlanRef>
    where
        F: FnMut(&PlanRef, Option<(&PlanRef, usize)>) -> Result<PlanRef>,
    {
        let children = plan.children();
        let mut new_children = Vec::with_capacity(children.len());
        let mut changed = false;

        for (idx, child) in children.iter().enumerate() {
            let new_child = inner(child, Some((plan, idx)), func)?;
            changed |= !Arc::ptr_eq(&new_child, child);
            new_children.push(new_child);
        }

        let node = if changed {
            plan.with_new_children(new_children)?
        } else {
            plan.clone()
        };

        func(&node, parent)
    }

    inner(plan, None, func)
}

/// Rewrite the expressions owned by a single node.
pub fn transform_node_expressions<F>(plan: &PlanRef, func: &mut F) -> Result<PlanRef>
where
    F: FnMut(Expression) -> Result<Expression>,
{
    let mut changed = false;
    let node = plan.with_exprs_mut(|expr| {
        let new_expr = expr.transform_up(func)?;
        if new_expr != *expr {
            changed = true;
            *expr = new_expr;
        }
        Ok(())
    })?;

    if changed {
        Ok(Arc::new(node))
    } else {
        Ok(plan.clone())
    }
}

/// Post-order rewrite of every expression in the plan, skipping opaque
/// children.
pub fn transform_expressions_up<F>(plan: &PlanRef, func: &mut F) -> Result<PlanRef>
where
    F: FnMut(Expression) -> Result<Expression>,
{
    transform_up(plan, &mut |node| transform_node_expressions(node, func))
}

/// Pre-order walk over every node, including opaque children.
///
/// Returning `false` from `func` stops descent into that node's children.
pub fn inspect<F>(plan: &PlanRef, func: &mut F)
where
    F: FnMut(&PlanRef) -> bool,
{
    if !func(plan) {
        return;
    }
    for child in plan.children() {
        inspect(child, func);
    }
}

/// Check if the plan and every non-opaque descendant is resolved.
pub fn plan_is_resolved(plan: &LogicalOperator) -> bool {
    if !plan.is_resolved() {
        return false;
    }
    plan.children()
        .iter()
        .enumerate()
        .filter(|(idx, _)| !plan.is_opaque_child(*idx))
        .all(|(_, child)| plan_is_resolved(child))
}
