use std::sync::Arc;

use planq_error::{DbError, ErrorKind, Result};

use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerRule};
use crate::expr::trigger_column_expr::PseudoTable;
use crate::expr::{Expression, trigger_col};
use crate::logical::logical_trigger::{LogicalCreateTrigger, TriggerEvent, TriggerTime};
use crate::logical::operator::{LogicalOperator, Node, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::{transform_expressions_up, transform_up};

/// Replaces `new.col` and `old.col` in trigger definition bodies with trigger
/// column placeholders, rejecting references and assignments the trigger's
/// event and timing don't allow.
#[derive(Debug, Clone, Copy)]
pub struct ResolveNewAndOldReferences;

impl AnalyzerRule for ResolveNewAndOldReferences {
    fn name(&self) -> &'static str {
        "resolve_new_and_old_references"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        _ctx: &AnalysisContext,
        plan: &PlanRef,
        _scope: &Scope,
    ) -> Result<PlanRef> {
        transform_up(plan, &mut |node| match node.as_ref() {
            LogicalOperator::CreateTrigger(trigger) => {
                let body = trigger.get_one_child_exact()?;
                let new_body = resolve_trigger_body(trigger)?;
                if Arc::ptr_eq(body, &new_body) {
                    return Ok(node.clone());
                }
                node.with_new_children(vec![new_body])
            }
            _ => Ok(node.clone()),
        })
    }
}

/// Returns the trigger's body with NEW/OLD references replaced.
pub fn resolve_trigger_body(trigger: &Node<LogicalCreateTrigger>) -> Result<PlanRef> {
    let body = trigger.get_one_child_exact()?;
    let event = trigger.node.event;

    let body = transform_expressions_up(body, &mut |expr| match expr {
        Expression::UnresolvedColumn(col) => {
            match col.table.as_deref().and_then(PseudoTable::from_name) {
                Some(pseudo) => {
                    check_pseudo_table(pseudo, event)?;
                    Ok(trigger_col(pseudo, col.column))
                }
                None => Ok(Expression::UnresolvedColumn(col)),
            }
        }
        other => Ok(other),
    })?;

    check_assignments(&body, trigger.node.time)?;

    Ok(body)
}

fn check_pseudo_table(pseudo: PseudoTable, event: TriggerEvent) -> Result<()> {
    let allowed = match event {
        TriggerEvent::Insert => pseudo == PseudoTable::New,
        TriggerEvent::Delete => pseudo == PseudoTable::Old,
        TriggerEvent::Update => true,
    };
    if allowed {
        return Ok(());
    }
    Err(DbError::from(ErrorKind::InvalidUseOfOldNew {
        pseudo_table: pseudo.as_str().to_string(),
        event: event.to_string(),
    }))
}

/// OLD is never writable, NEW only before the row is written.
fn check_assignments(plan: &PlanRef, time: TriggerTime) -> Result<()> {
    if let LogicalOperator::Set(set) = plan.as_ref() {
        for assignment in &set.node.assignments {
            let Expression::SetField(set_field) = assignment else {
                continue;
            };
            let Expression::TriggerColumn(target) = set_field.left.as_ref() else {
                continue;
            };
            match (target.table, time) {
                (PseudoTable::Old, _) => {
                    return Err(DbError::from(ErrorKind::InvalidUpdateOfOldRow));
                }
                (PseudoTable::New, TriggerTime::After) => {
                    return Err(DbError::from(ErrorKind::InvalidUpdateInAfterTrigger));
                }
                (PseudoTable::New, TriggerTime::Before) => (),
            }
        }
    }

    for (idx, child) in plan.children().iter().enumerate() {
        if !plan.is_opaque_child(idx) {
            check_assignments(child, time)?;
        }
    }
    Ok(())
}
