use planq_error::{DbError, ErrorKind, Result};

use crate::logical::logical_trigger::{LogicalCreateTrigger, TriggerOrderKind};
use crate::logical::operator::Node;

/// Order triggers by their PRECEDES/FOLLOWS clauses.
///
/// Triggers start out in creation order. Each trigger with an ordering clause
/// is then moved, in creation order, to directly before (PRECEDES) or after
/// (FOLLOWS) the trigger it references.
pub fn order_triggers(
    triggers: Vec<Node<LogicalCreateTrigger>>,
) -> Result<Vec<Node<LogicalCreateTrigger>>> {
    check_order_cycles(&triggers)?;

    let mut ordered = triggers.clone();
    for trigger in &triggers {
        let Some(order) = &trigger.node.order else {
            continue;
        };

        let pos = position(&ordered, &trigger.node.name).ok_or_else(|| {
            DbError::new("Trigger missing from ordering").with_field("trigger", &trigger.node.name)
        })?;
        let moved = ordered.remove(pos);

        let Some(target) = position(&ordered, &order.other_trigger) else {
            return Err(DbError::from(ErrorKind::TriggerOrderReferenceNotFound {
                trigger: trigger.node.name.clone(),
                reference: order.other_trigger.clone(),
            }));
        };

        match order.kind {
            TriggerOrderKind::Precedes => ordered.insert(target, moved),
            TriggerOrderKind::Follows => ordered.insert(target + 1, moved),
        }
    }

    Ok(ordered)
}

fn position(triggers: &[Node<LogicalCreateTrigger>], name: &str) -> Option<usize> {
    triggers
        .iter()
        .position(|t| t.node.name.eq_ignore_ascii_case(name))
}

/// Follow each trigger's reference chain, erroring if it revisits a trigger.
fn check_order_cycles(triggers: &[Node<LogicalCreateTrigger>]) -> Result<()> {
    for start in triggers {
        let mut visited = vec![start.node.name.to_ascii_lowercase()];
        let mut current = start;

        while let Some(order) = &current.node.order {
            let Some(pos) = position(triggers, &order.other_trigger) else {
                // Reported when the trigger is placed.
                break;
            };
            let next = &triggers[pos];
            let name = next.node.name.to_ascii_lowercase();
            if visited.contains(&name) {
                return Err(DbError::from(ErrorKind::TriggerOrderCycle {
                    trigger: start.node.name.clone(),
                }));
            }
            visited.push(name);
            current = next;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::logical_trigger::{TriggerEvent, TriggerOrder, TriggerTime};
    use crate::testutil::values_plan;

    fn trigger(name: &str, order: Option<(TriggerOrderKind, &str)>) -> Node<LogicalCreateTrigger> {
        Node::new(
            LogicalCreateTrigger {
                name: name.to_string(),
                table: "mytable".to_string(),
                event: TriggerEvent::Insert,
                time: TriggerTime::Before,
                order: order.map(|(kind, other)| TriggerOrder {
                    kind,
                    other_trigger: other.to_string(),
                }),
                create_statement: String::new(),
            },
            vec![values_plan(Vec::new())],
        )
    }

    fn names(triggers: &[Node<LogicalCreateTrigger>]) -> Vec<&str> {
        triggers.iter().map(|t| t.node.name.as_str()).collect()
    }

    #[test]
    fn creation_order_without_clauses() {
        let ordered = order_triggers(vec![trigger("a", None), trigger("b", None)]).unwrap();
        assert_eq!(vec!["a", "b"], names(&ordered));
    }

    #[test]
    fn precedes_and_follows() {
        let ordered = order_triggers(vec![
            trigger("a", None),
            trigger("b", Some((TriggerOrderKind::Follows, "a"))),
            trigger("c", Some((TriggerOrderKind::Precedes, "a"))),
        ])
        .unwrap();
        assert_eq!(vec!["c", "a", "b"], names(&ordered));
    }

    #[test]
    fn follows_places_directly_after() {
        let ordered = order_triggers(vec![
            trigger("a", Some((TriggerOrderKind::Follows, "C"))),
            trigger("b", None),
            trigger("c", None),
            trigger("d", None),
        ])
        .unwrap();
        assert_eq!(vec!["b", "c", "a", "d"], names(&ordered));
    }

    #[test]
    fn missing_reference() {
        let err = order_triggers(vec![
            trigger("a", None),
            trigger("b", Some((TriggerOrderKind::Precedes, "nope"))),
        ])
        .unwrap_err();
        assert_eq!(
            &ErrorKind::TriggerOrderReferenceNotFound {
                trigger: "b".to_string(),
                reference: "nope".to_string(),
            },
            err.kind()
        );
    }

    #[test]
    fn cycle() {
        let err = order_triggers(vec![
            trigger("a", Some((TriggerOrderKind::Follows, "b"))),
            trigger("b", Some((TriggerOrderKind::Precedes, "a"))),
        ])
        .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TriggerOrderCycle { .. }));

        let err = order_triggers(vec![trigger("a", Some((TriggerOrderKind::Follows, "a")))])
            .unwrap_err();
        assert_eq!(
            &ErrorKind::TriggerOrderCycle {
                trigger: "a".to_string()
            },
            err.kind()
        );
    }
}
