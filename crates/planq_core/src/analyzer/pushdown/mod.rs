//! Rules moving work from parent nodes onto base table scans.

pub mod filter;
pub mod index;
pub mod indexed_join;
pub mod projection;

use crate::logical::logical_decorated::{DecorationKind, LogicalDecorated};
use crate::logical::logical_scan::LogicalScan;
use crate::logical::operator::{LogicalOperator, Node, PlanRef};

/// A scan together with the decorations stacked directly on top of it.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessChain {
    /// Outermost first.
    pub decorations: Vec<LogicalDecorated>,
    pub scan: LogicalScan,
}

impl AccessChain {
    /// Unwrap decorations down to a scan. Returns `None` if the plan isn't a
    /// (possibly decorated) scan.
    pub fn from_plan(plan: &PlanRef) -> Option<Self> {
        let mut decorations = Vec::new();
        let mut current = plan;
        loop {
            match current.as_ref() {
                LogicalOperator::Decorated(n) => {
                    decorations.push(n.node.clone());
                    current = n.children.first()?;
                }
                LogicalOperator::Scan(n) => {
                    return Some(AccessChain {
                        decorations,
                        scan: n.node.clone(),
                    });
                }
                _ => return None,
            }
        }
    }

    /// Set the description for a decoration kind, replacing an existing
    /// decoration of the same kind in place. New decorations go directly on
    /// top of the scan.
    pub fn set_decoration(&mut self, kind: DecorationKind, items: &[String]) {
        let description = kind.describe(items);
        match self.decorations.iter_mut().find(|d| d.kind == kind) {
            Some(existing) => existing.description = description,
            None => self.decorations.push(LogicalDecorated { kind, description }),
        }
    }

    pub fn into_plan(self) -> PlanRef {
        let mut plan = LogicalOperator::Scan(Node::new(self.scan, Vec::new())).into_ref();
        for decoration in self.decorations.into_iter().rev() {
            plan = LogicalOperator::Decorated(Node::new(decoration, vec![plan])).into_ref();
        }
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::arrays::field::Field;
    use crate::testutil::TestEnv;

    #[test]
    fn decoration_upsert() {
        let env = TestEnv::new();
        let scan = env.scan("t", [Field::new("a", "", DataType::Int64, true)]);
        let mut chain = AccessChain::from_plan(&scan).unwrap();

        chain.set_decoration(DecorationKind::Filter, &["t.a = 1".to_string()]);
        chain.set_decoration(DecorationKind::Projection, &["a".to_string()]);
        chain.set_decoration(DecorationKind::Filter, &["t.a = 2".to_string()]);

        let plan = chain.into_plan();
        let chain = AccessChain::from_plan(&plan).unwrap();
        assert_eq!(2, chain.decorations.len());
        assert_eq!(
            "Filtered table access on [t.a = 2]",
            chain.decorations[0].description
        );
        assert_eq!(
            "Projected table access on [a]",
            chain.decorations[1].description
        );
    }

    #[test]
    fn not_a_chain() {
        let values = crate::testutil::values_plan(vec![]);
        assert!(AccessChain::from_plan(&values).is_none());
    }
}
