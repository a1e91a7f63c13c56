//! Index pushdown.
//!
//! Builds an index lookup for a scan from the filters already pushed onto it.
//! The filters stay on the scan, so a lookup only needs to return a superset
//! of the rows the filters keep.

use std::collections::BTreeSet;
use std::sync::Arc;

use planq_error::Result;

use super::AccessChain;
use crate::analyzer::{AnalysisContext, Analyzer, AnalyzerRule};
use crate::catalog::index::{IndexDef, IndexLookup, IndexRegistry};
use crate::expr::Expression;
use crate::expr::column_expr::ColumnExpr;
use crate::expr::comparison_expr::{ComparisonExpr, ComparisonOperator};
use crate::expr::conjunction_expr::ConjunctionOperator;
use crate::logical::logical_decorated::DecorationKind;
use crate::logical::logical_scan::LogicalScan;
use crate::logical::operator::{LogicalOperator, PlanRef};
use crate::logical::scope::Scope;
use crate::logical::transform::transform_up;

#[derive(Debug, Clone, Copy)]
pub struct PushdownIndexes;

impl AnalyzerRule for PushdownIndexes {
    fn name(&self) -> &'static str {
        "pushdown_indexes"
    }

    fn apply(
        &self,
        _analyzer: &Analyzer,
        ctx: &AnalysisContext,
        plan: &PlanRef,
        _scope: &Scope,
    ) -> Result<PlanRef> {
        transform_up(plan, &mut |node| {
            let LogicalOperator::Scan(scan) = node.as_ref() else {
                return Ok(node.clone());
            };
            if scan.node.lookup.is_some()
                || scan.node.filters.is_empty()
                || !scan.node.source.capabilities().index_lookup
            {
                return Ok(node.clone());
            }

            let Some(lookup) = lookup_from_filters(ctx.indexes, &scan.node) else {
                return Ok(node.clone());
            };
            let Some(new_scan) = scan.node.with_lookup(lookup.clone()) else {
                return Ok(node.clone());
            };

            let mut chain = AccessChain {
                decorations: Vec::new(),
                scan: new_scan,
            };
            chain.set_decoration(DecorationKind::IndexLookup, &[lookup.to_string()]);

            Ok(chain.into_plan())
        })
    }
}

/// Build the best lookup the registry allows for the scan's filters.
///
/// Lookups for individual filters are intersected when their indexes allow
/// merging. Otherwise the first usable lookup wins.
pub fn lookup_from_filters(registry: &dyn IndexRegistry, scan: &LogicalScan) -> Option<IndexLookup> {
    let builder = LookupBuilder { registry, scan };

    let mut lookups = Vec::new();
    let mut covered = BTreeSet::new();

    if let Some((lookup, columns)) = builder.composite_equality() {
        lookups.push(lookup);
        covered = columns;
    }

    for filter in &scan.filters {
        if let Some((col, _, ComparisonOperator::Eq)) = filter_comparison(filter) {
            if covered.contains(&col.column.to_ascii_lowercase()) {
                continue;
            }
        }
        if let Some(lookup) = builder.lookup_for_expr(filter) {
            lookups.push(lookup);
        }
    }

    let mut lookups = lookups.into_iter();
    let first = lookups.next()?;
    Some(lookups.fold(first, |acc, lookup| {
        let fallback = acc.clone();
        acc.intersect(lookup).unwrap_or(fallback)
    }))
}

struct LookupBuilder<'a> {
    registry: &'a dyn IndexRegistry,
    scan: &'a LogicalScan,
}

impl LookupBuilder<'_> {
    fn index_on(&self, column: &str) -> Option<Arc<IndexDef>> {
        self.registry
            .indexes_for_columns(&self.scan.database, self.scan.table_name(), &[column])
            .into_iter()
            .next()
    }

    /// Equality lookup on a multi-column index whose every column has an
    /// equality filter. Returns the lookup and the lowercased columns it
    /// covers.
    fn composite_equality(&self) -> Option<(IndexLookup, BTreeSet<String>)> {
        let equalities: Vec<_> = self
            .scan
            .filters
            .iter()
            .filter_map(filter_comparison)
            .filter(|(_, _, op)| *op == ComparisonOperator::Eq)
            .collect();

        let indexes = self
            .registry
            .table_indexes(&self.scan.database, self.scan.table_name());

        for index in indexes.into_iter().filter(|idx| idx.columns.len() > 1) {
            let keys: Option<Vec<_>> = index
                .columns
                .iter()
                .map(|column| {
                    equalities
                        .iter()
                        .find(|(col, _, _)| col.column.eq_ignore_ascii_case(column))
                        .map(|(_, key, _)| key.clone())
                })
                .collect();

            if let Some(keys) = keys {
                let covered = index
                    .columns
                    .iter()
                    .map(|c| c.to_ascii_lowercase())
                    .collect();
                let lookup = IndexLookup::equals(index, keys).ok()?;
                return Some((lookup, covered));
            }
        }

        None
    }

    fn lookup_for_expr(&self, expr: &Expression) -> Option<IndexLookup> {
        match expr {
            Expression::Comparison(_) => {
                let (col, key, op) = filter_comparison(expr)?;
                let index = self.index_on(&col.column)?;
                match op {
                    ComparisonOperator::Eq => IndexLookup::equals(index, vec![key]).ok(),
                    ComparisonOperator::NotEq => {
                        IndexLookup::equals(index, vec![key]).ok()?.negate()
                    }
                    _ => IndexLookup::range(index, op, key),
                }
            }
            Expression::Not(not) => self.lookup_for_expr(&not.expr)?.negate(),
            Expression::Conjunction(conj) => {
                let mut lookups = conj.expressions.iter().map(|e| self.lookup_for_expr(e));
                let first = lookups.next()??;
                lookups.try_fold(first, |acc, lookup| match conj.op {
                    ConjunctionOperator::And => acc.intersect(lookup?),
                    ConjunctionOperator::Or => acc.union(lookup?),
                })
            }
            _ => None,
        }
    }
}

/// Split a `column op key` comparison where the key doesn't read any
/// columns, normalizing so the column is on the left.
fn filter_comparison(expr: &Expression) -> Option<(ColumnExpr, Expression, ComparisonOperator)> {
    let Expression::Comparison(ComparisonExpr { left, right, op }) = expr else {
        return None;
    };

    let is_key = |e: &Expression| e.column_refs().is_empty() && !e.has_trigger_columns();

    match (left.as_ref(), right.as_ref()) {
        (Expression::Column(col), key) if is_key(key) => Some((col.clone(), key.clone(), *op)),
        (key, Expression::Column(col)) if is_key(key) => {
            Some((col.clone(), key.clone(), op.flip()))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::catalog::index::IndexCapabilities;
    use crate::expr::{self, col};
    use crate::logical::logical_filter::LogicalFilter;
    use crate::logical::logical_join::LogicalCrossJoin;
    use crate::logical::logical_project::LogicalProject;
    use crate::logical::operator::Node;
    use crate::testutil::{TestEnv, decorations, unresolved_table};

    fn scan_lookup(plan: &PlanRef, table: &str) -> Option<String> {
        let mut found = None;
        crate::logical::transform::inspect(plan, &mut |node| {
            if let LogicalOperator::Scan(scan) = node.as_ref() {
                if scan.node.table_name() == table {
                    found = scan.node.lookup.as_ref().map(|l| l.to_string());
                }
            }
            true
        });
        found
    }

    #[test]
    fn pushdown_indexable_filters() {
        let env = TestEnv::with_sample_tables();
        env.add_index("idx_i", "mytable", &["i"], IndexCapabilities::ALL);
        env.add_index("idx_f", "mytable", &["f"], IndexCapabilities::ALL);
        env.add_index("idx_i2", "mytable2", &["i2"], IndexCapabilities::ALL);

        let plan = LogicalOperator::Project(Node::new(
            LogicalProject {
                projections: vec![expr::unresolved(Some("mytable"), "i")],
            },
            vec![
                LogicalOperator::Filter(Node::new(
                    LogicalFilter {
                        filter: expr::and([
                            expr::and([
                                expr::eq(expr::unresolved(Some("mytable"), "f"), expr::lit(2.5)),
                                expr::gt(expr::unresolved(Some("mytable"), "i"), expr::lit(1_i64)),
                            ])
                            .unwrap(),
                            expr::not(expr::eq(
                                expr::unresolved(Some("mytable2"), "i2"),
                                expr::lit(2_i64),
                            )),
                        ])
                        .unwrap(),
                    },
                    vec![
                        LogicalOperator::CrossJoin(Node::new(
                            LogicalCrossJoin,
                            vec![unresolved_table("mytable"), unresolved_table("mytable2")],
                        ))
                        .into_ref(),
                    ],
                ))
                .into_ref(),
            ],
        ))
        .into_ref();

        let out = env.analyze(&plan).unwrap();

        assert_eq!(
            Some("(idx_f[f = 2.5] AND idx_i[i > 1])".to_string()),
            scan_lookup(&out, "mytable")
        );
        assert_eq!(
            Some("NOT(idx_i2[i2 = 2])".to_string()),
            scan_lookup(&out, "mytable2")
        );
        assert!(decorations(&out).contains(
            &"Indexed table access on [(idx_f[f = 2.5] AND idx_i[i > 1])]".to_string()
        ));
    }

    #[test]
    fn non_mergeable_keeps_first() {
        let env = TestEnv::with_sample_tables();
        let caps = IndexCapabilities {
            range: true,
            mergeable: false,
            negatable: true,
        };
        env.add_index("idx_i", "mytable", &["i"], caps);
        env.add_index("idx_f", "mytable", &["f"], caps);

        let scan = env
            .sample_table_scan("mytable")
            .with_filters([
                expr::eq(col(1, "mytable", "f", DataType::Float64), expr::lit(2.5)),
                expr::eq(col(0, "mytable", "i", DataType::Int32), expr::lit(3_i64)),
            ])
            .unwrap();

        let lookup = lookup_from_filters(&env.indexes, &scan).unwrap();
        assert_eq!("idx_f[f = 2.5]", lookup.to_string());
    }

    #[test]
    fn composite_index_uses_all_equalities() {
        let env = TestEnv::with_sample_tables();
        env.add_index("idx_fi", "mytable", &["f", "i"], IndexCapabilities::ALL);

        let scan = env
            .sample_table_scan("mytable")
            .with_filters([
                expr::eq(expr::lit(3_i64), col(0, "mytable", "i", DataType::Int32)),
                expr::eq(col(1, "mytable", "f", DataType::Float64), expr::lit(2.5)),
            ])
            .unwrap();

        let lookup = lookup_from_filters(&env.indexes, &scan).unwrap();
        assert_eq!("idx_fi[f = 2.5, i = 3]", lookup.to_string());
    }

    #[test]
    fn or_of_indexed_columns() {
        let env = TestEnv::with_sample_tables();
        env.add_index("idx_i", "mytable", &["i"], IndexCapabilities::ALL);

        let scan = env
            .sample_table_scan("mytable")
            .with_filters([expr::or([
                expr::eq(col(0, "mytable", "i", DataType::Int32), expr::lit(1_i64)),
                expr::lt(col(0, "mytable", "i", DataType::Int32), expr::lit(-5_i64)),
            ])
            .unwrap()])
            .unwrap();

        let lookup = lookup_from_filters(&env.indexes, &scan).unwrap();
        assert_eq!("(idx_i[i = 1] OR idx_i[i < -5])", lookup.to_string());

        // An unindexed disjunct makes the whole OR unusable.
        let scan = env
            .sample_table_scan("mytable")
            .with_filters([expr::or([
                expr::eq(col(0, "mytable", "i", DataType::Int32), expr::lit(1_i64)),
                expr::is_null(col(2, "mytable", "t", DataType::Utf8)),
            ])
            .unwrap()])
            .unwrap();
        assert!(lookup_from_filters(&env.indexes, &scan).is_none());
    }
}
