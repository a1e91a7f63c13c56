use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt::{self, Debug};
use std::sync::Arc;

use planq_error::{DbError, Result};

use crate::arrays::field::Schema;
use crate::arrays::scalar::ScalarValue;
use crate::expr::Expression;
use crate::expr::comparison_expr::ComparisonOperator;

/// Operations an index supports beyond exact key matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexCapabilities {
    /// Supports `<`, `<=`, `>`, `>=` on a single column.
    pub range: bool,
    /// Lookups can be intersected or unioned with lookups on other mergeable
    /// indexes.
    pub mergeable: bool,
    /// Lookups can be negated.
    pub negatable: bool,
}

impl IndexCapabilities {
    pub const ALL: Self = IndexCapabilities {
        range: true,
        mergeable: true,
        negatable: true,
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexDef {
    pub name: String,
    pub database: String,
    pub table: String,
    /// Indexed columns in key order.
    pub columns: Vec<String>,
    pub capabilities: IndexCapabilities,
}

impl IndexDef {
    /// Check if this index covers exactly `columns`, in any order.
    pub fn covers_exactly(&self, columns: &[&str]) -> bool {
        if self.columns.len() != columns.len() {
            return false;
        }
        columns
            .iter()
            .all(|c| self.columns.iter().any(|ic| ic.eq_ignore_ascii_case(c)))
    }
}

impl fmt::Display for IndexDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Source of index definitions for the analyzer.
pub trait IndexRegistry: Debug + Sync + Send {
    /// All indexes on a table.
    fn table_indexes(&self, database: &str, table: &str) -> Vec<Arc<IndexDef>>;

    /// Indexes on a table whose columns are exactly `columns`.
    fn indexes_for_columns(
        &self,
        database: &str,
        table: &str,
        columns: &[&str],
    ) -> Vec<Arc<IndexDef>> {
        self.table_indexes(database, table)
            .into_iter()
            .filter(|idx| idx.covers_exactly(columns))
            .collect()
    }
}

/// A registry with no indexes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIndexes;

impl IndexRegistry for NoIndexes {
    fn table_indexes(&self, _database: &str, _table: &str) -> Vec<Arc<IndexDef>> {
        Vec::new()
    }
}

/// Planned index access for a table scan.
///
/// Key expressions are evaluated against the parent row when the scan is
/// opened. For a plain table scan they're literals, for the secondary side of
/// an indexed join they reference the primary row.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexLookup {
    /// Exact match on every indexed column, keys in index column order.
    Equals {
        index: Arc<IndexDef>,
        keys: Vec<Expression>,
    },
    /// Range on a single column index.
    Range {
        index: Arc<IndexDef>,
        op: ComparisonOperator,
        key: Expression,
    },
    Intersection(Vec<IndexLookup>),
    Union(Vec<IndexLookup>),
    Negate(Box<IndexLookup>),
}

impl IndexLookup {
    pub fn equals(index: Arc<IndexDef>, keys: Vec<Expression>) -> Result<Self> {
        if keys.len() != index.columns.len() {
            return Err(DbError::new("Index lookup key count mismatch")
                .with_field("index", &index)
                .with_field("expected", index.columns.len())
                .with_field("got", keys.len()));
        }
        Ok(IndexLookup::Equals { index, keys })
    }

    /// Create a range lookup. Returns `None` if the index can't serve it.
    pub fn range(index: Arc<IndexDef>, op: ComparisonOperator, key: Expression) -> Option<Self> {
        let range_op = matches!(
            op,
            ComparisonOperator::Lt
                | ComparisonOperator::LtEq
                | ComparisonOperator::Gt
                | ComparisonOperator::GtEq
        );
        if !range_op || !index.capabilities.range || index.columns.len() != 1 {
            return None;
        }
        Some(IndexLookup::Range { index, op, key })
    }

    /// Intersect two lookups. Returns `None` if either side isn't mergeable.
    pub fn intersect(self, other: IndexLookup) -> Option<Self> {
        if !self.mergeable() || !other.mergeable() {
            return None;
        }
        let mut lookups = match self {
            IndexLookup::Intersection(lookups) => lookups,
            other => vec![other],
        };
        match other {
            IndexLookup::Intersection(more) => lookups.extend(more),
            other => lookups.push(other),
        }
        Some(IndexLookup::Intersection(lookups))
    }

    /// Union two lookups. Returns `None` if either side isn't mergeable.
    pub fn union(self, other: IndexLookup) -> Option<Self> {
        if !self.mergeable() || !other.mergeable() {
            return None;
        }
        let mut lookups = match self {
            IndexLookup::Union(lookups) => lookups,
            other => vec![other],
        };
        match other {
            IndexLookup::Union(more) => lookups.extend(more),
            other => lookups.push(other),
        }
        Some(IndexLookup::Union(lookups))
    }

    /// Negate this lookup. Returns `None` if any index involved isn't
    /// negatable.
    pub fn negate(self) -> Option<Self> {
        if !self.indexes().iter().all(|idx| idx.capabilities.negatable) {
            return None;
        }
        Some(match self {
            IndexLookup::Negate(inner) => *inner,
            other => IndexLookup::Negate(Box::new(other)),
        })
    }

    pub fn mergeable(&self) -> bool {
        self.indexes().iter().all(|idx| idx.capabilities.mergeable)
    }

    pub fn indexes(&self) -> Vec<&Arc<IndexDef>> {
        match self {
            Self::Equals { index, .. } | Self::Range { index, .. } => vec![index],
            Self::Intersection(lookups) | Self::Union(lookups) => {
                lookups.iter().flat_map(|l| l.indexes()).collect()
            }
            Self::Negate(inner) => inner.indexes(),
        }
    }

    /// Lowercased names of every column the lookup reads from the table.
    pub fn columns(&self) -> BTreeSet<String> {
        self.indexes()
            .into_iter()
            .flat_map(|idx| idx.columns.iter().map(|c| c.to_ascii_lowercase()))
            .collect()
    }

    pub fn for_each_key<'a, F>(&'a self, func: &mut F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        match self {
            Self::Equals { keys, .. } => {
                for key in keys {
                    func(key)?;
                }
                Ok(())
            }
            Self::Range { key, .. } => func(key),
            Self::Intersection(lookups) | Self::Union(lookups) => {
                for lookup in lookups {
                    lookup.for_each_key(func)?;
                }
                Ok(())
            }
            Self::Negate(inner) => inner.for_each_key(func),
        }
    }

    pub fn for_each_key_mut<F>(&mut self, func: &mut F) -> Result<()>
    where
        F: FnMut(&mut Expression) -> Result<()>,
    {
        match self {
            Self::Equals { keys, .. } => {
                for key in keys {
                    func(key)?;
                }
                Ok(())
            }
            Self::Range { key, .. } => func(key),
            Self::Intersection(lookups) | Self::Union(lookups) => {
                for lookup in lookups {
                    lookup.for_each_key_mut(func)?;
                }
                Ok(())
            }
            Self::Negate(inner) => inner.for_each_key_mut(func),
        }
    }

    /// Evaluate key expressions against the parent row.
    pub fn bind(&self, parent: &[ScalarValue]) -> Result<BoundIndexLookup> {
        Ok(match self {
            Self::Equals { index, keys } => BoundIndexLookup::Equals {
                columns: index.columns.clone(),
                values: keys
                    .iter()
                    .map(|k| k.eval(parent))
                    .collect::<Result<Vec<_>>>()?,
            },
            Self::Range { index, op, key } => BoundIndexLookup::Range {
                column: index.columns[0].clone(),
                op: *op,
                value: key.eval(parent)?,
            },
            Self::Intersection(lookups) => BoundIndexLookup::Intersection(
                lookups
                    .iter()
                    .map(|l| l.bind(parent))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Self::Union(lookups) => BoundIndexLookup::Union(
                lookups
                    .iter()
                    .map(|l| l.bind(parent))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Self::Negate(inner) => BoundIndexLookup::Negate(Box::new(inner.bind(parent)?)),
        })
    }
}

impl fmt::Display for IndexLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Equals { index, keys } => {
                write!(f, "{index}[")?;
                for (idx, (col, key)) in index.columns.iter().zip(keys).enumerate() {
                    if idx > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{col} = {key}")?;
                }
                write!(f, "]")
            }
            Self::Range { index, op, key } => {
                write!(f, "{index}[{} {op} {key}]", index.columns[0])
            }
            Self::Intersection(lookups) => write_joined(f, lookups, " AND "),
            Self::Union(lookups) => write_joined(f, lookups, " OR "),
            Self::Negate(inner) => write!(f, "NOT({inner})"),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, lookups: &[IndexLookup], sep: &str) -> fmt::Result {
    write!(f, "(")?;
    for (idx, lookup) in lookups.iter().enumerate() {
        if idx > 0 {
            write!(f, "{sep}")?;
        }
        write!(f, "{lookup}")?;
    }
    write!(f, ")")
}

/// An index lookup with concrete key values.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundIndexLookup {
    Equals {
        columns: Vec<String>,
        values: Vec<ScalarValue>,
    },
    Range {
        column: String,
        op: ComparisonOperator,
        value: ScalarValue,
    },
    Intersection(Vec<BoundIndexLookup>),
    Union(Vec<BoundIndexLookup>),
    Negate(Box<BoundIndexLookup>),
}

impl BoundIndexLookup {
    /// Check if a table row (laid out per `schema`) is selected by this lookup.
    ///
    /// NULL keys never match.
    pub fn matches(&self, schema: &Schema, row: &[ScalarValue]) -> Result<bool> {
        match self {
            Self::Equals { columns, values } => {
                for (col, value) in columns.iter().zip(values) {
                    let ord = column_value(schema, row, col)?.sql_cmp(value)?;
                    if ord != Some(Ordering::Equal) {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Range { column, op, value } => {
                let ord = column_value(schema, row, column)?.sql_cmp(value)?;
                Ok(ord.is_some_and(|ord| op.matches(ord)))
            }
            Self::Intersection(lookups) => {
                for lookup in lookups {
                    if !lookup.matches(schema, row)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Union(lookups) => {
                for lookup in lookups {
                    if lookup.matches(schema, row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Negate(inner) => Ok(!inner.matches(schema, row)?),
        }
    }
}

fn column_value<'a>(schema: &Schema, row: &'a [ScalarValue], column: &str) -> Result<&'a ScalarValue> {
    schema
        .position(None, column)
        .and_then(|idx| row.get(idx))
        .ok_or_else(|| DbError::new("Indexed column missing from row").with_field("column", column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::arrays::field::Field;
    use crate::expr;

    fn index(name: &str, columns: &[&str], capabilities: IndexCapabilities) -> Arc<IndexDef> {
        Arc::new(IndexDef {
            name: name.to_string(),
            database: "mydb".to_string(),
            table: "t".to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            capabilities,
        })
    }

    fn schema() -> Schema {
        Schema::new([
            Field::new("a", "t", DataType::Int64, true),
            Field::new("b", "t", DataType::Int64, true),
        ])
    }

    #[test]
    fn equals_requires_all_keys() {
        let idx = index("ab", &["a", "b"], IndexCapabilities::ALL);
        IndexLookup::equals(idx.clone(), vec![expr::lit(1_i64)]).unwrap_err();
        IndexLookup::equals(idx, vec![expr::lit(1_i64), expr::lit(2_i64)]).unwrap();
    }

    #[test]
    fn merge_requires_capability() {
        let a = index("a", &["a"], IndexCapabilities::default());
        let b = index("b", &["b"], IndexCapabilities::ALL);

        let la = IndexLookup::equals(a, vec![expr::lit(1_i64)]).unwrap();
        let lb = IndexLookup::equals(b, vec![expr::lit(1_i64)]).unwrap();
        assert!(la.clone().intersect(lb.clone()).is_none());
        assert!(la.negate().is_none());
        assert!(lb.clone().union(lb).is_some());
    }

    #[test]
    fn bound_lookup_matching() {
        let a = index("a", &["a"], IndexCapabilities::ALL);
        let b = index("b", &["b"], IndexCapabilities::ALL);

        let lookup = IndexLookup::equals(a, vec![expr::col(0, "p", "x", DataType::Int64)])
            .unwrap()
            .intersect(IndexLookup::range(b, ComparisonOperator::Gt, expr::lit(5_i64)).unwrap())
            .unwrap();

        let bound = lookup.bind(&[ScalarValue::Int64(3)]).unwrap();
        let schema = schema();
        assert!(bound.matches(&schema, &[3_i64.into(), 6_i64.into()]).unwrap());
        assert!(!bound.matches(&schema, &[3_i64.into(), 5_i64.into()]).unwrap());
        assert!(!bound.matches(&schema, &[ScalarValue::Null, 6_i64.into()]).unwrap());
    }

    #[test]
    fn negated_lookup() {
        let a = index("a", &["a"], IndexCapabilities::ALL);
        let lookup = IndexLookup::equals(a, vec![expr::lit(1_i64)])
            .unwrap()
            .negate()
            .unwrap();
        assert_eq!("NOT(a[a = 1])", lookup.to_string());

        let bound = lookup.bind(&[]).unwrap();
        let schema = schema();
        assert!(bound.matches(&schema, &[2_i64.into(), 0_i64.into()]).unwrap());
        assert!(!bound.matches(&schema, &[1_i64.into(), 0_i64.into()]).unwrap());
    }
}
