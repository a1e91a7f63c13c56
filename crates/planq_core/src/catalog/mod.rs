pub mod index;
pub mod memory;

use std::fmt::Debug;
use std::sync::Arc;

use index::BoundIndexLookup;
use planq_error::{DbError, Result};

use crate::arrays::Row;
use crate::arrays::field::Schema;
use crate::arrays::scalar::ScalarValue;
use crate::execution::{ExecutionContext, RowIter};

/// Resolves database names.
pub trait Catalog: Debug + Sync + Send {
    fn database(&self, name: &str) -> Result<Arc<dyn Database>>;
}

pub trait Database: Debug + Sync + Send {
    fn name(&self) -> &str;

    /// Get a table by name. Returns `None` if it doesn't exist.
    fn table(&self, name: &str) -> Result<Option<Arc<dyn TableSource>>>;

    /// Stored trigger definitions in creation order.
    ///
    /// Databases without trigger support report none.
    fn triggers(&self) -> Result<Vec<TriggerDefinition>> {
        Ok(Vec::new())
    }
}

/// A trigger as stored in the catalog.
///
/// Only the creation text is stored. Event, timing, target table and ordering
/// are recovered by parsing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerDefinition {
    pub name: String,
    pub create_statement: String,
}

/// What a table source lets the analyzer push into its scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableCapabilities {
    pub projection: bool,
    pub filters: bool,
    pub index_lookup: bool,
}

impl TableCapabilities {
    pub const ALL: Self = TableCapabilities {
        projection: true,
        filters: true,
        index_lookup: true,
    };

    pub const NONE: Self = TableCapabilities {
        projection: false,
        filters: false,
        index_lookup: false,
    };
}

/// A base table.
///
/// Scans always produce rows in the layout of `schema()`. Narrowing to a
/// projection and evaluating pushed filters happens in the scan operator.
pub trait TableSource: Debug + Sync + Send {
    fn name(&self) -> &str;

    /// Full schema of the table. Every field's source is the table name.
    fn schema(&self) -> &Schema;

    fn capabilities(&self) -> TableCapabilities {
        TableCapabilities::ALL
    }

    /// Scan the table, optionally restricted to rows matching an index lookup.
    fn scan(
        &self,
        ctx: &ExecutionContext,
        lookup: Option<&BoundIndexLookup>,
    ) -> Result<Box<dyn RowIter>>;

    fn insert(&self, _row: Row) -> Result<()> {
        Err(DbError::new("Table does not support inserts").with_field("table", self.name()))
    }

    fn update(&self, _old: &[ScalarValue], _new: Row) -> Result<()> {
        Err(DbError::new("Table does not support updates").with_field("table", self.name()))
    }

    fn delete(&self, _row: &[ScalarValue]) -> Result<()> {
        Err(DbError::new("Table does not support deletes").with_field("table", self.name()))
    }
}
