//! In-memory catalog implementations.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use planq_error::{DbError, ErrorKind, Result};

use super::index::{BoundIndexLookup, IndexDef, IndexRegistry};
use super::{Catalog, Database, TableCapabilities, TableSource, TriggerDefinition};
use crate::arrays::Row;
use crate::arrays::field::{Field, Schema};
use crate::arrays::scalar::ScalarValue;
use crate::execution::{ExecutionContext, RowIter, VecRowIter};

#[derive(Debug, Default)]
pub struct MemoryCatalog {
    databases: RwLock<IndexMap<String, Arc<MemoryDatabase>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a database, or return the existing one with the same name.
    pub fn create_database(&self, name: &str) -> Arc<MemoryDatabase> {
        let mut databases = self.databases.write();
        databases
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| Arc::new(MemoryDatabase::new(name)))
            .clone()
    }

    pub fn memory_database(&self, name: &str) -> Option<Arc<MemoryDatabase>> {
        self.databases
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned()
    }
}

impl Catalog for MemoryCatalog {
    fn database(&self, name: &str) -> Result<Arc<dyn Database>> {
        match self.memory_database(name) {
            Some(db) => Ok(db as Arc<dyn Database>),
            None => Err(DbError::with_kind(ErrorKind::DatabaseNotFound, "Missing database")
                .with_field("database", name)),
        }
    }
}

#[derive(Debug)]
pub struct MemoryDatabase {
    name: String,
    tables: RwLock<IndexMap<String, Arc<MemoryTable>>>,
    triggers: RwLock<Vec<TriggerDefinition>>,
}

impl MemoryDatabase {
    pub fn new(name: impl Into<String>) -> Self {
        MemoryDatabase {
            name: name.into(),
            tables: RwLock::new(IndexMap::new()),
            triggers: RwLock::new(Vec::new()),
        }
    }

    pub fn add_table(&self, table: MemoryTable) -> Arc<MemoryTable> {
        let table = Arc::new(table);
        self.tables
            .write()
            .insert(table.name.to_ascii_lowercase(), table.clone());
        table
    }

    pub fn memory_table(&self, name: &str) -> Option<Arc<MemoryTable>> {
        self.tables.read().get(&name.to_ascii_lowercase()).cloned()
    }

    /// Store a trigger. Triggers are reported in the order they were added.
    pub fn add_trigger(&self, name: impl Into<String>, create_statement: impl Into<String>) {
        self.triggers.write().push(TriggerDefinition {
            name: name.into(),
            create_statement: create_statement.into(),
        });
    }
}

impl Database for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    fn table(&self, name: &str) -> Result<Option<Arc<dyn TableSource>>> {
        Ok(self
            .memory_table(name)
            .map(|t| t as Arc<dyn TableSource>))
    }

    fn triggers(&self) -> Result<Vec<TriggerDefinition>> {
        Ok(self.triggers.read().clone())
    }
}

#[derive(Debug)]
pub struct MemoryTable {
    name: String,
    schema: Schema,
    capabilities: TableCapabilities,
    rows: RwLock<Vec<Row>>,
}

impl MemoryTable {
    /// Create a table. Field sources are set to the table name.
    pub fn new(name: impl Into<String>, fields: impl IntoIterator<Item = Field>) -> Self {
        let name = name.into();
        let schema = Schema::new(fields).with_source(&name);
        MemoryTable {
            name,
            schema,
            capabilities: TableCapabilities::ALL,
            rows: RwLock::new(Vec::new()),
        }
    }

    pub fn with_capabilities(mut self, capabilities: TableCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_rows(self, rows: impl IntoIterator<Item = Row>) -> Self {
        self.rows.write().extend(rows);
        self
    }

    /// Snapshot of the current rows.
    pub fn rows(&self) -> Vec<Row> {
        self.rows.read().clone()
    }

    fn check_width(&self, row: &[ScalarValue]) -> Result<()> {
        if row.len() != self.schema.len() {
            return Err(DbError::new("Row width does not match table")
                .with_field("table", &self.name)
                .with_field("expected", self.schema.len())
                .with_field("got", row.len()));
        }
        Ok(())
    }
}

impl TableSource for MemoryTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn capabilities(&self) -> TableCapabilities {
        self.capabilities
    }

    fn scan(
        &self,
        ctx: &ExecutionContext,
        lookup: Option<&BoundIndexLookup>,
    ) -> Result<Box<dyn RowIter>> {
        let rows = self.rows.read();
        let rows = match lookup {
            Some(lookup) => {
                let mut selected = Vec::new();
                for row in rows.iter() {
                    if lookup.matches(&self.schema, row)? {
                        selected.push(row.clone());
                    }
                }
                selected
            }
            None => rows.clone(),
        };

        Ok(Box::new(VecRowIter::new(ctx, rows)))
    }

    fn insert(&self, row: Row) -> Result<()> {
        self.check_width(&row)?;
        self.rows.write().push(row);
        Ok(())
    }

    fn update(&self, old: &[ScalarValue], new: Row) -> Result<()> {
        self.check_width(&new)?;
        let mut rows = self.rows.write();
        match rows.iter_mut().find(|row| row.as_slice() == old) {
            Some(row) => {
                *row = new;
                Ok(())
            }
            None => Err(DbError::new("Row to update not found").with_field("table", &self.name)),
        }
    }

    fn delete(&self, row: &[ScalarValue]) -> Result<()> {
        let mut rows = self.rows.write();
        match rows.iter().position(|r| r.as_slice() == row) {
            Some(pos) => {
                rows.remove(pos);
                Ok(())
            }
            None => Err(DbError::new("Row to delete not found").with_field("table", &self.name)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryIndexRegistry {
    indexes: RwLock<Vec<Arc<IndexDef>>>,
}

impl MemoryIndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_index(&self, index: IndexDef) -> Arc<IndexDef> {
        let index = Arc::new(index);
        self.indexes.write().push(index.clone());
        index
    }
}

impl IndexRegistry for MemoryIndexRegistry {
    fn table_indexes(&self, database: &str, table: &str) -> Vec<Arc<IndexDef>> {
        self.indexes
            .read()
            .iter()
            .filter(|idx| {
                idx.database.eq_ignore_ascii_case(database) && idx.table.eq_ignore_ascii_case(table)
            })
            .cloned()
            .collect()
    }
}
