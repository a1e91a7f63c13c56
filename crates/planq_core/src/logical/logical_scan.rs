use std::sync::Arc;

use planq_error::Result;

use super::operator::{LogicalNode, Node};
use crate::arrays::field::Schema;
use crate::catalog::TableSource;
use crate::catalog::index::IndexLookup;
use crate::explain::explainable::{EntryBuilder, ExplainConfig, ExplainEntry, Explainable};
use crate::expr::Expression;

/// Access to a base table.
#[derive(Debug, Clone)]
pub struct LogicalScan {
    pub database: String,
    pub source: Arc<dyn TableSource>,
    /// Positional column projections into the table's full schema.
    ///
    /// Ascending order. `None` emits every column.
    ///
    /// An empty projection list is valid. In such cases rows with no columns
    /// are emitted, one per table row.
    pub projection: Option<Vec<usize>>,
    /// Filters that have been pushed down, logically ANDed together.
    ///
    /// Column references are positions in the table's full schema.
    pub filters: Vec<Expression>,
    /// Index access restricting which rows the table produces.
    pub lookup: Option<IndexLookup>,
}

impl PartialEq for LogicalScan {
    fn eq(&self, other: &Self) -> bool {
        self.database == other.database
            && self.source.name() == other.source.name()
            && self.projection == other.projection
            && self.filters == other.filters
            && self.lookup == other.lookup
    }
}

impl LogicalScan {
    pub fn new(database: impl Into<String>, source: Arc<dyn TableSource>) -> Self {
        LogicalScan {
            database: database.into(),
            source,
            projection: None,
            filters: Vec::new(),
            lookup: None,
        }
    }

    pub fn table_name(&self) -> &str {
        self.source.name()
    }

    pub fn full_schema(&self) -> &Schema {
        self.source.schema()
    }

    /// Positions in the full schema of the columns this scan emits.
    pub fn projected_columns(&self) -> Vec<usize> {
        match &self.projection {
            Some(projection) => projection.clone(),
            None => (0..self.full_schema().len()).collect(),
        }
    }

    pub fn output_schema(&self) -> Schema {
        let full = self.full_schema();
        match &self.projection {
            Some(projection) => Schema::new(
                projection
                    .iter()
                    .filter_map(|idx| full.fields.get(*idx).cloned()),
            ),
            None => full.clone(),
        }
    }

    /// Returns a scan emitting only `columns`, or `None` if the source can't
    /// narrow its output.
    pub fn with_projection(&self, mut columns: Vec<usize>) -> Option<Self> {
        if !self.source.capabilities().projection {
            return None;
        }
        columns.sort_unstable();
        columns.dedup();

        let mut scan = self.clone();
        if columns.len() == self.full_schema().len() {
            scan.projection = None;
        } else {
            scan.projection = Some(columns);
        }
        Some(scan)
    }

    /// Returns a scan with `filters` added to its existing filters, or `None`
    /// if the source doesn't accept filters.
    pub fn with_filters(&self, filters: impl IntoIterator<Item = Expression>) -> Option<Self> {
        if !self.source.capabilities().filters {
            return None;
        }
        let mut scan = self.clone();
        for filter in filters {
            if !scan.filters.contains(&filter) {
                scan.filters.push(filter);
            }
        }
        Some(scan)
    }

    /// Returns a scan using `lookup`, or `None` if the source doesn't support
    /// index access.
    pub fn with_lookup(&self, lookup: IndexLookup) -> Option<Self> {
        if !self.source.capabilities().index_lookup {
            return None;
        }
        let mut scan = self.clone();
        scan.lookup = Some(lookup);
        Some(scan)
    }
}

impl Explainable for LogicalScan {
    fn explain_entry(&self, conf: ExplainConfig) -> ExplainEntry {
        let mut builder = EntryBuilder::new("Scan", conf)
            .with_value("table", format!("{}.{}", self.database, self.table_name()))
            .with_values(
                "columns",
                self.output_schema().fields.iter().map(|f| f.name.clone()),
            )
            .with_values_if_verbose("projection", self.projected_columns());

        if !self.filters.is_empty() {
            builder = builder.with_values("filters", &self.filters);
        }
        if let Some(lookup) = &self.lookup {
            builder = builder.with_value("lookup", lookup);
        }

        builder.build()
    }
}

impl LogicalNode for Node<LogicalScan> {
    fn name(&self) -> &'static str {
        "Scan"
    }

    fn output_schema(&self) -> Schema {
        self.node.output_schema()
    }

    fn expected_children(&self) -> Option<usize> {
        Some(0)
    }

    // Filters and lookup keys are evaluated in different row spaces than the
    // node's inputs, so they're not exposed here.
    fn for_each_expr<'a, F>(&'a self, _func: F) -> Result<()>
    where
        F: FnMut(&'a Expression) -> Result<()>,
    {
        Ok(())
    }

    fn for_each_expr_mut<'a, F>(&'a mut self, _func: F) -> Result<()>
    where
        F: FnMut(&'a mut Expression) -> Result<()>,
    {
        Ok(())
    }
}
