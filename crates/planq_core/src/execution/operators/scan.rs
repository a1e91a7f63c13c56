use std::sync::Arc;

use planq_error::Result;

use crate::arrays::Row;
use crate::arrays::scalar::ScalarValue;
use crate::catalog::TableSource;
use crate::catalog::index::IndexLookup;
use crate::execution::{ExecutionContext, RowIter, RowSource};
use crate::expr::Expression;

/// Reads a base table.
///
/// The index lookup's keys are bound against the parent row each time the
/// scan is opened. Pushed filters are evaluated against full table rows
/// before the projection narrows them.
#[derive(Debug)]
pub struct PhysicalScan {
    pub(crate) source: Arc<dyn TableSource>,
    pub(crate) projection: Option<Vec<usize>>,
    pub(crate) filters: Vec<Expression>,
    pub(crate) lookup: Option<IndexLookup>,
}

impl PhysicalScan {
    pub fn new(source: Arc<dyn TableSource>) -> Self {
        PhysicalScan {
            source,
            projection: None,
            filters: Vec::new(),
            lookup: None,
        }
    }
}

impl RowSource for PhysicalScan {
    fn name(&self) -> &'static str {
        "Scan"
    }

    fn num_columns(&self) -> usize {
        match &self.projection {
            Some(projection) => projection.len(),
            None => self.source.schema().len(),
        }
    }

    fn row_iter(&self, ctx: &ExecutionContext, parent: &[ScalarValue]) -> Result<Box<dyn RowIter>> {
        let bound = match &self.lookup {
            Some(lookup) => Some(lookup.bind(parent)?),
            None => None,
        };
        let inner = self.source.scan(ctx, bound.as_ref())?;

        Ok(Box::new(ScanIter {
            inner,
            filters: self.filters.clone(),
            projection: self.projection.clone(),
        }))
    }
}

#[derive(Debug)]
struct ScanIter {
    inner: Box<dyn RowIter>,
    filters: Vec<Expression>,
    projection: Option<Vec<usize>>,
}

impl ScanIter {
    fn passes(&self, row: &[ScalarValue]) -> Result<bool> {
        for filter in &self.filters {
            if !filter.eval_predicate(row)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl RowIter for ScanIter {
    fn try_next(&mut self) -> Result<Option<Row>> {
        while let Some(row) = self.inner.try_next()? {
            if !self.passes(&row)? {
                continue;
            }
            let row = match &self.projection {
                Some(projection) => projection.iter().map(|idx| row[*idx].clone()).collect(),
                None => row,
            };
            return Ok(Some(row));
        }
        Ok(None)
    }

    fn close(&mut self) -> Result<()> {
        self.inner.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrays::datatype::DataType;
    use crate::catalog::index::{IndexCapabilities, IndexDef};
    use crate::execution::drain;
    use crate::expr::{self, col};
    use crate::testutil::TestEnv;

    #[test]
    fn lookup_bound_from_parent() {
        let env = TestEnv::with_sample_tables();
        let index = Arc::new(IndexDef {
            name: "idx_i".to_string(),
            database: "mydb".to_string(),
            table: "mytable".to_string(),
            columns: vec!["i".to_string()],
            capabilities: IndexCapabilities::ALL,
        });

        let scan = PhysicalScan {
            source: env.table("mytable"),
            projection: Some(vec![2]),
            filters: Vec::new(),
            // Key is the first column of the parent row.
            lookup: Some(
                IndexLookup::equals(index, vec![col(0, "p", "x", DataType::Int32)]).unwrap(),
            ),
        };

        let ctx = ExecutionContext::new();
        let rows = drain(scan.row_iter(&ctx, &[2_i32.into()]).unwrap()).unwrap();
        assert_eq!(vec![vec![ScalarValue::from("b")]], rows);
    }

    #[test]
    fn filters_before_projection() {
        let env = TestEnv::with_sample_tables();
        let scan = PhysicalScan {
            source: env.table("mytable"),
            projection: Some(vec![2]),
            filters: vec![expr::gt(
                col(1, "mytable", "f", DataType::Float64),
                expr::lit(2.0_f64),
            )],
            lookup: None,
        };

        assert_eq!(1, scan.num_columns());
        let ctx = ExecutionContext::new();
        let rows = drain(scan.row_iter(&ctx, &[]).unwrap()).unwrap();
        assert_eq!(
            vec![vec![ScalarValue::from("b")], vec![ScalarValue::from("c")]],
            rows
        );
    }
}
